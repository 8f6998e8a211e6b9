use std::time::Duration;

use crate::config::helpers::{optional_env, parse_optional_env};
use crate::error::ConfigError;
use crate::query::ColumnCase;

/// Query tool configuration.
#[derive(Debug, Clone)]
pub struct QueryConfig {
    /// How result column names are normalized before they reach the agent.
    pub column_case: ColumnCase,
    /// Limit on leasing plus executing one statement, counted from gate
    /// admission.
    pub tool_timeout: Duration,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            column_case: ColumnCase::Upper,
            tool_timeout: Duration::from_secs(60),
        }
    }
}

impl QueryConfig {
    pub(crate) fn resolve() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let column_case = optional_env("QUERY_COLUMN_CASE")?
            .map(|s| s.parse())
            .transpose()
            .map_err(|e: String| ConfigError::InvalidValue {
                key: "QUERY_COLUMN_CASE".to_string(),
                message: e,
            })?
            .unwrap_or(defaults.column_case);

        let timeout_secs = parse_optional_env(
            "QUERY_TOOL_TIMEOUT_SECS",
            defaults.tool_timeout.as_secs(),
        )?;

        Ok(Self {
            column_case,
            tool_timeout: Duration::from_secs(timeout_secs),
        })
    }
}
