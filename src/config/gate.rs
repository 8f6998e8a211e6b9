use std::time::Duration;

use crate::config::helpers::parse_optional_env;
use crate::error::ConfigError;

/// Admission window for outbound calls to a protected dependency.
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Maximum admissions per rolling window.
    pub capacity: usize,
    /// Length of the rolling window.
    pub window: Duration,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            capacity: 30,
            window: Duration::from_secs(60),
        }
    }
}

impl GateConfig {
    pub(crate) fn resolve() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let capacity = parse_optional_env("REQUEST_GATE_CAPACITY", defaults.capacity)?;
        if capacity == 0 {
            return Err(ConfigError::InvalidValue {
                key: "REQUEST_GATE_CAPACITY".to_string(),
                message: "must be a positive integer".to_string(),
            });
        }

        let window_secs =
            parse_optional_env("REQUEST_GATE_WINDOW_SECS", defaults.window.as_secs())?;
        if window_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "REQUEST_GATE_WINDOW_SECS".to_string(),
                message: "must be a positive integer".to_string(),
            });
        }

        Ok(Self {
            capacity,
            window: Duration::from_secs(window_secs),
        })
    }
}
