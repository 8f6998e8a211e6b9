//! Configuration resolved from the environment.
//!
//! `.env.local` and `.env` are loaded by the binary before [`Config::from_env`]
//! runs, so values from those files behave exactly like exported variables.

mod database;
mod gate;
pub(crate) mod helpers;
mod query;

pub use database::{DatabaseBackend, DatabaseConfig, default_libsql_path};
pub use gate::GateConfig;
pub use query::QueryConfig;

use crate::error::ConfigError;

/// Top-level configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub gate: GateConfig,
    pub query: QueryConfig,
}

impl Config {
    /// Resolve every section from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            database: DatabaseConfig::resolve()?,
            gate: GateConfig::resolve()?,
            query: QueryConfig::resolve()?,
        })
    }
}
