//! Error types shared across the crate.

use std::time::Duration;

use thiserror::Error;

/// Configuration resolution errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Errors raised by the connection pool or the database driver.
///
/// These never escape the query executor: they are folded into a
/// [`QueryOutcome::Failure`](crate::query::QueryOutcome::Failure) at the lease
/// boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DatabaseError {
    /// The pool could not be created or could not yield a connection.
    #[error("Connection pool error: {0}")]
    Pool(String),

    /// The driver rejected or failed to run the statement.
    #[error("Query execution error: {0}")]
    Query(String),

    /// A placeholder in the template had no bound value.
    #[error("Parameter binding error: {0}")]
    Bind(String),

    /// Leasing plus execution ran past the statement time limit.
    #[error("Query timed out after {0:?}")]
    Timeout(Duration),
}
