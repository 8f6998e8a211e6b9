use std::path::PathBuf;

use secrecy::{ExposeSecret, SecretString};

use crate::config::helpers::{optional_env, parse_optional_env};
use crate::error::ConfigError;

/// Which database backend the connection pool talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DatabaseBackend {
    /// libSQL/Turso embedded database (default).
    #[default]
    LibSql,
    /// PostgreSQL via deadpool-postgres.
    Postgres,
}

impl std::fmt::Display for DatabaseBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LibSql => write!(f, "libsql"),
            Self::Postgres => write!(f, "postgres"),
        }
    }
}

impl std::str::FromStr for DatabaseBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "libsql" | "turso" | "sqlite" => Ok(Self::LibSql),
            "postgres" | "postgresql" | "pg" => Ok(Self::Postgres),
            _ => Err(format!(
                "invalid database backend '{}', expected 'libsql' or 'postgres'",
                s
            )),
        }
    }
}

/// Connection pool configuration.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Which backend to use (default: libSQL).
    pub backend: DatabaseBackend,

    /// Maximum number of pooled connections.
    pub pool_size: usize,

    // -- PostgreSQL fields --
    pub url: Option<SecretString>,

    // -- libSQL fields --
    /// Path to the local libSQL database file (default: ./querygate.db).
    pub libsql_path: PathBuf,
    /// Turso cloud URL for remote sync (optional).
    pub libsql_url: Option<String>,
    /// Turso auth token (required when libsql_url is set).
    pub libsql_auth_token: Option<SecretString>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: DatabaseBackend::default(),
            pool_size: 10,
            url: None,
            libsql_path: default_libsql_path(),
            libsql_url: None,
            libsql_auth_token: None,
        }
    }
}

impl DatabaseConfig {
    pub(crate) fn resolve() -> Result<Self, ConfigError> {
        let backend: DatabaseBackend = if let Some(b) = optional_env("DATABASE_BACKEND")? {
            b.parse().map_err(|e| ConfigError::InvalidValue {
                key: "DATABASE_BACKEND".to_string(),
                message: e,
            })?
        } else {
            DatabaseBackend::default()
        };

        let url = optional_env("DATABASE_URL")?.map(SecretString::from);
        if backend == DatabaseBackend::Postgres && url.is_none() {
            return Err(ConfigError::MissingRequired {
                key: "DATABASE_URL".to_string(),
                hint: "Set DATABASE_URL when DATABASE_BACKEND=postgres".to_string(),
            });
        }

        let pool_size = parse_optional_env("DATABASE_POOL_SIZE", 10usize)?;
        if pool_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "DATABASE_POOL_SIZE".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        let libsql_path = optional_env("LIBSQL_PATH")?
            .map(PathBuf::from)
            .unwrap_or_else(default_libsql_path);

        let libsql_url = optional_env("LIBSQL_URL")?;
        let libsql_auth_token = optional_env("LIBSQL_AUTH_TOKEN")?.map(SecretString::from);

        if libsql_url.is_some() && libsql_auth_token.is_none() {
            return Err(ConfigError::MissingRequired {
                key: "LIBSQL_AUTH_TOKEN".to_string(),
                hint: "LIBSQL_AUTH_TOKEN is required when LIBSQL_URL is set".to_string(),
            });
        }

        Ok(Self {
            backend,
            pool_size,
            url,
            libsql_path,
            libsql_url,
            libsql_auth_token,
        })
    }

    /// Get the PostgreSQL URL (exposes the secret).
    pub fn url(&self) -> Option<&str> {
        self.url.as_ref().map(|u| u.expose_secret())
    }
}

/// Default libSQL database path, relative to the working directory.
pub fn default_libsql_path() -> PathBuf {
    PathBuf::from("querygate.db")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_aliases() {
        assert_eq!("sqlite".parse::<DatabaseBackend>(), Ok(DatabaseBackend::LibSql));
        assert_eq!("Turso".parse::<DatabaseBackend>(), Ok(DatabaseBackend::LibSql));
        assert_eq!("pg".parse::<DatabaseBackend>(), Ok(DatabaseBackend::Postgres));
        assert_eq!(
            "POSTGRESQL".parse::<DatabaseBackend>(),
            Ok(DatabaseBackend::Postgres)
        );
    }

    #[test]
    fn test_backend_rejects_unknown() {
        let err = "oracle".parse::<DatabaseBackend>().unwrap_err();
        assert!(err.contains("'oracle'"));
    }

    #[test]
    fn test_backend_display_round_trips() {
        for backend in [DatabaseBackend::LibSql, DatabaseBackend::Postgres] {
            assert_eq!(backend.to_string().parse::<DatabaseBackend>(), Ok(backend));
        }
    }
}
