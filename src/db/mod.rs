//! Connection pool abstraction.
//!
//! The query executor never owns connections. It borrows one
//! [`ConnectionLease`] per statement from a [`ConnectionPool`] and drops it on
//! every exit path; dropping returns the connection to the pool. Two pool
//! implementations exist behind feature flags:
//!
//! - `libsql` (default): libSQL connections pooled with `deadpool`
//! - `postgres`: `deadpool-postgres` + `tokio-postgres`
//!
//! Pools are created once by their owner (the binary or a test) and shared as
//! `Arc<dyn ConnectionPool>`.

#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(feature = "libsql")]
pub mod libsql_backend;

pub mod seed;
pub mod statement;
pub mod value;

pub use statement::{BoundStatement, PlaceholderStyle};
pub use value::{JsonValueError, Parameters, SqlValue};

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use crate::error::DatabaseError;

/// Create a connection pool from configuration.
pub async fn connect_from_config(
    config: &crate::config::DatabaseConfig,
) -> Result<Arc<dyn ConnectionPool>, DatabaseError> {
    match config.backend {
        #[cfg(feature = "libsql")]
        crate::config::DatabaseBackend::LibSql => {
            use secrecy::ExposeSecret as _;

            let pool = if let Some(ref url) = config.libsql_url {
                let token = config.libsql_auth_token.as_ref().ok_or_else(|| {
                    DatabaseError::Pool(
                        "LIBSQL_AUTH_TOKEN required when LIBSQL_URL is set".to_string(),
                    )
                })?;
                libsql_backend::LibSqlPool::new_remote_replica(
                    &config.libsql_path,
                    url,
                    token.expose_secret(),
                    config.pool_size,
                )
                .await?
            } else {
                libsql_backend::LibSqlPool::new_local(&config.libsql_path, config.pool_size)
                    .await?
            };
            Ok(Arc::new(pool))
        }
        #[cfg(feature = "postgres")]
        crate::config::DatabaseBackend::Postgres => {
            Ok(Arc::new(postgres::PgPool::new(config)?))
        }
        #[allow(unreachable_patterns)]
        other => Err(DatabaseError::Pool(format!(
            "backend '{other}' is not compiled in; enable the '{other}' feature"
        ))),
    }
}

/// A bounded pool of live connections, owned elsewhere and borrowed per statement.
#[async_trait]
pub trait ConnectionPool: Send + Sync {
    /// Positional placeholder syntax the backend expects.
    fn placeholder_style(&self) -> PlaceholderStyle;

    /// Borrow a connection, waiting while the pool is saturated.
    ///
    /// The wait policy (and any timeout) belongs to the pool, not the caller.
    async fn acquire(&self) -> Result<ConnectionLease, DatabaseError>;

    /// Lease counters since the pool was created.
    fn usage(&self) -> LeaseUsage;

    /// Close the pool. Outstanding leases finish normally; new acquires fail.
    fn close(&self);
}

/// A connection checked out of a pool.
#[async_trait]
pub trait PooledConnection: Send {
    /// Run one statement and materialize its result set.
    async fn execute(&mut self, statement: &BoundStatement) -> Result<Cursor, DatabaseError>;
}

/// Column names and fetched rows of one executed statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cursor {
    columns: Vec<String>,
    rows: Vec<Vec<SqlValue>>,
}

impl Cursor {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<SqlValue>>) -> Self {
        Self { columns, rows }
    }

    /// Column names in projection order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Take every row, each in projection order.
    pub fn fetch_all(self) -> Vec<Vec<SqlValue>> {
        self.rows
    }
}

/// Snapshot of lease counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LeaseUsage {
    pub acquired: u64,
    pub released: u64,
}

impl LeaseUsage {
    /// Leases currently checked out.
    pub fn outstanding(&self) -> u64 {
        self.acquired.saturating_sub(self.released)
    }
}

/// Counts leases handed out and returned. Shared by every pool implementation.
#[derive(Debug, Default)]
pub struct LeaseTracker {
    acquired: AtomicU64,
    released: AtomicU64,
}

impl LeaseTracker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Wrap a freshly checked-out connection in a tracked lease.
    pub fn lease(self: &Arc<Self>, conn: Box<dyn PooledConnection>) -> ConnectionLease {
        let id = self.acquired.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(lease = id, "connection leased");
        ConnectionLease {
            conn,
            guard: ReleaseGuard {
                id,
                tracker: Arc::clone(self),
            },
        }
    }

    pub fn usage(&self) -> LeaseUsage {
        LeaseUsage {
            acquired: self.acquired.load(Ordering::SeqCst),
            released: self.released.load(Ordering::SeqCst),
        }
    }
}

/// Exclusive ownership of one pooled connection for one statement.
///
/// Dropping the lease returns the connection to its pool, so release happens
/// on success, on error, and when the owning future is cancelled.
pub struct ConnectionLease {
    // Field order matters: the connection goes back to the pool before the
    // guard records the release.
    conn: Box<dyn PooledConnection>,
    guard: ReleaseGuard,
}

impl ConnectionLease {
    /// Lease sequence number, unique per pool.
    pub fn id(&self) -> u64 {
        self.guard.id
    }

    pub async fn execute(&mut self, statement: &BoundStatement) -> Result<Cursor, DatabaseError> {
        self.conn.execute(statement).await
    }

    /// Return the connection now rather than at end of scope.
    pub fn release(self) {
        drop(self);
    }
}

impl std::fmt::Debug for ConnectionLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionLease")
            .field("id", &self.guard.id)
            .finish_non_exhaustive()
    }
}

struct ReleaseGuard {
    id: u64,
    tracker: Arc<LeaseTracker>,
}

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        self.tracker.released.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(lease = self.id, "connection released");
    }
}
