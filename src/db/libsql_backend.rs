//! libSQL/Turso connection pool.
//!
//! libSQL hands out independent connections to one shared `Database` handle
//! but has no pool of its own, so connections are pooled with `deadpool`'s
//! managed pool. Two modes:
//! - Local embedded (file-based, no server needed)
//! - Turso cloud with embedded replica (sync to cloud)

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use deadpool::managed::{self, Metrics, RecycleResult};
use libsql::{Connection, Database as LibSqlDatabase};

use crate::db::{
    BoundStatement, ConnectionLease, ConnectionPool, Cursor, LeaseTracker, LeaseUsage,
    PlaceholderStyle, PooledConnection, SqlValue,
};
use crate::error::DatabaseError;

/// Creates libSQL connections for the pool.
///
/// Sets `PRAGMA busy_timeout = 5000` on every connection so concurrent
/// writers wait up to 5 seconds instead of failing instantly with
/// "database is locked".
pub struct LibSqlManager {
    db: Arc<LibSqlDatabase>,
}

impl managed::Manager for LibSqlManager {
    type Type = Connection;
    type Error = libsql::Error;

    async fn create(&self) -> Result<Connection, libsql::Error> {
        let conn = self.db.connect()?;
        conn.query("PRAGMA busy_timeout = 5000", ()).await?;
        Ok(conn)
    }

    async fn recycle(&self, _conn: &mut Connection, _metrics: &Metrics) -> RecycleResult<libsql::Error> {
        Ok(())
    }
}

type Pool = managed::Pool<LibSqlManager>;

/// Bounded pool of libSQL connections.
pub struct LibSqlPool {
    pool: Pool,
    tracker: Arc<LeaseTracker>,
}

impl LibSqlPool {
    /// Open (or create) a local database file and pool up to `max_size` connections.
    pub async fn new_local(path: &Path, max_size: usize) -> Result<Self, DatabaseError> {
        ensure_parent_dir(path)?;

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {}", e)))?;

        Self::from_database(db, max_size)
    }

    /// Open an embedded replica that syncs with a Turso cloud database.
    pub async fn new_remote_replica(
        path: &Path,
        url: &str,
        auth_token: &str,
        max_size: usize,
    ) -> Result<Self, DatabaseError> {
        ensure_parent_dir(path)?;

        let db = libsql::Builder::new_remote_replica(path, url.to_string(), auth_token.to_string())
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open remote replica: {}", e)))?;

        Self::from_database(db, max_size)
    }

    fn from_database(db: LibSqlDatabase, max_size: usize) -> Result<Self, DatabaseError> {
        let manager = LibSqlManager { db: Arc::new(db) };
        let pool = Pool::builder(manager)
            .max_size(max_size)
            .build()
            .map_err(|e| DatabaseError::Pool(format!("Failed to build pool: {}", e)))?;

        tracing::info!(max_size, "libSQL connection pool ready");
        Ok(Self {
            pool,
            tracker: LeaseTracker::new(),
        })
    }
}

fn ensure_parent_dir(path: &Path) -> Result<(), DatabaseError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|e| {
            DatabaseError::Pool(format!("Failed to create database directory: {}", e))
        })?;
    }
    Ok(())
}

#[async_trait]
impl ConnectionPool for LibSqlPool {
    fn placeholder_style(&self) -> PlaceholderStyle {
        PlaceholderStyle::QuestionNumbered
    }

    async fn acquire(&self) -> Result<ConnectionLease, DatabaseError> {
        let conn = self
            .pool
            .get()
            .await
            .map_err(|e| DatabaseError::Pool(e.to_string()))?;
        Ok(self.tracker.lease(Box::new(LibSqlConnection(conn))))
    }

    fn usage(&self) -> LeaseUsage {
        self.tracker.usage()
    }

    fn close(&self) {
        tracing::info!("closing libSQL connection pool");
        self.pool.close();
    }
}

struct LibSqlConnection(managed::Object<LibSqlManager>);

#[async_trait]
impl PooledConnection for LibSqlConnection {
    async fn execute(&mut self, statement: &BoundStatement) -> Result<Cursor, DatabaseError> {
        let params: Vec<libsql::Value> = statement.values().iter().map(to_libsql).collect();

        let mut rows = self
            .0
            .query(statement.sql(), params)
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?;

        let width = rows.column_count();
        let columns = (0..width)
            .map(|idx| rows.column_name(idx).unwrap_or_default().to_string())
            .collect();

        let mut fetched = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?
        {
            let mut values = Vec::with_capacity(width.max(0) as usize);
            for idx in 0..width {
                let value = row
                    .get_value(idx)
                    .map_err(|e| DatabaseError::Query(e.to_string()))?;
                values.push(from_libsql(value));
            }
            fetched.push(values);
        }

        Ok(Cursor::new(columns, fetched))
    }
}

fn to_libsql(value: &SqlValue) -> libsql::Value {
    match value {
        SqlValue::Null => libsql::Value::Null,
        SqlValue::Bool(b) => libsql::Value::Integer(i64::from(*b)),
        SqlValue::Integer(i) => libsql::Value::Integer(*i),
        SqlValue::Real(f) => libsql::Value::Real(*f),
        SqlValue::Numeric(d) => match value.as_i64() {
            Some(i) => libsql::Value::Integer(i),
            None => libsql::Value::Text(d.to_string()),
        },
        SqlValue::Text(s) => libsql::Value::Text(s.clone()),
        SqlValue::Blob(b) => libsql::Value::Blob(b.clone()),
    }
}

fn from_libsql(value: libsql::Value) -> SqlValue {
    match value {
        libsql::Value::Null => SqlValue::Null,
        libsql::Value::Integer(i) => SqlValue::Integer(i),
        libsql::Value::Real(f) => SqlValue::Real(f),
        libsql::Value::Text(s) => SqlValue::Text(s),
        libsql::Value::Blob(b) => SqlValue::Blob(b),
    }
}
