//! In-process test doubles for the query path.
//!
//! Provides:
//! - [`StubPool`]: a [`ConnectionPool`] whose connections answer every
//!   statement from a closure, with lease accounting identical to the real
//!   pools
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use querygate::db::ConnectionPool;
//! use querygate::query::{PooledQueryExecutor, QueryRequest};
//! use querygate::testing::StubPool;
//!
//! # async fn demo() {
//! let pool = Arc::new(StubPool::rows(&["balance"], vec![vec![1000.into()]]));
//! let executor = PooledQueryExecutor::new(pool.clone());
//! let outcome = executor.execute(&QueryRequest::new("SELECT balance FROM deposit")).await;
//! assert!(outcome.is_success());
//! assert_eq!(pool.usage().outstanding(), 0);
//! # }
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::db::{
    BoundStatement, ConnectionLease, ConnectionPool, Cursor, LeaseTracker, LeaseUsage,
    PlaceholderStyle, PooledConnection, SqlValue,
};
use crate::error::DatabaseError;

type Handler = dyn Fn(&BoundStatement) -> Result<Cursor, DatabaseError> + Send + Sync;

/// A configurable connection pool stub.
///
/// Supports:
/// - Per-statement responses from a closure
/// - A simulated execution delay via [`with_delay`](Self::with_delay)
/// - A bounded number of simultaneous leases via [`with_max_size`](Self::with_max_size)
/// - Acquire counting via [`acquire_calls`](Self::acquire_calls)
/// - A log of every compiled statement via [`executed`](Self::executed)
pub struct StubPool {
    handler: Arc<Handler>,
    delay: Option<Duration>,
    slots: Arc<Semaphore>,
    style: PlaceholderStyle,
    acquire_calls: AtomicU64,
    closed: AtomicBool,
    executed: Arc<Mutex<Vec<String>>>,
    tracker: Arc<LeaseTracker>,
}

impl StubPool {
    /// Answer every statement with `handler`.
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&BoundStatement) -> Result<Cursor, DatabaseError> + Send + Sync + 'static,
    {
        Self {
            handler: Arc::new(handler),
            delay: None,
            slots: Arc::new(Semaphore::new(Semaphore::MAX_PERMITS)),
            style: PlaceholderStyle::QuestionNumbered,
            acquire_calls: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            executed: Arc::new(Mutex::new(Vec::new())),
            tracker: LeaseTracker::new(),
        }
    }

    /// Answer every statement with the same result set.
    pub fn rows(columns: &[&str], rows: Vec<Vec<SqlValue>>) -> Self {
        let cursor = Cursor::new(columns.iter().map(|c| c.to_string()).collect(), rows);
        Self::new(move |_| Ok(cursor.clone()))
    }

    /// Answer every statement with an empty result set.
    pub fn empty(columns: &[&str]) -> Self {
        Self::rows(columns, Vec::new())
    }

    /// Fail every statement with a driver error carrying `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(move |_| Err(DatabaseError::Query(message.clone())))
    }

    /// Sleep this long inside every execute call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Allow at most `max_size` leases at once. Further acquires wait.
    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.slots = Arc::new(Semaphore::new(max_size));
        self
    }

    pub fn with_placeholder_style(mut self, style: PlaceholderStyle) -> Self {
        self.style = style;
        self
    }

    /// Number of times `acquire` was called, successful or not.
    pub fn acquire_calls(&self) -> u64 {
        self.acquire_calls.load(Ordering::Relaxed)
    }

    /// Compiled SQL of every statement that reached a connection.
    pub fn executed(&self) -> Vec<String> {
        self.executed
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ConnectionPool for StubPool {
    fn placeholder_style(&self) -> PlaceholderStyle {
        self.style
    }

    async fn acquire(&self) -> Result<ConnectionLease, DatabaseError> {
        self.acquire_calls.fetch_add(1, Ordering::Relaxed);
        if self.closed.load(Ordering::Relaxed) {
            return Err(DatabaseError::Pool("pool is closed".to_string()));
        }
        let permit = Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .map_err(|_| DatabaseError::Pool("pool is closed".to_string()))?;

        Ok(self.tracker.lease(Box::new(StubConnection {
            handler: Arc::clone(&self.handler),
            delay: self.delay,
            executed: Arc::clone(&self.executed),
            _permit: permit,
        })))
    }

    fn usage(&self) -> LeaseUsage {
        self.tracker.usage()
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Relaxed);
        self.slots.close();
    }
}

struct StubConnection {
    handler: Arc<Handler>,
    delay: Option<Duration>,
    executed: Arc<Mutex<Vec<String>>>,
    _permit: OwnedSemaphorePermit,
}

#[async_trait]
impl PooledConnection for StubConnection {
    async fn execute(&mut self, statement: &BoundStatement) -> Result<Cursor, DatabaseError> {
        if let Ok(mut log) = self.executed.lock() {
            log.push(statement.sql().to_string());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        (self.handler)(statement)
    }
}
