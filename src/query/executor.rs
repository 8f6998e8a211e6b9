//! Single-statement execution over a borrowed pool lease.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::db::{BoundStatement, ConnectionPool, Cursor};
use crate::error::DatabaseError;
use crate::query::{QueryOutcome, QueryRequest, Row};
use crate::tools::rate_limiter::RequestGate;

/// Failure message for a blank statement template.
pub const NO_STATEMENT: &str = "no statement provided";

/// Normalization applied to result column names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ColumnCase {
    /// `balance` becomes `BALANCE`.
    #[default]
    Upper,
    Lower,
    /// Names exactly as the driver reports them.
    Preserve,
}

impl ColumnCase {
    pub fn apply(&self, name: &str) -> String {
        match self {
            Self::Upper => name.to_uppercase(),
            Self::Lower => name.to_lowercase(),
            Self::Preserve => name.to_string(),
        }
    }
}

impl FromStr for ColumnCase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "upper" | "uppercase" => Ok(Self::Upper),
            "lower" | "lowercase" => Ok(Self::Lower),
            "preserve" | "none" | "as-is" => Ok(Self::Preserve),
            _ => Err(format!(
                "invalid column case '{s}', expected 'upper', 'lower' or 'preserve'"
            )),
        }
    }
}

impl fmt::Display for ColumnCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Upper => write!(f, "upper"),
            Self::Lower => write!(f, "lower"),
            Self::Preserve => write!(f, "preserve"),
        }
    }
}

/// Runs one parameterized statement per call against a shared pool.
///
/// The executor never holds a connection between calls. Each
/// [`execute`](Self::execute) borrows one lease and returns it before the
/// call completes, whatever the outcome. Errors never escape: every failure
/// comes back as [`QueryOutcome::Failure`].
///
/// The optional timeout bounds leasing plus execution only. Time spent
/// queued on the gate is not counted against it.
#[derive(Clone)]
pub struct PooledQueryExecutor {
    pool: Arc<dyn ConnectionPool>,
    gate: Option<Arc<RequestGate>>,
    column_case: ColumnCase,
    timeout: Option<Duration>,
}

impl PooledQueryExecutor {
    pub fn new(pool: Arc<dyn ConnectionPool>) -> Self {
        Self {
            pool,
            gate: None,
            column_case: ColumnCase::default(),
            timeout: None,
        }
    }

    /// Admit every statement through `gate` before leasing.
    pub fn with_gate(mut self, gate: Arc<RequestGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn with_column_case(mut self, column_case: ColumnCase) -> Self {
        self.column_case = column_case;
        self
    }

    /// Fail statements whose lease and execution take longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn pool(&self) -> &Arc<dyn ConnectionPool> {
        &self.pool
    }

    /// Execute `request` and classify the result.
    ///
    /// Order of work: validate the template, compile placeholders, wait on the
    /// gate, lease a connection, execute, release, classify. Requests that
    /// fail validation or binding never consume gate budget or a lease. The
    /// timeout clock starts once the gate has admitted the request.
    pub async fn execute(&self, request: &QueryRequest) -> QueryOutcome {
        let template = request.statement_template.trim();
        if template.is_empty() {
            tracing::warn!("query rejected: {NO_STATEMENT}");
            return QueryOutcome::failure(NO_STATEMENT);
        }

        if let Some(intent) = &request.original_intent {
            tracing::debug!(intent = %intent, "executing query for intent");
        }

        let statement = match BoundStatement::compile(
            template,
            &request.parameters,
            self.pool.placeholder_style(),
        ) {
            Ok(statement) => statement,
            Err(e) => {
                tracing::warn!(error = %e, "query rejected before execution");
                return QueryOutcome::failure(e.to_string());
            }
        };

        if let Some(gate) = &self.gate {
            gate.acquire().await;
        }

        let started = Instant::now();
        let result = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.run(&statement))
                .await
                .unwrap_or(Err(DatabaseError::Timeout(limit))),
            None => self.run(&statement).await,
        };

        match result {
            Ok(cursor) => {
                let outcome = self.classify(cursor);
                tracing::info!(
                    status = %outcome.status(),
                    rows = outcome.row_count().unwrap_or(0),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "query executed"
                );
                outcome
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "query failed"
                );
                QueryOutcome::failure(e.to_string())
            }
        }
    }

    /// Lease, execute, and release. The lease is dropped on return from this
    /// function on every path, including cancellation of the caller.
    async fn run(&self, statement: &BoundStatement) -> Result<Cursor, DatabaseError> {
        let mut lease = self.pool.acquire().await?;
        tracing::debug!(lease = lease.id(), sql = statement.sql(), "dispatching statement");
        lease.execute(statement).await
    }

    fn classify(&self, cursor: Cursor) -> QueryOutcome {
        let columns: Vec<String> = cursor
            .columns()
            .iter()
            .map(|c| self.column_case.apply(c))
            .collect();

        let rows = cursor
            .fetch_all()
            .into_iter()
            .map(|values| Row::new(columns.iter().cloned().zip(values).collect()))
            .collect();

        QueryOutcome::from_rows(rows)
    }
}

impl fmt::Debug for PooledQueryExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledQueryExecutor")
            .field("gate", &self.gate)
            .field("column_case", &self.column_case)
            .field("timeout", &self.timeout)
            .field("usage", &self.pool.usage())
            .finish()
    }
}
