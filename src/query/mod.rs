//! Rate-gated, pool-backed query execution.
//!
//! - [`QueryRequest`]: statement template, named parameters, original intent
//! - [`PooledQueryExecutor`]: leases a connection, runs one statement, returns it
//! - [`QueryOutcome`]: `Success`, `EmptySuccess` or `Failure`

mod executor;
mod outcome;
mod request;

pub use executor::{ColumnCase, NO_STATEMENT, PooledQueryExecutor};
pub use outcome::{NO_MATCHING_RECORDS, OutcomeStatus, QueryOutcome, Row};
pub use request::{QueryRequest, RequestError};
