//! Rate-gated, pool-backed parameterized query execution for agent tools.
//!
//! An agent resolves a natural-language question to a prepared SQL template
//! and calls the `database_query` tool. The tool admits the call through a
//! sliding-window [`RequestGate`](tools::RequestGate), borrows one connection
//! from a bounded pool, runs the statement with bound parameters, and
//! classifies the result as `Success`, `EmptySuccess` or `Failure`.

pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod query;
pub mod testing;
pub mod tools;
