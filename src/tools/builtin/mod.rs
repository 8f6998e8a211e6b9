//! Built-in tools that come with the crate.

mod query;

pub use query::QueryTool;
