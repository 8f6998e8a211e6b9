//! Agent-facing tool system.
//!
//! Tools are the agent's interface to the database. This module provides:
//! - The [`Tool`] trait and its schema/output types
//! - [`ToolRegistry`] for lookup and time-bounded invocation
//! - [`RequestGate`] for sliding-window throttling of outbound calls
//! - Built-in tools such as [`QueryTool`](builtin::QueryTool)

pub mod builtin;
pub mod rate_limiter;

mod registry;
mod tool;

pub use rate_limiter::{GateDecision, RequestGate};
pub use registry::ToolRegistry;
pub use tool::{Tool, ToolContext, ToolError, ToolOutput, ToolSchema, validate_tool_schema};
