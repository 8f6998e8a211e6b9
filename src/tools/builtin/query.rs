//! Parameterized database query tool.

use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::query::{PooledQueryExecutor, QueryOutcome, QueryRequest};
use crate::tools::tool::{Tool, ToolContext, ToolError, ToolOutput};

/// Runs a prepared statement template chosen by the intent resolver.
///
/// The tool never raises on database problems: the payload's `isSuccess`
/// flag and `status` tag carry the classification. Once a call reports
/// `SUCCESS` or `SUCCESS_NO_DATA`, the agent should answer from it rather
/// than query again.
///
/// The registry does not time this tool. Waiting on the executor's gate is
/// unbounded by design of the gate, and the executor's own timeout covers
/// leasing and execution, so a slow statement still ends as an `ERROR`
/// payload.
pub struct QueryTool {
    executor: PooledQueryExecutor,
}

impl QueryTool {
    pub fn new(executor: PooledQueryExecutor) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl Tool for QueryTool {
    fn name(&self) -> &str {
        "database_query"
    }

    fn description(&self) -> &str {
        "Execute a prepared SQL template against the database. Bind values through \
         'params' using the template's :name placeholders; never splice values into \
         the SQL. Returns isSuccess and a status of SUCCESS (rows in query_result), \
         SUCCESS_NO_DATA (no matching records, do not retry) or ERROR."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "sql_template": {
                    "type": "string",
                    "description": "SQL statement with :name placeholders"
                },
                "params": {
                    "type": "object",
                    "description": "Values for the template placeholders, keyed by name",
                    "additionalProperties": {
                        "type": ["string", "number", "boolean", "null"]
                    }
                },
                "original_query": {
                    "type": "string",
                    "description": "The user's original question, for logging"
                }
            },
            "required": ["sql_template"]
        })
    }

    async fn execute(
        &self,
        params: serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        let started = Instant::now();

        let request = match QueryRequest::from_tool_input(&params) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(request_id = %ctx.request_id, error = %e, "malformed query tool input");
                let payload = QueryOutcome::failure(e.to_string()).to_payload(&QueryRequest::default());
                return Ok(ToolOutput::success(payload, started.elapsed()));
            }
        };

        let outcome = self.executor.execute(&request).await;
        tracing::debug!(
            request_id = %ctx.request_id,
            user = %ctx.user_id,
            status = %outcome.status(),
            "query tool finished"
        );

        Ok(ToolOutput::success(
            outcome.to_payload(&request),
            started.elapsed(),
        ))
    }

    fn execution_timeout(&self) -> Option<Duration> {
        None
    }
}
