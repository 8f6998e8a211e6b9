//! Tool registry: lookup by name and time-bounded invocation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::RwLock;

use crate::tools::tool::{Tool, ToolContext, ToolError, ToolOutput, ToolSchema, validate_tool_schema};

/// Registry of tools available to the agent.
#[derive(Default)]
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Arc<dyn Tool>>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, replacing any tool with the same name.
    ///
    /// Schema problems are logged, not fatal: the agent can still call the
    /// tool, it just may get a less helpful function definition.
    pub async fn register(&self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        let errors = validate_tool_schema(&tool.parameters_schema(), &name);
        if !errors.is_empty() {
            tracing::warn!(tool = %name, errors = ?errors, "tool schema has problems");
        }

        if self.tools.write().await.insert(name.clone(), tool).is_some() {
            tracing::debug!(tool = %name, "replaced registered tool");
        } else {
            tracing::debug!(tool = %name, "registered tool");
        }
    }

    pub async fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.read().await.get(name).cloned()
    }

    /// Registered tool names.
    pub async fn list(&self) -> Vec<String> {
        self.tools.read().await.keys().cloned().collect()
    }

    pub async fn all(&self) -> Vec<Arc<dyn Tool>> {
        self.tools.read().await.values().cloned().collect()
    }

    /// Function-calling definitions of every tool, sorted by name.
    pub async fn schemas(&self) -> Vec<ToolSchema> {
        let mut schemas: Vec<ToolSchema> = self
            .tools
            .read()
            .await
            .values()
            .map(|t| t.schema())
            .collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    /// Run the named tool under its execution timeout, if it has one.
    ///
    /// On timeout the tool's future is dropped, which cancels any in-flight
    /// work and releases whatever it held.
    pub async fn invoke(
        &self,
        name: &str,
        params: serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        let tool = self
            .get(name)
            .await
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;

        let started = Instant::now();
        tracing::debug!(tool = name, request_id = %ctx.request_id, "invoking tool");

        let result = match tool.execution_timeout() {
            Some(timeout) => match tokio::time::timeout(timeout, tool.execute(params, ctx)).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::warn!(
                        tool = name,
                        request_id = %ctx.request_id,
                        ?timeout,
                        "tool timed out"
                    );
                    return Err(ToolError::Timeout(timeout));
                }
            },
            None => tool.execute(params, ctx).await,
        };

        tracing::debug!(
            tool = name,
            request_id = %ctx.request_id,
            elapsed_ms = started.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "tool finished"
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;

    struct SleepyTool;

    #[async_trait]
    impl Tool for SleepyTool {
        fn name(&self) -> &str {
            "sleepy"
        }

        fn description(&self) -> &str {
            "Sleeps for a minute."
        }

        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object", "properties": {}})
        }

        async fn execute(
            &self,
            _params: serde_json::Value,
            _ctx: &ToolContext,
        ) -> Result<ToolOutput, ToolError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(ToolOutput::success(
                serde_json::json!("awake"),
                Duration::from_secs(60),
            ))
        }

        fn execution_timeout(&self) -> Option<Duration> {
            Some(Duration::from_secs(5))
        }
    }

    #[tokio::test]
    async fn test_register_and_lookup() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(SleepyTool)).await;

        assert!(registry.get("sleepy").await.is_some());
        assert_eq!(registry.list().await, vec!["sleepy".to_string()]);
        assert_eq!(registry.schemas().await[0].name, "sleepy");
    }

    #[tokio::test]
    async fn test_invoke_unknown_tool() {
        let registry = ToolRegistry::new();
        let err = registry
            .invoke("missing", serde_json::json!({}), &ToolContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::NotFound(name) if name == "missing"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_invoke_times_out() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(SleepyTool)).await;

        let err = registry
            .invoke("sleepy", serde_json::json!({}), &ToolContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Timeout(d) if d == Duration::from_secs(5)));
    }

    struct SelfBoundedTool;

    #[async_trait]
    impl Tool for SelfBoundedTool {
        fn name(&self) -> &str {
            "self_bounded"
        }

        fn description(&self) -> &str {
            "Sleeps for two minutes under its own deadline."
        }

        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object", "properties": {}})
        }

        async fn execute(
            &self,
            _params: serde_json::Value,
            _ctx: &ToolContext,
        ) -> Result<ToolOutput, ToolError> {
            tokio::time::sleep(Duration::from_secs(120)).await;
            Ok(ToolOutput::success(
                serde_json::json!("done"),
                Duration::from_secs(120),
            ))
        }

        fn execution_timeout(&self) -> Option<Duration> {
            None
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_invoke_without_timeout_runs_to_completion() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(SelfBoundedTool)).await;

        let output = registry
            .invoke("self_bounded", serde_json::json!({}), &ToolContext::default())
            .await
            .unwrap();
        assert_eq!(output.result, serde_json::json!("done"));
    }
}
