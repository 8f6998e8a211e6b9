//! Tool trait and types.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Per-invocation context handed to a tool.
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// Who the agent is acting for.
    pub user_id: String,
    /// Correlates log lines of one invocation.
    pub request_id: Uuid,
}

impl ToolContext {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            request_id: Uuid::new_v4(),
        }
    }
}

impl Default for ToolContext {
    fn default() -> Self {
        Self::new("local")
    }
}

/// Error type for tool execution.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),
}

/// Output from a tool execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutput {
    /// The result data.
    pub result: serde_json::Value,
    /// Time taken.
    pub duration: Duration,
}

impl ToolOutput {
    pub fn success(result: serde_json::Value, duration: Duration) -> Self {
        Self { result, duration }
    }
}

/// Function-calling definition of a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Trait for tools that the agent can use.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool name.
    fn name(&self) -> &str;

    /// Get a description of what the tool does.
    fn description(&self) -> &str;

    /// Get the JSON Schema for the tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given parameters.
    async fn execute(
        &self,
        params: serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<ToolOutput, ToolError>;

    /// Maximum time the registry lets this tool run before cancelling it.
    ///
    /// `None` means the tool bounds its own work, for example because part of
    /// it is queueing behind a rate gate that must not count against a
    /// deadline. Default: 60 seconds.
    fn execution_timeout(&self) -> Option<Duration> {
        Some(Duration::from_secs(60))
    }

    /// Get the tool schema for LLM function calling.
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

const JSON_TYPES: [&str; 7] = [
    "string", "number", "integer", "boolean", "null", "object", "array",
];

/// Structural check of a tool's `parameters_schema()`, run at registration.
///
/// Returns a list of errors; empty means valid. The root must be an object
/// with `properties`, and every `required` key must be one of them. Each
/// property's `type` must name JSON types, either as a string or a list. An
/// object property must describe its values through `properties` (checked
/// recursively) or through `additionalProperties`, which is how a map of
/// placeholder names to scalars is declared.
pub fn validate_tool_schema(schema: &serde_json::Value, path: &str) -> Vec<String> {
    let mut errors = Vec::new();

    if schema.get("type").and_then(|t| t.as_str()) != Some("object") {
        errors.push(format!("{path}: root must declare \"type\": \"object\""));
        return errors;
    }

    let Some(properties) = schema.get("properties").and_then(|p| p.as_object()) else {
        errors.push(format!("{path}: missing or non-object \"properties\""));
        return errors;
    };

    if let Some(required) = schema.get("required").and_then(|r| r.as_array()) {
        for key in required.iter().filter_map(|r| r.as_str()) {
            if !properties.contains_key(key) {
                errors.push(format!(
                    "{path}: required key \"{key}\" not found in properties"
                ));
            }
        }
    }

    for (key, prop) in properties {
        let prop_path = format!("{path}.{key}");
        let types = match declared_types(prop, &prop_path) {
            Ok(types) => types,
            Err(e) => {
                errors.push(e);
                continue;
            }
        };

        if types.contains(&"object") {
            match (prop.get("properties"), prop.get("additionalProperties")) {
                (Some(_), _) => errors.extend(validate_tool_schema(prop, &prop_path)),
                (None, Some(serde_json::Value::Bool(_))) => {}
                (None, Some(values)) => {
                    if let Err(e) = declared_types(values, &format!("{prop_path}.*")) {
                        errors.push(e);
                    }
                }
                (None, None) => errors.push(format!(
                    "{prop_path}: object property needs \"properties\" or \"additionalProperties\""
                )),
            }
        }
    }

    errors
}

fn declared_types<'a>(prop: &'a serde_json::Value, path: &str) -> Result<Vec<&'a str>, String> {
    let types: Vec<&str> = match prop.get("type") {
        Some(serde_json::Value::String(t)) => vec![t.as_str()],
        Some(serde_json::Value::Array(list)) => list.iter().filter_map(|t| t.as_str()).collect(),
        Some(other) => return Err(format!("{path}: \"type\" must be a string or list, got {other}")),
        None => return Err(format!("{path}: missing \"type\"")),
    };

    match types.iter().find(|t| !JSON_TYPES.contains(t)) {
        Some(unknown) => Err(format!("{path}: unknown type \"{unknown}\"")),
        None if types.is_empty() => Err(format!("{path}: empty \"type\" list")),
        None => Ok(types),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    struct PingTool;

    #[async_trait]
    impl Tool for PingTool {
        fn name(&self) -> &str {
            "ping"
        }

        fn description(&self) -> &str {
            "Answers pong."
        }

        fn parameters_schema(&self) -> serde_json::Value {
            json!({"type": "object", "properties": {}})
        }

        async fn execute(
            &self,
            _params: serde_json::Value,
            _ctx: &ToolContext,
        ) -> Result<ToolOutput, ToolError> {
            Ok(ToolOutput::success(json!("pong"), Duration::ZERO))
        }
    }

    #[test]
    fn test_default_timeout_and_schema() {
        assert_eq!(PingTool.execution_timeout(), Some(Duration::from_secs(60)));
        let schema = PingTool.schema();
        assert_eq!(schema.name, "ping");
        assert_eq!(schema.parameters, json!({"type": "object", "properties": {}}));
    }

    #[test]
    fn test_context_request_ids_differ() {
        let a = ToolContext::new("alice");
        let b = ToolContext::new("alice");
        assert_ne!(a.request_id, b.request_id);
        assert_eq!(ToolContext::default().user_id, "local");
    }

    #[test]
    fn test_validate_placeholder_map_schema() {
        let schema = json!({
            "type": "object",
            "properties": {
                "sql_template": { "type": "string" },
                "params": {
                    "type": "object",
                    "additionalProperties": { "type": ["string", "number", "boolean", "null"] }
                }
            },
            "required": ["sql_template"]
        });
        let errors = validate_tool_schema(&schema, "query");
        assert!(errors.is_empty(), "unexpected errors: {errors:?}");
    }

    #[test]
    fn test_validate_root_must_be_object() {
        let errors = validate_tool_schema(&json!({"type": "string"}), "t");
        assert_eq!(errors, vec!["t: root must declare \"type\": \"object\"".to_string()]);
    }

    #[test]
    fn test_validate_required_not_in_properties() {
        let schema = json!({
            "type": "object",
            "properties": { "sql_template": { "type": "string" } },
            "required": ["sql_template", "params"]
        });
        let errors = validate_tool_schema(&schema, "t");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("\"params\" not found in properties"));
    }

    #[test]
    fn test_validate_map_value_types_checked() {
        let schema = json!({
            "type": "object",
            "properties": {
                "params": {
                    "type": "object",
                    "additionalProperties": { "type": ["string", "decimal"] }
                }
            }
        });
        let errors = validate_tool_schema(&schema, "t");
        assert_eq!(errors, vec!["t.params.*: unknown type \"decimal\"".to_string()]);
    }

    #[test]
    fn test_validate_object_without_shape() {
        let schema = json!({
            "type": "object",
            "properties": { "params": { "type": "object" } }
        });
        let errors = validate_tool_schema(&schema, "t");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("t.params: object property needs"));
    }

    #[test]
    fn test_validate_nested_object_recurses() {
        let schema = json!({
            "type": "object",
            "properties": {
                "options": {
                    "type": "object",
                    "properties": { "limit": { "type": "integer" } },
                    "required": ["limit", "offset"]
                }
            }
        });
        let errors = validate_tool_schema(&schema, "t");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("t.options:"));
    }

    #[test]
    fn test_validate_missing_property_type() {
        let schema = json!({
            "type": "object",
            "properties": { "original_query": { "description": "free text" } }
        });
        let errors = validate_tool_schema(&schema, "t");
        assert_eq!(errors, vec!["t.original_query: missing \"type\"".to_string()]);
    }
}
