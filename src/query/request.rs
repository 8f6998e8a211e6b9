//! Canonical query request and its ingress from tool input.

use thiserror::Error;

use crate::db::{JsonValueError, Parameters, SqlValue};

/// Problems with the shape of a tool call's input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("tool input must be a JSON object")]
    NotAnObject,

    #[error("'{0}' must be a JSON object mapping placeholder names to values")]
    ParametersNotObject(&'static str),

    #[error("parameter '{0}' must be a string, number, boolean or null")]
    NonScalarParameter(String),

    #[error("parameter '{0}' is an integer outside the 64-bit signed range")]
    IntegerOutOfRange(String),
}

/// One statement to execute, with its bound values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryRequest {
    /// Statement text with `:name` placeholders.
    pub statement_template: String,
    /// Values keyed by placeholder name.
    pub parameters: Parameters,
    /// The user's original question. Diagnostics only.
    pub original_intent: Option<String>,
}

impl QueryRequest {
    pub fn new(statement_template: impl Into<String>) -> Self {
        Self {
            statement_template: statement_template.into(),
            ..Self::default()
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    pub fn with_parameters(mut self, parameters: Parameters) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_intent(mut self, intent: impl Into<String>) -> Self {
        self.original_intent = Some(intent.into());
        self
    }

    /// Normalize a tool call's JSON input.
    ///
    /// Recognized keys: `sql_template`, `params` (or the legacy spelling
    /// `parameters`) and `original_query`. When both parameter spellings are
    /// present, `params` wins unless it is null or an empty object. A missing
    /// template becomes an empty one, which the executor rejects before
    /// touching the pool.
    pub fn from_tool_input(input: &serde_json::Value) -> Result<Self, RequestError> {
        let obj = input.as_object().ok_or(RequestError::NotAnObject)?;

        let statement_template = obj
            .get("sql_template")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        let supplied = |key: &str| {
            obj.get(key).filter(|v| {
                !v.is_null() && !v.as_object().is_some_and(|map| map.is_empty())
            })
        };
        let (key, raw) = match supplied("params") {
            Some(v) => ("params", Some(v)),
            None => ("parameters", supplied("parameters")),
        };

        let mut parameters = Parameters::new();
        if let Some(raw) = raw {
            let map = raw
                .as_object()
                .ok_or(RequestError::ParametersNotObject(key))?;
            for (name, value) in map {
                let value = SqlValue::from_json(value).map_err(|e| match e {
                    JsonValueError::NotScalar => RequestError::NonScalarParameter(name.clone()),
                    JsonValueError::IntegerOutOfRange => {
                        RequestError::IntegerOutOfRange(name.clone())
                    }
                })?;
                parameters.insert(name.clone(), value);
            }
        }

        let original_intent = obj
            .get("original_query")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        Ok(Self {
            statement_template,
            parameters,
            original_intent,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_params_key() {
        let req = QueryRequest::from_tool_input(&json!({
            "sql_template": "SELECT balance FROM deposit WHERE account_holder = :name",
            "params": {"name": "Alice"},
            "original_query": "How much does Alice have?"
        }))
        .unwrap();

        assert_eq!(req.parameters.get("name"), Some(&SqlValue::Text("Alice".into())));
        assert_eq!(req.original_intent.as_deref(), Some("How much does Alice have?"));
    }

    #[test]
    fn test_legacy_parameters_key() {
        let req = QueryRequest::from_tool_input(&json!({
            "sql_template": "SELECT 1",
            "parameters": {"borrower": "Kim"}
        }))
        .unwrap();

        assert_eq!(req.parameters.get("borrower"), Some(&SqlValue::Text("Kim".into())));
    }

    #[test]
    fn test_params_wins_over_parameters() {
        let req = QueryRequest::from_tool_input(&json!({
            "sql_template": "SELECT 1",
            "params": {"name": "Alice"},
            "parameters": {"name": "Bob", "other": 1}
        }))
        .unwrap();

        assert_eq!(req.parameters.len(), 1);
        assert_eq!(req.parameters.get("name"), Some(&SqlValue::Text("Alice".into())));
    }

    #[test]
    fn test_null_params_falls_back_to_parameters() {
        let req = QueryRequest::from_tool_input(&json!({
            "sql_template": "SELECT 1",
            "params": null,
            "parameters": {"name": "Bob"}
        }))
        .unwrap();

        assert_eq!(req.parameters.get("name"), Some(&SqlValue::Text("Bob".into())));
    }

    #[test]
    fn test_empty_params_falls_back_to_parameters() {
        let req = QueryRequest::from_tool_input(&json!({
            "sql_template": "SELECT 1",
            "params": {},
            "parameters": {"name": "Bob"}
        }))
        .unwrap();

        assert_eq!(req.parameters.get("name"), Some(&SqlValue::Text("Bob".into())));
    }

    #[test]
    fn test_integer_above_i64_rejected() {
        let err = QueryRequest::from_tool_input(&json!({
            "sql_template": "SELECT :id",
            "params": {"id": 18_446_744_073_709_551_615u64}
        }))
        .unwrap_err();
        assert_eq!(err, RequestError::IntegerOutOfRange("id".into()));
    }

    #[test]
    fn test_missing_template_is_empty() {
        let req = QueryRequest::from_tool_input(&json!({})).unwrap();
        assert!(req.statement_template.is_empty());
        assert!(req.parameters.is_empty());
        assert_eq!(req.original_intent, None);
    }

    #[test]
    fn test_non_object_input_rejected() {
        assert_eq!(
            QueryRequest::from_tool_input(&json!("SELECT 1")),
            Err(RequestError::NotAnObject)
        );
    }

    #[test]
    fn test_non_object_parameters_rejected() {
        assert_eq!(
            QueryRequest::from_tool_input(&json!({"sql_template": "x", "parameters": [1]})),
            Err(RequestError::ParametersNotObject("parameters"))
        );
    }

    #[test]
    fn test_nested_parameter_rejected() {
        let err = QueryRequest::from_tool_input(&json!({
            "sql_template": "x",
            "params": {"name": {"first": "Alice"}}
        }))
        .unwrap_err();
        assert_eq!(err, RequestError::NonScalarParameter("name".into()));
    }

    #[test]
    fn test_builder() {
        let req = QueryRequest::new("SELECT :a")
            .with_param("a", 1)
            .with_intent("why");
        assert_eq!(req.parameters.get("a"), Some(&SqlValue::Integer(1)));
        assert_eq!(req.original_intent.as_deref(), Some("why"));
    }
}
