//! Tri-state result contract returned to the agent-tool layer.

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::json;

use crate::db::SqlValue;
use crate::query::QueryRequest;

/// Message attached to an empty result so the agent does not retry.
pub const NO_MATCHING_RECORDS: &str = "No matching records found";

/// One result row: column names paired with values, in projection order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    fields: Vec<(String, SqlValue)>,
}

impl Row {
    pub fn new(fields: Vec<(String, SqlValue)>) -> Self {
        Self { fields }
    }

    /// Value of the first column named `column`.
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Outcome status tag exposed to the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeStatus {
    Success,
    SuccessNoData,
    Error,
}

impl OutcomeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::SuccessNoData => "SUCCESS_NO_DATA",
            Self::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classified result of one statement execution. Exactly one case holds.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    /// At least one row came back.
    Success { rows: Vec<Row>, row_count: usize },
    /// The statement ran without error and matched nothing.
    EmptySuccess,
    /// Validation or execution failed.
    Failure { error_message: String },
}

impl QueryOutcome {
    /// Classify materialized rows: none is [`EmptySuccess`](Self::EmptySuccess).
    pub fn from_rows(rows: Vec<Row>) -> Self {
        if rows.is_empty() {
            Self::EmptySuccess
        } else {
            let row_count = rows.len();
            Self::Success { rows, row_count }
        }
    }

    pub fn failure(error_message: impl Into<String>) -> Self {
        Self::Failure {
            error_message: error_message.into(),
        }
    }

    /// True for both success variants.
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failure { .. })
    }

    pub fn status(&self) -> OutcomeStatus {
        match self {
            Self::Success { .. } => OutcomeStatus::Success,
            Self::EmptySuccess => OutcomeStatus::SuccessNoData,
            Self::Failure { .. } => OutcomeStatus::Error,
        }
    }

    pub fn rows(&self) -> &[Row] {
        match self {
            Self::Success { rows, .. } => rows,
            _ => &[],
        }
    }

    /// Row count for successful outcomes; `None` on failure.
    pub fn row_count(&self) -> Option<usize> {
        match self {
            Self::Success { row_count, .. } => Some(*row_count),
            Self::EmptySuccess => Some(0),
            Self::Failure { .. } => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Failure { error_message } => Some(error_message),
            _ => None,
        }
    }

    /// Structured payload for the agent.
    ///
    /// Always carries `isSuccess` and `status`; the remaining keys depend on
    /// the variant. Successful payloads echo the template and parameters so
    /// the agent can cite what it ran.
    pub fn to_payload(&self, request: &QueryRequest) -> serde_json::Value {
        match self {
            Self::Success { rows, row_count } => json!({
                "isSuccess": true,
                "status": self.status().as_str(),
                "query_result": rows,
                "row_count": row_count,
                "sql_template": request.statement_template.trim(),
                "parameters": request.parameters,
            }),
            Self::EmptySuccess => json!({
                "isSuccess": true,
                "status": self.status().as_str(),
                "query_result": [],
                "row_count": 0,
                "message": NO_MATCHING_RECORDS,
            }),
            Self::Failure { error_message } => json!({
                "isSuccess": false,
                "status": self.status().as_str(),
                "error": error_message,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn alice_row() -> Row {
        Row::new(vec![("BALANCE".into(), SqlValue::Integer(1000))])
    }

    #[test]
    fn test_from_rows_classifies() {
        assert_eq!(QueryOutcome::from_rows(vec![]), QueryOutcome::EmptySuccess);
        assert_eq!(
            QueryOutcome::from_rows(vec![alice_row()]),
            QueryOutcome::Success {
                rows: vec![alice_row()],
                row_count: 1
            }
        );
    }

    #[test]
    fn test_accessors() {
        let failure = QueryOutcome::failure("boom");
        assert!(!failure.is_success());
        assert_eq!(failure.row_count(), None);
        assert_eq!(failure.error_message(), Some("boom"));
        assert!(failure.rows().is_empty());

        let empty = QueryOutcome::EmptySuccess;
        assert!(empty.is_success());
        assert_eq!(empty.row_count(), Some(0));
        assert_eq!(empty.status().to_string(), "SUCCESS_NO_DATA");
    }

    #[test]
    fn test_row_serializes_in_column_order() {
        let row = Row::new(vec![
            ("Z".into(), SqlValue::Integer(1)),
            ("A".into(), SqlValue::Null),
        ]);
        assert_eq!(serde_json::to_string(&row).unwrap(), r#"{"Z":1,"A":null}"#);
        assert_eq!(row.columns().collect::<Vec<_>>(), vec!["Z", "A"]);
    }

    #[test]
    fn test_success_payload() {
        let request = QueryRequest::new(" SELECT balance FROM deposit WHERE account_holder = :name ")
            .with_param("name", "Alice");
        let outcome = QueryOutcome::from_rows(vec![alice_row()]);

        assert_eq!(
            outcome.to_payload(&request),
            json!({
                "isSuccess": true,
                "status": "SUCCESS",
                "query_result": [{"BALANCE": 1000}],
                "row_count": 1,
                "sql_template": "SELECT balance FROM deposit WHERE account_holder = :name",
                "parameters": {"name": "Alice"}
            })
        );
    }

    #[test]
    fn test_empty_payload() {
        let request = QueryRequest::new("SELECT 1 WHERE 0");
        assert_eq!(
            QueryOutcome::EmptySuccess.to_payload(&request),
            json!({
                "isSuccess": true,
                "status": "SUCCESS_NO_DATA",
                "query_result": [],
                "row_count": 0,
                "message": "No matching records found"
            })
        );
    }

    #[test]
    fn test_failure_payload() {
        let request = QueryRequest::new("SELEKT 1");
        assert_eq!(
            QueryOutcome::failure("syntax error").to_payload(&request),
            json!({
                "isSuccess": false,
                "status": "ERROR",
                "error": "syntax error"
            })
        );
    }
}
