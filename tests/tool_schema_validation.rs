//! Validates that every tool the binary registers exposes a well-formed schema.
//!
//! Catches `required` keys missing from `properties`, non-object roots, and
//! untyped or shapeless properties before an agent ever sees the function
//! definition.

use std::sync::Arc;

use querygate::cli::build_tool_registry;
use querygate::config::{Config, DatabaseConfig, GateConfig, QueryConfig};
use querygate::db::ConnectionPool;
use querygate::testing::StubPool;
use querygate::tools::validate_tool_schema;

fn default_config() -> Config {
    Config {
        database: DatabaseConfig::default(),
        gate: GateConfig::default(),
        query: QueryConfig::default(),
    }
}

#[tokio::test]
async fn all_registered_tool_schemas_are_valid() {
    let pool: Arc<dyn ConnectionPool> = Arc::new(StubPool::empty(&[]));
    let registry = build_tool_registry(pool, &default_config()).await;

    let tools = registry.all().await;
    assert!(!tools.is_empty(), "registry should have tools after registration");

    let mut all_errors = Vec::new();
    for tool in &tools {
        let errors = validate_tool_schema(&tool.parameters_schema(), tool.name());
        if !errors.is_empty() {
            all_errors.push(format!(
                "Tool '{}' has schema errors:\n  {}",
                tool.name(),
                errors.join("\n  ")
            ));
        }
    }

    assert!(
        all_errors.is_empty(),
        "Tool schema validation failures:\n{}",
        all_errors.join("\n\n")
    );
}

/// Guards against a new tool being registered without schema coverage.
#[tokio::test]
async fn registration_covers_expected_tools() {
    let pool: Arc<dyn ConnectionPool> = Arc::new(StubPool::empty(&[]));
    let registry = build_tool_registry(pool, &default_config()).await;

    let mut names = registry.list().await;
    names.sort();
    assert_eq!(names, vec!["database_query".to_string()]);
}

#[tokio::test]
async fn query_tool_requires_template_only() {
    let pool: Arc<dyn ConnectionPool> = Arc::new(StubPool::empty(&[]));
    let registry = build_tool_registry(pool, &default_config()).await;

    let schema = registry
        .get("database_query")
        .await
        .expect("query tool registered")
        .parameters_schema();

    assert_eq!(schema["required"], serde_json::json!(["sql_template"]));
    assert_eq!(schema["properties"]["params"]["type"], "object");
    assert_eq!(
        schema["properties"]["params"]["additionalProperties"]["type"],
        serde_json::json!(["string", "number", "boolean", "null"])
    );
}
