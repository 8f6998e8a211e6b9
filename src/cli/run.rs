//! Subcommand execution.

use std::sync::Arc;

use crate::cli::Command;
use crate::config::Config;
use crate::db::{ConnectionPool, seed};
use crate::query::PooledQueryExecutor;
use crate::tools::builtin::QueryTool;
use crate::tools::{RequestGate, ToolContext, ToolRegistry};

/// Wire the query tool over `pool` with the configured gate and timeout.
///
/// The timeout is given to the executor, where it starts after gate
/// admission, so a call queued behind a full window still gets a classified
/// outcome.
pub async fn build_tool_registry(pool: Arc<dyn ConnectionPool>, config: &Config) -> ToolRegistry {
    let gate = Arc::new(RequestGate::from_config(&config.gate));
    let executor = PooledQueryExecutor::new(pool)
        .with_gate(gate)
        .with_column_case(config.query.column_case)
        .with_timeout(config.query.tool_timeout);

    let registry = ToolRegistry::new();
    registry.register(Arc::new(QueryTool::new(executor))).await;
    registry
}

/// Run one subcommand against an already-open pool.
pub async fn run_command(
    command: Command,
    pool: Arc<dyn ConnectionPool>,
    config: &Config,
) -> anyhow::Result<()> {
    match command {
        Command::Seed => {
            let report = seed::seed_demo_data(pool.as_ref()).await?;
            println!(
                "Seeded {} deposit rows and {} loan rows.",
                report.deposits, report.loans
            );
        }
        Command::Query {
            sql,
            params,
            intent,
        } => {
            let registry = build_tool_registry(pool, config).await;
            let input = serde_json::json!({
                "sql_template": sql,
                "params": params.into_iter().collect::<serde_json::Map<_, _>>(),
                "original_query": intent,
            });
            let output = registry
                .invoke("database_query", input, &ToolContext::default())
                .await?;
            println!("{}", serde_json::to_string_pretty(&output.result)?);
        }
        Command::Tools => {
            let registry = build_tool_registry(pool, config).await;
            println!(
                "{}",
                serde_json::to_string_pretty(&registry.schemas().await)?
            );
        }
    }
    Ok(())
}
