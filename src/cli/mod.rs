//! CLI command handling.
//!
//! Provides subcommands for:
//! - Creating and filling the demo tables (`seed`)
//! - Running one statement through the query tool (`query`)
//! - Printing the registered tool schemas (`tools`)

mod run;

pub use run::{build_tool_registry, run_command};

use clap::{ColorChoice, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "querygate")]
#[command(about = "Rate-gated, pool-backed parameterized queries for agent tools")]
#[command(
    long_about = "querygate runs prepared SQL templates through a bounded connection pool behind a sliding-window request gate.\nExamples:\n  querygate seed\n  querygate query --sql 'SELECT balance FROM deposit WHERE account_holder = :name' --param name=Alice"
)]
#[command(version)]
#[command(color = ColorChoice::Auto)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create the demo tables and insert the demo rows
    #[command(
        about = "Seed demo data",
        long_about = "Creates the deposit and loan tables and inserts the demo rows. Safe to run repeatedly.\nExample: querygate seed"
    )]
    Seed,

    /// Run one statement through the database_query tool
    #[command(
        about = "Run a query",
        long_about = "Executes a SQL template with named parameters and prints the tool payload.\nExample: querygate query --sql 'SELECT money FROM loan WHERE borrower = :who' --param who=Kim"
    )]
    Query {
        /// SQL template with :name placeholders
        #[arg(long)]
        sql: String,

        /// Placeholder value as key=value (repeatable). Numbers, true/false and null are typed.
        #[arg(short, long = "param", value_parser = parse_param)]
        params: Vec<(String, serde_json::Value)>,

        /// The natural-language question this query answers
        #[arg(long)]
        intent: Option<String>,
    },

    /// Print the registered tool schemas as JSON
    Tools,
}

/// Parse `key=value`. The value is read as a JSON scalar when it is one,
/// otherwise taken verbatim as text.
fn parse_param(raw: &str) -> Result<(String, serde_json::Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;

    let key = key.trim().trim_start_matches(':');
    if key.is_empty() {
        return Err(format!("empty parameter name in '{raw}'"));
    }

    let value = match serde_json::from_str::<serde_json::Value>(value) {
        Ok(v) if !v.is_array() && !v.is_object() => v,
        _ => serde_json::Value::String(value.to_string()),
    };
    Ok((key.to_string(), value))
}
