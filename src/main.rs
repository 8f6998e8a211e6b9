//! querygate - main entry point.

use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use querygate::{
    cli::{Cli, run_command},
    config::Config,
    db::connect_from_config,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // .env.local overrides .env; neither overrides the real environment.
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::dotenv();

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("querygate=info"));
    if cli.log_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }

    let config = Config::from_env()?;
    tracing::debug!(
        backend = %config.database.backend,
        pool_size = config.database.pool_size,
        gate_capacity = config.gate.capacity,
        gate_window = ?config.gate.window,
        "configuration loaded"
    );

    let pool = connect_from_config(&config.database).await?;
    let result = run_command(cli.command, pool.clone(), &config).await;

    let usage = pool.usage();
    tracing::debug!(
        acquired = usage.acquired,
        released = usage.released,
        "closing connection pool"
    );
    pool.close();

    result
}
