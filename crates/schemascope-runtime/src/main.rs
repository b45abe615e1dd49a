//! schemascope: live structural diagrams for SQLite, PostgreSQL and Redis.
//!
//! One process introspects every configured store, renders each table or
//! key namespace as a flowchart, and pushes fresh diagram sets to WebSocket
//! observers on a timer and on store change notifications.

use clap::Parser;

mod broadcast;
mod cli;
mod config;
mod connector;
mod daemon;
#[cfg(test)]
mod fake;
mod multiplexer;
mod refresh;
mod server;
mod source;

fn init_tracing() {
    let filter = std::env::var("SCHEMASCOPE_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();
    init_tracing();

    let command = args
        .command
        .unwrap_or_else(|| cli::Command::Serve(cli::ServeOpts::default()));

    match command {
        cli::Command::Serve(opts) => {
            tracing::info!(config = %args.config.display(), "schemascope starting");
            daemon::run_daemon(opts, &args.config).await?;
        }
        cli::Command::Render(opts) => {
            daemon::run_render(opts, &args.config).await?;
        }
        cli::Command::CheckConfig => {
            daemon::run_check_config(&args.config)?;
        }
    }

    Ok(())
}
