//! CLI definition using clap derive.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use schemascope_core::DEFAULT_SIZE_THRESHOLD;

pub const DEFAULT_CONFIG_PATH: &str = "schemascope.toml";
pub const DEFAULT_LISTEN: &str = "127.0.0.1:3070";

#[derive(Parser)]
#[command(name = "schemascope", about = "Live schema diagrams for SQLite, PostgreSQL and Redis")]
pub struct Cli {
    /// Sources file (TOML)
    #[arg(
        long,
        short = 'c',
        global = true,
        env = "SCHEMASCOPE_CONFIG",
        default_value = DEFAULT_CONFIG_PATH
    )]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Watch all sources and serve diagrams over HTTP and WebSocket
    Serve(ServeOpts),
    /// Introspect every source once and print the diagrams as JSON
    Render(RenderOpts),
    /// Validate the sources file and exit
    CheckConfig,
}

#[derive(clap::Args)]
pub struct ServeOpts {
    /// Address for the HTTP/WebSocket listener
    #[arg(long, env = "SCHEMASCOPE_LISTEN", default_value = DEFAULT_LISTEN)]
    pub listen: SocketAddr,

    /// Timer refresh period in milliseconds
    #[arg(
        long,
        env = "SCHEMASCOPE_POLL_INTERVAL_MS",
        default_value = "5000",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub poll_interval_ms: u64,

    #[command(flatten)]
    pub refresh: RefreshOpts,
}

impl Default for ServeOpts {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([127, 0, 0, 1], 3070)),
            poll_interval_ms: 5000,
            refresh: RefreshOpts::default(),
        }
    }
}

impl ServeOpts {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(clap::Args)]
pub struct RefreshOpts {
    /// Per-source introspection timeout in milliseconds
    #[arg(
        long,
        env = "SCHEMASCOPE_SOURCE_TIMEOUT_MS",
        default_value = "3000",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub source_timeout_ms: u64,

    /// Rendered length above which a diagram is classified large
    #[arg(long, env = "SCHEMASCOPE_SIZE_THRESHOLD", default_value_t = DEFAULT_SIZE_THRESHOLD)]
    pub size_threshold: usize,
}

impl Default for RefreshOpts {
    fn default() -> Self {
        Self {
            source_timeout_ms: 3000,
            size_threshold: DEFAULT_SIZE_THRESHOLD,
        }
    }
}

impl RefreshOpts {
    pub fn source_timeout(&self) -> Duration {
        Duration::from_millis(self.source_timeout_ms)
    }
}

#[derive(clap::Args, Default)]
pub struct RenderOpts {
    /// Pretty-print the JSON output
    #[arg(long)]
    pub pretty: bool,

    #[command(flatten)]
    pub refresh: RefreshOpts,
}
