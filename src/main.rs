//! Round-robin HTTP load balancer.
//!
//! # Architecture Overview
//!
//! ```text
//!                          ┌──────────────────────────────────────────────────────┐
//!                          │                   LOAD BALANCER                      │
//!                          │                                                      │
//!     Client Request       │  ┌──────────┐   ┌──────────┐   ┌──────────────┐      │
//!     ─────────────────────┼─▶│  http    │──▶│ resolve  │──▶│   intake     │      │
//!                          │  │ server   │   │ (waits)  │   │   queue      │      │
//!                          │  └──────────┘   └────▲─────┘   └──────┬───────┘      │
//!                          │                      │                ▼              │
//!                          │                      │         ┌──────────────┐      │
//!                          │          one-shot    │         │  dispatcher  │      │
//!                          │          response ───┤         │ (cursor, RR  │      │
//!                          │          slot        │         │  + failover) │      │
//!                          │                      │         └──────┬───────┘      │
//!                          │                      │                ▼ spawn        │
//!     Client Response      │                 ┌────┴────────────────────────┐      │
//!     ◀────────────────────┼─────────────────│   forwarding task           │◀─────┼──── Backend
//!                          │                 └─────────────────────────────┘      │
//!                          │                                                      │
//!                          │   health monitor per backend ──▶ atomic health flag  │
//!                          └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use failover_lb::config::{loader, LbConfig};
use failover_lb::lifecycle::startup;
use failover_lb::observability::logging;

#[derive(Parser, Debug)]
#[command(name = "failover-lb", version, about = "Round-robin HTTP load balancer with health-checked failover")]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides the file).
    #[arg(short, long, env = "LB_PORT")]
    port: Option<u16>,

    /// Comma-separated backend base addresses (overrides the file).
    #[arg(short, long, env = "LB_BACKENDS", value_delimiter = ',')]
    backends: Vec<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,
}

fn build_config(cli: Cli) -> Result<LbConfig, loader::ConfigError> {
    let mut config = match &cli.config {
        Some(path) => loader::read_config(path)?,
        None => LbConfig::default(),
    };

    if let Some(port) = cli.port {
        config.listener.set_port(port);
    }
    let backends: Vec<String> = cli
        .backends
        .into_iter()
        .filter(|b| !b.trim().is_empty())
        .collect();
    if !backends.is_empty() {
        config.backends = backends;
    }
    if let Some(level) = cli.log_level {
        config.observability.log_level = level;
    }

    loader::validated(config)
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = match build_config(Cli::parse()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("failover-lb: {}", e);
            return ExitCode::from(2);
        }
    };

    logging::init(&config.observability.log_level);
    tracing::info!("failover-lb v{} starting", env!("CARGO_PKG_VERSION"));

    match startup::run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Fatal error");
            ExitCode::FAILURE
        }
    }
}
