//! Startup orchestration.
//!
//! # Responsibilities
//! - Validate configuration
//! - Start the metrics exporter (optional)
//! - Bind the listener, build backends, monitors and dispatcher
//! - Serve until the shutdown signal, then run the shutdown sequence

use std::future::Future;
use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::{loader, ConfigError, LbConfig};
use crate::http::HttpServer;
use crate::lifecycle::{signals, Shutdown};
use crate::observability::metrics;

/// Fatal errors raised before or while serving.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid metrics address \"{0}\"")]
    MetricsAddress(String),

    #[error("Failed to start metrics exporter: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error("Server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Run the load balancer until SIGINT/SIGTERM.
pub async fn run(config: LbConfig) -> Result<(), StartupError> {
    run_until(config, signals::shutdown_signal()).await
}

/// Run the load balancer until `signal` resolves.
pub async fn run_until<F>(config: LbConfig, signal: F) -> Result<(), StartupError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let config = loader::validated(config)?;

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config
            .observability
            .metrics_address
            .parse()
            .map_err(|_| StartupError::MetricsAddress(config.observability.metrics_address.clone()))?;
        metrics::init_metrics(addr)?;
    }

    let listener = TcpListener::bind(&config.listener.bind_address)
        .await
        .map_err(|source| StartupError::Bind {
            address: config.listener.bind_address.clone(),
            source,
        })?;
    let local_addr = listener.local_addr().map_err(StartupError::Serve)?;

    tracing::info!(
        address = %local_addr,
        backends = ?config.backend_addresses(),
        health_interval_ms = config.health_check.interval_ms,
        forward_timeout_secs = config.timeouts.forward_secs,
        "Configuration loaded"
    );

    let server = HttpServer::new(config);

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        signal.await;
        shutdown.trigger();
    });

    server.run(listener, server_shutdown).await.map_err(StartupError::Serve)?;

    tracing::info!("Shutdown complete");
    Ok(())
}
