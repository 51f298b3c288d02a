//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create an Axum Router bound to one LoadBalancer instance
//! - Wire up middleware (tracing, request ID)
//! - Bind server to listener
//! - Hand every request to `LoadBalancer::resolve`
//! - Bounded graceful shutdown

use std::future::IntoFuture;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::Response,
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, oneshot};
use tokio::time;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::config::LbConfig;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer, X_REQUEST_ID};
use crate::load_balancer::LoadBalancer;
use crate::observability::metrics;

/// HTTP front end of the load balancer.
pub struct HttpServer {
    router: Router,
    config: LbConfig,
    lb: Arc<LoadBalancer>,
}

impl HttpServer {
    /// Create a server with HTTP backends built from `config`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: LbConfig) -> Self {
        let lb = Arc::new(LoadBalancer::from_config(&config));
        Self::with_load_balancer(config, lb)
    }

    /// Create a server in front of an existing balancer.
    pub fn with_load_balancer(config: LbConfig, lb: Arc<LoadBalancer>) -> Self {
        let router = Self::build_router(lb.clone());
        Self { router, config, lb }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(lb: Arc<LoadBalancer>) -> Router {
        Router::new()
            .route("/", any(proxy_handler))
            .route("/{*path}", any(proxy_handler))
            .with_state(lb)
            .layer(
                ServiceBuilder::new()
                    .layer(set_request_id_layer())
                    .layer(TraceLayer::new_for_http())
                    .layer(propagate_request_id_layer()),
            )
    }

    pub fn load_balancer(&self) -> &Arc<LoadBalancer> {
        &self.lb
    }

    pub fn config(&self) -> &LbConfig {
        &self.config
    }

    /// Serve until `shutdown` fires, then stop accepting, drain connections
    /// and the balancer within the configured grace period.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        let grace = self.config.timeouts.shutdown_grace();
        tracing::info!(address = %addr, backends = self.lb.backends().len(), "HTTP server starting");

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let serve = axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = stop_rx.await;
            })
            .into_future();
        tokio::pin!(serve);

        let mut remaining = grace;
        tokio::select! {
            result = &mut serve => result?,
            _ = shutdown.recv() => {
                tracing::info!(grace = ?grace, "Stopping listener, draining connections");
                let _ = stop_tx.send(());
                let started = Instant::now();
                match time::timeout(grace, &mut serve).await {
                    Ok(result) => result?,
                    Err(_) => tracing::warn!(grace = ?grace, "Grace period elapsed with connections still open"),
                }
                remaining = grace.saturating_sub(started.elapsed()).max(Duration::from_millis(100));
            }
        }

        self.lb.shutdown(remaining).await;
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Catch-all handler: every method and path goes to the balancer.
async fn proxy_handler(State(lb): State<Arc<LoadBalancer>>, request: Request<Body>) -> Response {
    let start_time = Instant::now();
    let request_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    tracing::debug!(request_id = %request_id, method = %method, path = %path, "Resolving request");

    let response = lb.resolve(request).await;

    let status = response.status();
    metrics::record_request(method.as_str(), status.as_u16(), start_time);
    tracing::debug!(
        request_id = %request_id,
        status = %status,
        elapsed = ?start_time.elapsed(),
        "Request resolved"
    );

    response
}
