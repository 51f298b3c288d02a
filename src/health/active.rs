//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe one backend's health endpoint
//! - Update that backend's health flag with the result
//! - Stop when the shutdown signal fires

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time;

use crate::config::HealthCheckConfig;
use crate::health::state::HealthState;
use crate::load_balancer::backend::Backend;
use crate::load_balancer::http_backend::{error_chain, HttpBackend};
use crate::observability::metrics;

pub struct HealthMonitor {
    backend: Arc<HttpBackend>,
    interval: Duration,
    timeout: Duration,
    path: String,
}

impl HealthMonitor {
    pub fn new(backend: Arc<HttpBackend>, config: &HealthCheckConfig) -> Self {
        Self {
            backend,
            interval: Duration::from_millis(config.interval_ms),
            timeout: Duration::from_millis(config.timeout_ms),
            path: config.path.clone(),
        }
    }

    /// Spawn the monitor loop on its own task.
    pub fn spawn(self, shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            backend = %self.backend.address(),
            interval = ?self.interval,
            path = %self.path,
            "Health monitor starting"
        );

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check().await;
                }
                _ = shutdown.recv() => {
                    tracing::debug!(backend = %self.backend.address(), "Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Probe once and record the result.
    pub async fn check(&self) -> bool {
        let addr = self.backend.address();
        let healthy = self.probe().await;

        let previous = self.backend.health().record(healthy);
        match (previous, healthy) {
            (HealthState::Unhealthy, true) => {
                tracing::info!(backend = %addr, "Backend recovered");
            }
            (HealthState::Healthy | HealthState::Unknown, false) => {
                tracing::warn!(backend = %addr, "Backend marked unhealthy");
            }
            (HealthState::Unknown, true) => {
                tracing::debug!(backend = %addr, "Backend healthy");
            }
            _ => {}
        }

        metrics::record_backend_health(addr, healthy);
        healthy
    }

    async fn probe(&self) -> bool {
        let addr = self.backend.address();
        let request = match Request::builder()
            .method("GET")
            .uri(format!("{}{}", addr, self.path))
            .header("user-agent", "failover-lb-health-check")
            .body(Body::empty())
        {
            Ok(req) => req,
            Err(e) => {
                tracing::error!(backend = %addr, error = %e, "Failed to build health check request");
                return false;
            }
        };

        match time::timeout(self.timeout, self.backend.client().request(request)).await {
            Ok(Ok(response)) => {
                let success = response.status().is_success();
                if !success {
                    tracing::debug!(backend = %addr, status = %response.status(), "Health check failed: non-success status");
                }
                success
            }
            Ok(Err(e)) => {
                tracing::debug!(backend = %addr, error = %error_chain(&e), "Health check failed: connection error");
                false
            }
            Err(_) => {
                tracing::debug!(backend = %addr, "Health check failed: timeout");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> HealthCheckConfig {
        HealthCheckConfig {
            enabled: true,
            interval_ms: 50,
            timeout_ms: 200,
            path: "/health".to_string(),
        }
    }

    #[tokio::test]
    async fn unreachable_backend_marked_unhealthy() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let backend = Arc::new(HttpBackend::new(
            &format!("http://127.0.0.1:{}", port),
            Duration::from_secs(1),
        ));
        assert!(backend.is_healthy());

        let monitor = HealthMonitor::new(backend.clone(), &config());
        assert!(!monitor.check().await);
        assert!(!backend.is_healthy());
        assert_eq!(backend.health().state(), HealthState::Unhealthy);
    }

    #[tokio::test]
    async fn monitor_stops_on_shutdown() {
        let backend = Arc::new(HttpBackend::new("http://127.0.0.1:9", Duration::from_secs(1)));
        let (tx, rx) = broadcast::channel(1);
        let handle = HealthMonitor::new(backend, &config()).spawn(rx);

        tx.send(()).unwrap();
        time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("monitor did not stop")
            .unwrap();
    }
}
