//! Metrics collection and exposition.
//!
//! # Metrics
//! - `lb_requests_total` (counter): resolved requests by method, status
//! - `lb_request_duration_seconds` (histogram): resolve latency
//! - `lb_dispatch_total` (counter): dispatch decisions by backend
//! - `lb_unavailable_total` (counter): requests answered 503 by the dispatcher
//! - `lb_forward_errors_total` (counter): forwards answered 500, by backend
//! - `lb_backend_healthy` (gauge): 1=healthy, 0=unhealthy

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its HTTP scrape listener.
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, start_time: Instant) {
    counter!(
        "lb_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("lb_request_duration_seconds").record(start_time.elapsed().as_secs_f64());
}

pub fn record_dispatch(backend: &str) {
    counter!("lb_dispatch_total", "backend" => backend.to_string()).increment(1);
}

pub fn record_unavailable() {
    counter!("lb_unavailable_total").increment(1);
}

pub fn record_forward_error(backend: &str) {
    counter!("lb_forward_errors_total", "backend" => backend.to_string()).increment(1);
}

pub fn record_backend_health(backend: &str, healthy: bool) {
    gauge!("lb_backend_healthy", "backend" => backend.to_string())
        .set(if healthy { 1.0 } else { 0.0 });
}
