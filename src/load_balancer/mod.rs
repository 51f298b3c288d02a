//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request
//!     → LoadBalancer::resolve (wrap in context.rs with a one-shot slot)
//!     → intake queue (FIFO)
//!     → dispatcher.rs (round robin with failover, single task)
//!         → backend.rs / http_backend.rs forward on a new task
//!         → or 503 straight into the slot
//!     → resolve returns whatever lands in the slot
//! ```
//!
//! # Design Decisions
//! - One dispatcher task owns the cursor; no lock on the hot path
//! - Backend health is an atomic flag written by its monitor
//! - Every request gets exactly one response, including on shutdown

pub mod backend;
pub mod context;
pub mod dispatcher;
pub mod http_backend;
pub mod in_flight;

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::LbConfig;
use crate::health::active::HealthMonitor;
use crate::http::response;
use crate::lifecycle::Shutdown;

pub use backend::Backend;
pub use context::RequestContext;
pub use dispatcher::Dispatcher;
pub use http_backend::HttpBackend;
pub use in_flight::InFlight;

/// Owns the backends, the intake queue and the dispatcher task.
#[derive(Debug)]
pub struct LoadBalancer {
    intake: mpsc::Sender<RequestContext>,
    backends: Vec<Arc<dyn Backend>>,
    in_flight: InFlight,
    intake_stop: Shutdown,
    monitor_stop: Shutdown,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
    monitors: Mutex<Vec<JoinHandle<()>>>,
}

impl LoadBalancer {
    /// Start a dispatcher over `backends` (rotation follows slice order).
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(backends: Vec<Arc<dyn Backend>>, intake_capacity: usize) -> Self {
        let (intake, intake_rx) = mpsc::channel(intake_capacity.max(1));
        let in_flight = InFlight::new();
        let intake_stop = Shutdown::new();

        let dispatcher = Dispatcher::new(backends.clone(), in_flight.clone());
        let handle = tokio::spawn(dispatcher.run(intake_rx, intake_stop.subscribe()));

        Self {
            intake,
            backends,
            in_flight,
            intake_stop,
            monitor_stop: Shutdown::new(),
            dispatcher: Mutex::new(Some(handle)),
            monitors: Mutex::new(Vec::new()),
        }
    }

    /// Build HTTP backends from configuration and start their health monitors.
    pub fn from_config(config: &LbConfig) -> Self {
        let forward_timeout = config.timeouts.forward();
        let http_backends: Vec<Arc<HttpBackend>> = config
            .backend_addresses()
            .iter()
            .map(|address| Arc::new(HttpBackend::new(address, forward_timeout)))
            .collect();

        let backends = http_backends
            .iter()
            .map(|b| b.clone() as Arc<dyn Backend>)
            .collect();
        let lb = Self::new(backends, config.dispatcher.intake_capacity);

        if config.health_check.enabled {
            for backend in http_backends {
                lb.start_monitor(HealthMonitor::new(backend, &config.health_check));
            }
        } else {
            tracing::info!("Active health checks disabled");
        }

        lb
    }

    /// Run `monitor` until this balancer shuts down.
    pub fn start_monitor(&self, monitor: HealthMonitor) {
        let handle = monitor.spawn(self.monitor_stop.subscribe());
        self.monitors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handle);
    }

    pub fn backends(&self) -> &[Arc<dyn Backend>] {
        &self.backends
    }

    /// Forwarding tasks currently running.
    pub fn in_flight(&self) -> u64 {
        self.in_flight.active_count()
    }

    /// Resolve one inbound request to a response.
    ///
    /// Suspends until the dispatcher (503) or a forwarding task (upstream
    /// response or 500) fills this request's slot.
    pub async fn resolve(&self, request: Request<Body>) -> Response {
        let (ctx, slot) = RequestContext::new(request);

        if let Err(mpsc::error::SendError(ctx)) = self.intake.send(ctx).await {
            tracing::debug!(request_id = %ctx.request_id(), "Intake closed, rejecting request");
            return response::service_unavailable();
        }

        match slot.await {
            Ok(response) => response,
            Err(_) => {
                tracing::error!("Request dropped before a response was produced");
                response::internal_error("request dropped before a response was produced")
            }
        }
    }

    /// Stop intake, drain queued and in-flight work, then stop the monitors.
    ///
    /// `grace` bounds the wait for in-flight forwards. Returns false if some
    /// were still running when it elapsed.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        self.intake_stop.trigger();
        let dispatcher = self
            .dispatcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = dispatcher {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Dispatcher task failed");
            }
        }

        let drained = self.in_flight.wait_idle(grace).await;
        if !drained {
            tracing::warn!(
                remaining = self.in_flight.active_count(),
                grace = ?grace,
                "Grace period elapsed with forwards still running"
            );
        }

        self.monitor_stop.trigger();
        let monitors = std::mem::take(
            &mut *self
                .monitors
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for handle in monitors {
            let _ = handle.await;
        }

        tracing::info!("Load balancer stopped");
        drained
    }
}
