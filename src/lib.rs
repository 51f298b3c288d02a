//! Round-robin HTTP load balancer with health-checked failover.
//!
//! One dispatcher task makes every scheduling decision; forwarding runs on
//! per-request tasks and each backend is probed by its own health monitor.

pub mod config;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod load_balancer;
pub mod observability;

pub use config::LbConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use load_balancer::{Backend, LoadBalancer, RequestContext};
