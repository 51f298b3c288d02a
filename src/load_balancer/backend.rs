//! Backend abstraction.
//!
//! # Responsibilities
//! - Name the capabilities the dispatcher needs from an upstream
//! - Let production (HTTP) and test (stub) backends share one seam

use futures_util::future::BoxFuture;

use crate::load_balancer::context::RequestContext;

/// An upstream server that can take forwarded requests.
///
/// Implementations must uphold two rules:
/// - `is_healthy` never performs I/O.
/// - The future returned by `forward` delivers exactly one response into the
///   context, whatever happens while talking to the upstream.
pub trait Backend: Send + Sync + std::fmt::Debug {
    /// Address used for logs and metric labels.
    fn address(&self) -> &str;

    /// Last known health. Cheap, non-blocking.
    fn is_healthy(&self) -> bool;

    /// Produce the forwarding work for `ctx`. The dispatcher spawns the
    /// returned future on its own task, so this call must not block.
    fn forward(&self, ctx: RequestContext) -> BoxFuture<'static, ()>;
}
