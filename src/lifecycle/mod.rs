//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validated config → Metrics → Bind listener → Backends + monitors
//!     → Dispatcher → Serve
//!
//! Shutdown:
//!     Signal received (signals.rs)
//!     → Stop accepting, drain connections (bounded)
//!     → Close intake, drain in-flight forwards (bounded)
//!     → Cancel health monitors → Release listener
//! ```
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal, before traffic is accepted
//! - Listeners start last (traffic only when ready)
//! - Shutdown has a deadline

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
