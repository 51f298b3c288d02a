//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs), one task per backend:
//!     Periodic timer
//!     → GET <backend>/health with its own timeout
//!     → Update state.rs flag (2xx = healthy, anything else = unhealthy)
//!
//! Dispatcher:
//!     → Reads the flag atomically, never blocks on a probe
//! ```
//!
//! # Design Decisions
//! - Health starts optimistic (Unknown counts as healthy)
//! - A failed forward does not touch the flag; only probes do
//! - Staleness of up to one probe interval is accepted

pub mod active;
pub mod state;
