//! Backend health state.
//!
//! # States
//! - Unknown: no probe has completed yet; the backend receives traffic
//! - Healthy: last probe succeeded
//! - Unhealthy: last probe failed; the backend is skipped by the dispatcher
//!
//! # State Transitions
//! ```text
//! Unknown  → Healthy | Unhealthy: first probe result
//! Healthy ←→ Unhealthy: every probe overwrites the previous result
//! ```
//!
//! The flag has a single writer (the backend's health monitor) and many
//! readers (the dispatcher, metrics). Reads never block and may be stale by
//! up to one probe interval.

use std::sync::atomic::{AtomicU8, Ordering};

/// Health State enum.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    Unknown = 0,
    Healthy = 1,
    Unhealthy = 2,
}

impl From<u8> for HealthState {
    fn from(val: u8) -> Self {
        match val {
            1 => HealthState::Healthy,
            2 => HealthState::Unhealthy,
            _ => HealthState::Unknown,
        }
    }
}

impl std::fmt::Display for HealthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            HealthState::Unknown => "unknown",
            HealthState::Healthy => "healthy",
            HealthState::Unhealthy => "unhealthy",
        };
        f.write_str(s)
    }
}

/// Atomically readable health flag.
///
/// Starts in [`HealthState::Unknown`], which counts as healthy so a freshly
/// started balancer does not reject traffic before the first probe lands.
#[derive(Debug)]
pub struct HealthFlag {
    state: AtomicU8,
}

impl HealthFlag {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(HealthState::Unknown as u8),
        }
    }

    /// Current state.
    pub fn state(&self) -> HealthState {
        HealthState::from(self.state.load(Ordering::Acquire))
    }

    /// Return true if backend is considered healthy (Healthy or Unknown).
    pub fn is_healthy(&self) -> bool {
        self.state() != HealthState::Unhealthy
    }

    /// Record a probe result. Returns the previous state so the caller can
    /// log transitions.
    pub fn record(&self, healthy: bool) -> HealthState {
        let next = if healthy {
            HealthState::Healthy
        } else {
            HealthState::Unhealthy
        };
        HealthState::from(self.state.swap(next as u8, Ordering::AcqRel))
    }
}

impl Default for HealthFlag {
    fn default() -> Self {
        Self::new()
    }
}
