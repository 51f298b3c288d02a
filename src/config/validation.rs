//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check backend addresses are usable plain-HTTP base URLs
//! - Validate value ranges (timeouts > 0, bind address parses)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: LbConfig → Result<(), Vec<ValidationError>>

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::{normalize_backend_address, LbConfig};

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("no backends configured")]
    NoBackends,

    #[error("invalid backend address \"{address}\": {reason}")]
    InvalidBackend { address: String, reason: String },

    #[error("backend \"{address}\" uses unsupported scheme \"{scheme}\" (only http)")]
    UnsupportedScheme { address: String, scheme: String },

    #[error("backend \"{0}\" listed more than once")]
    DuplicateBackend(String),

    #[error("invalid bind address \"{address}\": {reason}")]
    InvalidBindAddress { address: String, reason: String },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("health check timeout ({timeout_ms}ms) exceeds interval ({interval_ms}ms)")]
    ProbeTimeoutExceedsInterval { timeout_ms: u64, interval_ms: u64 },
}

/// Validate a configuration, collecting every error.
pub fn validate_config(config: &LbConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Err(e) = config.listener.bind_address.parse::<SocketAddr>() {
        errors.push(ValidationError::InvalidBindAddress {
            address: config.listener.bind_address.clone(),
            reason: e.to_string(),
        });
    }

    if config.backends.is_empty() {
        errors.push(ValidationError::NoBackends);
    }

    let mut seen = HashSet::new();
    for raw in &config.backends {
        let address = normalize_backend_address(raw);
        if let Err(e) = check_backend(&address) {
            errors.push(e);
            continue;
        }
        if !seen.insert(address.clone()) {
            errors.push(ValidationError::DuplicateBackend(address));
        }
    }

    let health = &config.health_check;
    if health.interval_ms == 0 {
        errors.push(ValidationError::Zero("health_check.interval_ms"));
    }
    if health.timeout_ms == 0 {
        errors.push(ValidationError::Zero("health_check.timeout_ms"));
    }
    if health.interval_ms > 0 && health.timeout_ms > health.interval_ms {
        errors.push(ValidationError::ProbeTimeoutExceedsInterval {
            timeout_ms: health.timeout_ms,
            interval_ms: health.interval_ms,
        });
    }
    if config.timeouts.forward_secs == 0 {
        errors.push(ValidationError::Zero("timeouts.forward_secs"));
    }
    if config.dispatcher.intake_capacity == 0 {
        errors.push(ValidationError::Zero("dispatcher.intake_capacity"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_backend(address: &str) -> Result<(), ValidationError> {
    let url = Url::parse(address).map_err(|e| ValidationError::InvalidBackend {
        address: address.to_string(),
        reason: e.to_string(),
    })?;

    if url.scheme() != "http" {
        return Err(ValidationError::UnsupportedScheme {
            address: address.to_string(),
            scheme: url.scheme().to_string(),
        });
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(ValidationError::InvalidBackend {
            address: address.to_string(),
            reason: "missing host".to_string(),
        });
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(ValidationError::InvalidBackend {
            address: address.to_string(),
            reason: "query and fragment are not allowed".to_string(),
        });
    }
    Ok(())
}
