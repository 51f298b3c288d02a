//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional) + CLI flags / environment
//!     → loader.rs (parse & deserialize)
//!     → CLI overrides applied by the binary
//!     → validation.rs (semantic checks, all errors reported)
//!     → LbConfig (validated, immutable)
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Invalid configuration is fatal before any listener is bound
//! - Backend order in the file is the rotation order

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::ConfigError;
pub use schema::{
    DispatcherConfig, HealthCheckConfig, LbConfig, ListenerConfig, ObservabilityConfig,
    TimeoutConfig,
};
