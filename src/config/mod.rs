//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! optional config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → RunnerConfig
//!     → positional CLI arguments override port and TLS
//!     → handed to ServiceRunner, never changed while it runs
//! ```
//!
//! # Design Decisions
//! - Config is immutable once the runner owns it; there is no hot reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{ObservabilityConfig, ProbeConfig, RunnerConfig, ServiceConfig, TlsConfig};
pub use validation::{validate_config, ValidationError};
