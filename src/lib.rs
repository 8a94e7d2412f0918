//! Embedded coordination-service runner.
//!
//! Runs one in-process service instance on a loopback port, optionally
//! behind mutual TLS, and verifies readiness by sending `stat` over the wire.

// Core subsystems
pub mod config;
pub mod net;
pub mod service;
pub mod tls;

// Lifecycle and readiness
pub mod health;
pub mod lifecycle;

// Cross-cutting concerns
pub mod observability;

pub use config::schema::RunnerConfig;
pub use health::{wait_for_server_up, ReadinessProber};
pub use lifecycle::{RunnerError, RunnerState, ServiceRunner};
pub use tls::{CredentialError, HandshakeMaterial};
