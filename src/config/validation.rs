//! Configuration validation.
//!
//! Serde handles syntax; this pass checks value ranges and TLS completeness.
//! Every violation is reported, not just the first.

use thiserror::Error;

use crate::config::schema::RunnerConfig;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("probe.max_attempts must be at least 1")]
    NoProbeAttempts,

    #[error("probe.io_timeout_ms must be greater than 0")]
    ZeroIoTimeout,

    #[error("service.tick_time_ms must be greater than 0")]
    ZeroTickTime,

    #[error("tls.{0} must be set when tls.secure is true")]
    MissingStore(&'static str),
}

/// Validate a configuration, collecting every violation.
pub fn validate_config(config: &RunnerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.probe.max_attempts == 0 {
        errors.push(ValidationError::NoProbeAttempts);
    }
    if config.probe.io_timeout_ms == 0 {
        errors.push(ValidationError::ZeroIoTimeout);
    }
    if config.service.tick_time_ms == 0 {
        errors.push(ValidationError::ZeroTickTime);
    }
    if config.tls.is_secure() {
        if config.tls.key_store().as_os_str().is_empty() {
            errors.push(ValidationError::MissingStore("key_store"));
        }
        if config.tls.trust_store().as_os_str().is_empty() {
            errors.push(ValidationError::MissingStore("trust_store"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
