//! Structured logging.
//!
//! # Responsibilities
//! - Install the global tracing subscriber once per process
//! - Honour `RUST_LOG` over the configured level
//! - Switch between JSON and human-readable output

use std::io::{self, IsTerminal};
use std::sync::OnceLock;

use thiserror::Error;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::ObservabilityConfig;

static LOGGING: OnceLock<()> = OnceLock::new();

/// Errors raised while installing the subscriber.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log filter {filter:?}: {reason}")]
    Filter { filter: String, reason: String },

    #[error("failed to install tracing subscriber: {0}")]
    Install(String),
}

/// Install the global subscriber. Later calls are no-ops.
pub fn init_logging(config: &ObservabilityConfig) -> Result<(), LoggingError> {
    if LOGGING.get().is_some() {
        return Ok(());
    }

    let filter = build_filter(&config.log_level)?;
    let builder = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(io::stderr);

    let installed = if config.json_logs {
        builder.json().flatten_event(true).try_init()
    } else {
        builder.with_ansi(io::stderr().is_terminal()).try_init()
    };
    installed.map_err(|e| LoggingError::Install(e.to_string()))?;

    let _ = LOGGING.set(());
    Ok(())
}

/// `RUST_LOG` wins; otherwise the configured level applies to this crate.
fn build_filter(level: &str) -> Result<EnvFilter, LoggingError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    let directive = format!("zk_service_runner={level}");
    EnvFilter::try_new(&directive).map_err(|e| LoggingError::Filter {
        filter: directive,
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_level_builds_a_filter() {
        if std::env::var_os("RUST_LOG").is_none() {
            assert!(build_filter("debug").is_ok());
            assert!(build_filter("not a level!").is_err());
        }
    }
}
