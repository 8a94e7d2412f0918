//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the runner.
//! All types derive Serde traits for deserialization from config files.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default client port of the embedded service.
pub const DEFAULT_PORT: u16 = 2181;

/// Default tick time of the embedded service, in milliseconds.
pub const DEFAULT_TICK_TIME_MS: u64 = 3000;

/// Root configuration for the service runner.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Loopback port the listener binds to. `0` picks an ephemeral port.
    pub port: u16,

    /// TLS settings shared by the listener and the readiness prober.
    pub tls: TlsConfig,

    /// Readiness probe budget.
    pub probe: ProbeConfig,

    /// Embedded service settings.
    pub service: ServiceConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            tls: TlsConfig::default(),
            probe: ProbeConfig::default(),
            service: ServiceConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// TLS settings.
///
/// Immutable once built: fields are only reachable through accessors, and a
/// changed setting means building a new value. When `secure` is false none of
/// the store fields are consulted.
#[derive(Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct TlsConfig {
    secure: bool,
    key_store: String,
    key_store_password: String,
    trust_store: String,
    trust_store_password: String,
}

impl TlsConfig {
    /// Plaintext operation.
    pub fn insecure() -> Self {
        Self::default()
    }

    /// TLS operation with the given key store and trust store.
    pub fn secure(
        key_store: impl Into<String>,
        key_store_password: impl Into<String>,
        trust_store: impl Into<String>,
        trust_store_password: impl Into<String>,
    ) -> Self {
        Self {
            secure: true,
            key_store: key_store.into(),
            key_store_password: key_store_password.into(),
            trust_store: trust_store.into(),
            trust_store_password: trust_store_password.into(),
        }
    }

    pub fn is_secure(&self) -> bool {
        self.secure
    }

    pub fn key_store(&self) -> &Path {
        Path::new(&self.key_store)
    }

    pub fn key_store_password(&self) -> &str {
        &self.key_store_password
    }

    pub fn trust_store(&self) -> &Path {
        Path::new(&self.trust_store)
    }

    pub fn trust_store_password(&self) -> &str {
        &self.trust_store_password
    }
}

impl std::fmt::Debug for TlsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsConfig")
            .field("secure", &self.secure)
            .field("key_store", &self.key_store)
            .field("key_store_password", &"****")
            .field("trust_store", &self.trust_store)
            .field("trust_store_password", &"****")
            .finish()
    }
}

/// Readiness probe configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Total number of connect-and-probe attempts.
    pub max_attempts: u32,

    /// Delay between two attempts in milliseconds.
    pub retry_delay_ms: u64,

    /// Upper bound on connect, handshake and response read of one attempt.
    pub io_timeout_ms: u64,
}

impl ProbeConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            max_attempts: 30,
            retry_delay_ms: 250,
            io_timeout_ms: 5000,
        }
    }
}

/// Embedded service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Basic time unit of the service in milliseconds.
    pub tick_time_ms: u64,
}

impl ServiceConfig {
    pub fn tick_time(&self) -> Duration {
        Duration::from_millis(self.tick_time_ms)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            tick_time_ms: DEFAULT_TICK_TIME_MS,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON lines instead of the human-readable format.
    pub json_logs: bool,

    /// Prometheus scrape address. No exporter is started when absent.
    pub metrics_address: Option<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_address: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_embedded_service_defaults() {
        let config = RunnerConfig::default();
        assert_eq!(config.port, 2181);
        assert!(!config.tls.is_secure());
        assert_eq!(config.probe.max_attempts, 30);
        assert_eq!(config.probe.retry_delay(), Duration::from_millis(250));
        assert_eq!(config.service.tick_time(), Duration::from_millis(3000));
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: RunnerConfig = toml::from_str(
            r#"
            port = 0

            [probe]
            max_attempts = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.port, 0);
        assert_eq!(config.probe.max_attempts, 3);
        assert_eq!(config.probe.retry_delay_ms, 250);
        assert_eq!(config.observability.log_level, "info");
    }

    #[test]
    fn tls_debug_redacts_passwords() {
        let tls = TlsConfig::secure("/k.pem", "hunter2", "/t.pem", "letmein");
        let rendered = format!("{:?}", tls);
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("letmein"));
        assert!(rendered.contains("/k.pem"));
    }
}
