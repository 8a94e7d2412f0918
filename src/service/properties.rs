//! Ambient service properties.
//!
//! The embedded service reads its TLS and command settings at construction
//! time from a key/value snapshot rather than from typed parameters. The
//! runner owns the snapshot, fills it before start and clears it after stop;
//! collaborators only ever see an immutable copy.

use std::collections::BTreeMap;

use crate::config::TlsConfig;

/// Selects the connection factory implementation.
pub const SERVER_CNXN_FACTORY: &str = "zookeeper.serverCnxnFactory";
/// Key-store location for the listener.
pub const SSL_KEYSTORE_LOCATION: &str = "zookeeper.ssl.keyStore.location";
/// Key-store password for the listener.
pub const SSL_KEYSTORE_PASSWORD: &str = "zookeeper.ssl.keyStore.password";
/// Trust-store location for the listener.
pub const SSL_TRUSTSTORE_LOCATION: &str = "zookeeper.ssl.trustStore.location";
/// Trust-store password for the listener.
pub const SSL_TRUSTSTORE_PASSWORD: &str = "zookeeper.ssl.trustStore.password";
/// Comma separated four-letter commands the service answers, or `*`.
pub const FOUR_LETTER_WORD_WHITELIST: &str = "zookeeper.4lw.commands.whitelist";

/// Value of [`SERVER_CNXN_FACTORY`] naming the TLS-capable factory.
pub const TLS_CONNECTION_FACTORY: &str = "tokio-rustls";

const TLS_KEYS: [&str; 5] = [
    SERVER_CNXN_FACTORY,
    SSL_KEYSTORE_LOCATION,
    SSL_KEYSTORE_PASSWORD,
    SSL_TRUSTSTORE_LOCATION,
    SSL_TRUSTSTORE_PASSWORD,
];

/// Key/value settings consumed by the embedded service at construction time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceProperties {
    values: BTreeMap<String, String>,
}

impl ServiceProperties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Returns a copy with `key` set.
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.values.insert(key.to_string(), value.into());
        self
    }

    /// Returns a copy without `key`.
    pub fn without(mut self, key: &str) -> Self {
        self.values.remove(key);
        self
    }

    /// Returns a copy carrying the TLS factory selector and store settings.
    pub fn with_tls(self, tls: &TlsConfig) -> Self {
        self.with(SERVER_CNXN_FACTORY, TLS_CONNECTION_FACTORY)
            .with(SSL_KEYSTORE_LOCATION, tls.key_store().display().to_string())
            .with(SSL_KEYSTORE_PASSWORD, tls.key_store_password())
            .with(SSL_TRUSTSTORE_LOCATION, tls.trust_store().display().to_string())
            .with(SSL_TRUSTSTORE_PASSWORD, tls.trust_store_password())
    }

    /// Returns a copy with every TLS key removed.
    pub fn without_tls(self) -> Self {
        TLS_KEYS.iter().fold(self, |props, key| props.without(key))
    }

    /// Rebuild the TLS settings the runner stored, if the TLS factory is selected.
    pub fn tls_config(&self) -> Option<TlsConfig> {
        if self.get(SERVER_CNXN_FACTORY) != Some(TLS_CONNECTION_FACTORY) {
            return None;
        }
        Some(TlsConfig::secure(
            self.get(SSL_KEYSTORE_LOCATION)?,
            self.get(SSL_KEYSTORE_PASSWORD).unwrap_or_default(),
            self.get(SSL_TRUSTSTORE_LOCATION)?,
            self.get(SSL_TRUSTSTORE_PASSWORD).unwrap_or_default(),
        ))
    }
}
