//! TLS context construction from loaded credentials.

use std::sync::Arc;

use rustls::server::WebPkiClientVerifier;
use rustls::{ClientConfig, ServerConfig};

use crate::config::TlsConfig;
use crate::tls::credentials::{
    crypto_provider, load_key_material, load_trust_material, CredentialError, KeyMaterial,
    TrustMaterial,
};

/// Key material and trust material loaded together.
///
/// Either both halves load or construction fails; a caller never holds one
/// without the other.
#[derive(Debug, Clone)]
pub struct HandshakeMaterial {
    key: KeyMaterial,
    trust: TrustMaterial,
}

impl HandshakeMaterial {
    /// Load both stores named by `tls`.
    pub fn load(tls: &TlsConfig) -> Result<Self, CredentialError> {
        let key = load_key_material(tls.key_store(), tls.key_store_password())?;
        let trust = load_trust_material(tls.trust_store(), tls.trust_store_password())?;
        Ok(Self::new(key, trust))
    }

    pub fn new(key: KeyMaterial, trust: TrustMaterial) -> Self {
        Self { key, trust }
    }

    pub fn key(&self) -> &KeyMaterial {
        &self.key
    }

    pub fn trust(&self) -> &TrustMaterial {
        &self.trust
    }

    /// Client side: presents the key material and verifies the server's
    /// certificate and host name against the trust material.
    pub fn client_config(&self) -> Result<Arc<ClientConfig>, CredentialError> {
        let key_store = self.key.source().to_path_buf();
        let (cert_chain, key) = self.key.clone().into_parts();

        let config = ClientConfig::builder_with_provider(crypto_provider())
            .with_safe_default_protocol_versions()
            .map_err(|e| CredentialError::unsupported(&key_store, e))?
            .with_root_certificates(self.trust.roots().clone())
            .with_client_auth_cert(cert_chain, key)
            .map_err(|e| CredentialError::unsupported(&key_store, e))?;

        Ok(Arc::new(config))
    }

    /// Server side: presents the key material and requires a client
    /// certificate signed by one of the trust anchors.
    pub fn server_config(&self) -> Result<Arc<ServerConfig>, CredentialError> {
        let key_store = self.key.source().to_path_buf();
        let (cert_chain, key) = self.key.clone().into_parts();

        let verifier = WebPkiClientVerifier::builder_with_provider(
            Arc::new(self.trust.roots().clone()),
            crypto_provider(),
        )
        .build()
        .map_err(|e| CredentialError::unsupported(self.trust.source(), e))?;

        let config = ServerConfig::builder_with_provider(crypto_provider())
            .with_safe_default_protocol_versions()
            .map_err(|e| CredentialError::unsupported(&key_store, e))?
            .with_client_cert_verifier(verifier)
            .with_single_cert(cert_chain, key)
            .map_err(|e| CredentialError::unsupported(&key_store, e))?;

        Ok(Arc::new(config))
    }
}
