//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use pkcs8::pkcs5::pbes2;
use pkcs8::{LineEnding, PrivateKeyInfo};
use rcgen::{
    BasicConstraints, CertificateParams, DnType, ExtendedKeyUsagePurpose, IsCa, KeyPair,
    KeyUsagePurpose,
};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;

use zk_service_runner::config::{ProbeConfig, TlsConfig};
use zk_service_runner::tls::HandshakeMaterial;

pub const KEY_STORE_PASSWORD: &str = "keystore-secret";
pub const TRUST_STORE_PASSWORD: &str = "truststore-secret";

/// First line the real service sends in reply to `stat`.
pub const STAT_RESPONSE: &str = "Zookeeper version: 3.5.5\r\nClients:\n";

/// Key and trust stores written to a scratch directory.
///
/// `key_store` holds a `localhost` leaf (server and client auth) signed by
/// the test CA, its key encrypted with [`KEY_STORE_PASSWORD`]. `trust_store`
/// holds that CA. `foreign_trust_store` holds an unrelated CA.
pub struct TestPki {
    pub dir: TempDir,
    pub key_store: PathBuf,
    pub plain_key_store: PathBuf,
    pub trust_store: PathBuf,
    pub foreign_trust_store: PathBuf,
}

impl TestPki {
    pub fn generate() -> Self {
        let dir = tempfile::tempdir().unwrap();

        let (ca_pem, ca_cert, ca_key) = certificate_authority("zk-runner test ca");
        let (foreign_pem, _, _) = certificate_authority("unrelated ca");

        let mut leaf = CertificateParams::new(vec!["localhost".to_string()]).unwrap();
        leaf.distinguished_name.push(DnType::CommonName, "localhost");
        leaf.extended_key_usages = vec![
            ExtendedKeyUsagePurpose::ServerAuth,
            ExtendedKeyUsagePurpose::ClientAuth,
        ];
        let leaf_key = KeyPair::generate().unwrap();
        let leaf_cert = leaf.signed_by(&leaf_key, &ca_cert, &ca_key).unwrap();

        let key_store = dir.path().join("keystore.pem");
        std::fs::write(
            &key_store,
            format!(
                "{}{}",
                leaf_cert.pem(),
                encrypt_key(leaf_key.serialized_der(), KEY_STORE_PASSWORD)
            ),
        )
        .unwrap();

        let plain_key_store = dir.path().join("keystore-plain.pem");
        std::fs::write(
            &plain_key_store,
            format!("{}{}", leaf_cert.pem(), leaf_key.serialize_pem()),
        )
        .unwrap();

        let trust_store = dir.path().join("truststore.pem");
        std::fs::write(&trust_store, ca_pem).unwrap();

        let foreign_trust_store = dir.path().join("foreign-truststore.pem");
        std::fs::write(&foreign_trust_store, foreign_pem).unwrap();

        Self {
            dir,
            key_store,
            plain_key_store,
            trust_store,
            foreign_trust_store,
        }
    }

    pub fn tls(&self) -> TlsConfig {
        tls_config(&self.key_store, &self.trust_store)
    }

    /// Valid key store, but trusting a CA that did not sign the peer.
    pub fn untrusting_tls(&self) -> TlsConfig {
        tls_config(&self.key_store, &self.foreign_trust_store)
    }

    pub fn material(&self) -> HandshakeMaterial {
        HandshakeMaterial::load(&self.tls()).unwrap()
    }
}

fn tls_config(key_store: &Path, trust_store: &Path) -> TlsConfig {
    TlsConfig::secure(
        key_store.display().to_string(),
        KEY_STORE_PASSWORD,
        trust_store.display().to_string(),
        TRUST_STORE_PASSWORD,
    )
}

fn certificate_authority(name: &str) -> (String, rcgen::Certificate, KeyPair) {
    let mut params = CertificateParams::new(Vec::<String>::new()).unwrap();
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params.distinguished_name.push(DnType::CommonName, name);
    params.key_usages = vec![
        KeyUsagePurpose::KeyCertSign,
        KeyUsagePurpose::CrlSign,
        KeyUsagePurpose::DigitalSignature,
    ];
    let key = KeyPair::generate().unwrap();
    let cert = params.self_signed(&key).unwrap();
    (cert.pem(), cert, key)
}

/// PKCS#8 PBES2 (PBKDF2-SHA256, AES-256-CBC) with a low iteration count.
pub fn encrypt_key(pkcs8_der: &[u8], password: &str) -> String {
    let info = PrivateKeyInfo::try_from(pkcs8_der).unwrap();
    let params = pbes2::Parameters::pbkdf2_sha256_aes256cbc(2048, b"zk-runner-salt", &[7u8; 16])
        .unwrap();
    let document = info.encrypt_with_params(params, password).unwrap();
    document
        .to_pem("ENCRYPTED PRIVATE KEY", LineEnding::LF)
        .unwrap()
        .to_string()
}

/// A probe budget small enough for tests.
pub fn quick_probe(max_attempts: u32) -> ProbeConfig {
    ProbeConfig {
        max_attempts,
        retry_delay_ms: 20,
        io_timeout_ms: 2000,
    }
}

/// A loopback port nothing listens on.
pub fn unused_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// Start a plaintext backend that answers every 4-byte command with `response`.
pub async fn start_stat_backend(response: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut command = [0u8; 4];
                if socket.read_exact(&mut command).await.is_ok() {
                    let _ = socket.write_all(response.as_bytes()).await;
                }
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}

/// Start a TLS backend requiring client certificates, answering like
/// [`start_stat_backend`].
pub async fn start_tls_stat_backend(
    material: &HandshakeMaterial,
    response: &'static str,
) -> SocketAddr {
    let acceptor = TlsAcceptor::from(material.server_config().unwrap());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let acceptor = acceptor.clone();
            tokio::spawn(async move {
                let Ok(mut tls) = acceptor.accept(socket).await else {
                    return;
                };
                let mut command = [0u8; 4];
                if tls.read_exact(&mut command).await.is_ok() {
                    let _ = tls.write_all(response.as_bytes()).await;
                }
                let _ = tls.shutdown().await;
            });
        }
    });

    addr
}

/// Send `command` to `addr` in plaintext and return the whole reply.
pub async fn send_command(addr: SocketAddr, command: &str) -> String {
    let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
    stream.write_all(command.as_bytes()).await.unwrap();
    let mut reply = String::new();
    stream.read_to_string(&mut reply).await.unwrap();
    reply
}
