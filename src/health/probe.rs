//! Readiness probing over the wire.
//!
//! # Responsibilities
//! - Connect to the service, completing a TLS handshake when secure
//! - Send `stat`, accept the first response line if it carries the version
//! - Retry with a fixed delay until the attempt budget runs out
//!
//! Every per-attempt failure (credentials, connect, handshake, read,
//! timeout, wrong answer) counts as "not ready yet": it is logged and retried,
//! never returned.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rustls::pki_types::ServerName;
use rustls::ClientConfig;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time;
use tokio_rustls::TlsConnector;

use crate::config::{ProbeConfig, TlsConfig};
use crate::observability::metrics;
use crate::service::server::VERSION_PREFIX;
use crate::tls::{CredentialError, HandshakeMaterial};

/// Host name used to reach the embedded service.
pub const LOOPBACK_HOST: &str = "localhost";

/// Status command sent on every attempt.
const STATUS_COMMAND: &[u8] = b"stat";

/// Most bytes read while looking for the first response line.
const MAX_STATUS_LINE: u64 = 256;

/// Where to probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeTarget {
    pub host: String,
    pub port: u16,
}

impl ProbeTarget {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// `localhost:<port>`.
    pub fn loopback(port: u16) -> Self {
        Self::new(LOOPBACK_HOST, port)
    }
}

impl fmt::Display for ProbeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Why a single attempt did not observe a ready service.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("loading credentials failed: {0}")]
    Credentials(#[from] CredentialError),

    #[error("invalid TLS server name {0:?}")]
    ServerName(String),

    #[error("connect failed: {0}")]
    Connect(#[source] std::io::Error),

    #[error("TLS handshake failed: {0}")]
    Handshake(#[source] std::io::Error),

    #[error("status exchange failed: {0}")]
    Exchange(#[source] std::io::Error),

    #[error("no response within {0:?}")]
    Timeout(Duration),

    #[error("connection closed without a response")]
    NoResponse,

    #[error("unexpected response {0:?}")]
    UnexpectedResponse(String),
}

impl ProbeError {
    fn outcome(&self) -> &'static str {
        match self {
            ProbeError::Credentials(_) | ProbeError::ServerName(_) => "credentials",
            ProbeError::Connect(_) => "connect",
            ProbeError::Handshake(_) => "handshake",
            ProbeError::Exchange(_) | ProbeError::NoResponse => "exchange",
            ProbeError::Timeout(_) => "timeout",
            ProbeError::UnexpectedResponse(_) => "unexpected",
        }
    }
}

/// Bounded connect-and-probe loop.
#[derive(Debug, Clone)]
pub struct ReadinessProber {
    config: ProbeConfig,
}

impl ReadinessProber {
    pub fn new(config: ProbeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// Probe `target` until it answers `stat` or the budget is spent.
    ///
    /// Makes at most `max_attempts` attempts and sleeps `retry_delay` between
    /// two of them. Returns `true` as soon as an attempt succeeds.
    pub async fn probe(&self, target: &ProbeTarget, tls: &TlsConfig) -> bool {
        let max_attempts = self.config.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            match self.attempt(target, tls).await {
                Ok(()) => {
                    metrics::record_probe_attempt("up");
                    tracing::info!(address = %target, attempt, "Server UP");
                    return true;
                }
                Err(e) => {
                    metrics::record_probe_attempt(e.outcome());
                    tracing::warn!(
                        address = %target,
                        attempt,
                        max_attempts,
                        error = %e,
                        "Server not up"
                    );
                }
            }

            if attempt < max_attempts {
                time::sleep(self.config.retry_delay()).await;
            }
        }

        tracing::warn!(address = %target, max_attempts, "Probe budget exhausted");
        false
    }

    /// One connect, optional handshake, `stat`, first-line check.
    pub async fn attempt(&self, target: &ProbeTarget, tls: &TlsConfig) -> Result<(), ProbeError> {
        let timeout = self.config.io_timeout();
        time::timeout(timeout, self.exchange(target, tls))
            .await
            .map_err(|_| ProbeError::Timeout(timeout))?
    }

    async fn exchange(&self, target: &ProbeTarget, tls: &TlsConfig) -> Result<(), ProbeError> {
        let connector = if tls.is_secure() {
            Some(client_connector(target, tls)?)
        } else {
            None
        };

        let stream = TcpStream::connect((target.host.as_str(), target.port))
            .await
            .map_err(ProbeError::Connect)?;

        match connector {
            Some((connector, server_name)) => {
                let stream = connector
                    .connect(server_name, stream)
                    .await
                    .map_err(ProbeError::Handshake)?;
                read_status(stream).await
            }
            None => read_status(stream).await,
        }
    }
}

impl Default for ReadinessProber {
    fn default() -> Self {
        Self::new(ProbeConfig::default())
    }
}

/// Wait for the service on `localhost:<port>` with the default budget.
pub async fn wait_for_server_up(port: u16, tls: &TlsConfig) -> bool {
    ReadinessProber::default()
        .probe(&ProbeTarget::loopback(port), tls)
        .await
}

fn client_connector(
    target: &ProbeTarget,
    tls: &TlsConfig,
) -> Result<(TlsConnector, ServerName<'static>), ProbeError> {
    let server_name = ServerName::try_from(target.host.clone())
        .map_err(|_| ProbeError::ServerName(target.host.clone()))?;
    let material = HandshakeMaterial::load(tls)?;
    let config: Arc<ClientConfig> = material.client_config()?;
    Ok((TlsConnector::from(config), server_name))
}

async fn read_status<S>(mut stream: S) -> Result<(), ProbeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    stream
        .write_all(STATUS_COMMAND)
        .await
        .map_err(ProbeError::Exchange)?;
    stream.flush().await.map_err(ProbeError::Exchange)?;

    let mut line = String::new();
    let read = BufReader::new(stream.take(MAX_STATUS_LINE))
        .read_line(&mut line)
        .await
        .map_err(ProbeError::Exchange)?;
    if read == 0 {
        return Err(ProbeError::NoResponse);
    }

    if line.starts_with(VERSION_PREFIX) {
        Ok(())
    } else {
        Err(ProbeError::UnexpectedResponse(line.trim_end().to_string()))
    }
}
