//! Per-connection bookkeeping and four-letter command exchange.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing
//! - Count live connections for `stat` and for shutdown
//! - Read one command, write the answer, close

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::service::commands::FourLetterWord;
use crate::service::server::InProcessServer;

/// Global atomic counter for connection IDs.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// How long a client may take to send its four command bytes.
pub const COMMAND_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Counts live connections of one service instance.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    active_count: Arc<AtomicU64>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new connection. The returned guard decrements on drop.
    pub fn track(&self) -> ConnectionGuard {
        self.active_count.fetch_add(1, Ordering::SeqCst);
        ConnectionGuard {
            active_count: Arc::clone(&self.active_count),
            id: ConnectionId::new(),
        }
    }

    pub fn active_count(&self) -> u64 {
        self.active_count.load(Ordering::SeqCst)
    }
}

/// Guard that tracks a connection's lifetime.
#[derive(Debug)]
pub struct ConnectionGuard {
    active_count: Arc<AtomicU64>,
    id: ConnectionId,
}

impl ConnectionGuard {
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.active_count.fetch_sub(1, Ordering::SeqCst);
        tracing::trace!(connection_id = %self.id, "Connection closed");
    }
}

/// Read one four-letter command from `io`, answer it and close the stream.
///
/// Bytes that do not form a known command close the connection silently.
pub async fn serve_command<S>(
    mut io: S,
    peer: SocketAddr,
    service: &InProcessServer,
) -> std::io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut word = [0u8; 4];
    tokio::time::timeout(COMMAND_READ_TIMEOUT, io.read_exact(&mut word))
        .await
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::TimedOut, "no command received"))??;

    match FourLetterWord::parse(&word) {
        Some(command) => {
            tracing::debug!(peer = %peer, command = %command, "Four-letter command");
            let response = service.execute(command, peer);
            io.write_all(response.as_bytes()).await?;
            io.flush().await?;
        }
        None => {
            tracing::debug!(peer = %peer, bytes = ?word, "Unknown command, closing");
        }
    }

    io.shutdown().await
}
