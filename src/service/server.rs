//! The in-process coordination service.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use crate::net::connection::ConnectionTracker;
use crate::observability::metrics;
use crate::service::commands::{not_whitelisted_response, CommandWhitelist, FourLetterWord};
use crate::service::database::{Database, VERSION_DIR};
use crate::service::properties::{ServiceProperties, FOUR_LETTER_WORD_WHITELIST};
use crate::service::{EmbeddedService, ServiceError};

/// Prefix of the first line of `stat` and `srvr` responses.
pub const VERSION_PREFIX: &str = "Zookeeper version:";

const NOT_SERVING: &str = "This ZooKeeper instance is not currently serving requests\n";

/// Request counters exposed through `stat` and `srvr`.
#[derive(Debug, Default)]
pub struct ServerStats {
    received: AtomicU64,
    sent: AtomicU64,
}

impl ServerStats {
    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }
}

/// A standalone service instance bound to one working directory.
#[derive(Debug)]
pub struct InProcessServer {
    data_dir: PathBuf,
    snap_dir: PathBuf,
    tick_time: Duration,
    secure: bool,
    whitelist: CommandWhitelist,
    database: Database,
    running: AtomicBool,
    client_addr: OnceLock<SocketAddr>,
    connections: ConnectionTracker,
    stats: ServerStats,
    started_at: Instant,
}

impl InProcessServer {
    /// Construct a service over `data_dir`/`snap_dir`, reading the command
    /// whitelist and TLS selection from `properties`.
    pub fn new(
        data_dir: &Path,
        snap_dir: &Path,
        tick_time: Duration,
        properties: &ServiceProperties,
    ) -> Result<Self, ServiceError> {
        let database = Database::open(data_dir, snap_dir)?;
        let whitelist = CommandWhitelist::parse(properties.get(FOUR_LETTER_WORD_WHITELIST));

        tracing::info!(
            data_dir = %data_dir.display(),
            tick_time_ms = tick_time.as_millis() as u64,
            "Embedded service constructed"
        );

        Ok(Self {
            data_dir: data_dir.to_path_buf(),
            snap_dir: snap_dir.to_path_buf(),
            tick_time,
            secure: properties.tls_config().is_some(),
            whitelist,
            database,
            running: AtomicBool::new(true),
            client_addr: OnceLock::new(),
            connections: ConnectionTracker::new(),
            stats: ServerStats::default(),
            started_at: Instant::now(),
        })
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn connections(&self) -> &ConnectionTracker {
        &self.connections
    }

    pub fn stats(&self) -> &ServerStats {
        &self.stats
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Record the address the listener bound for this service.
    pub fn set_client_addr(&self, addr: SocketAddr) {
        let _ = self.client_addr.set(addr);
    }

    pub fn client_addr(&self) -> Option<SocketAddr> {
        self.client_addr.get().copied()
    }

    /// Answer one four-letter command from `peer`.
    pub fn execute(&self, command: FourLetterWord, peer: SocketAddr) -> String {
        self.stats.received.fetch_add(1, Ordering::Relaxed);
        metrics::record_command(command.as_str());

        let response = if !self.whitelist.allows(command) {
            not_whitelisted_response(command)
        } else {
            match command {
                FourLetterWord::Ruok => "imok".to_string(),
                FourLetterWord::Conf => self.dump_conf(),
                FourLetterWord::Stat | FourLetterWord::Srvr if !self.is_running() => {
                    NOT_SERVING.to_string()
                }
                FourLetterWord::Stat => self.status(Some(peer)),
                FourLetterWord::Srvr => self.status(None),
            }
        };

        self.stats.sent.fetch_add(1, Ordering::Relaxed);
        response
    }

    fn status(&self, peer: Option<SocketAddr>) -> String {
        let mut out = format!(
            "{} {}-inproc, built on {}\n",
            VERSION_PREFIX,
            env!("CARGO_PKG_VERSION"),
            env!("CARGO_PKG_NAME"),
        );
        if let Some(peer) = peer {
            out.push_str("Clients:\n");
            out.push_str(&format!(
                " /{}[1](queued=0,recved=1,sent=0)\n\n",
                peer
            ));
        }
        out.push_str("Latency min/avg/max: 0/0/0\n");
        out.push_str(&format!("Received: {}\n", self.stats.received()));
        out.push_str(&format!("Sent: {}\n", self.stats.sent()));
        out.push_str(&format!("Connections: {}\n", self.connections.active_count()));
        out.push_str("Outstanding: 0\n");
        out.push_str("Zxid: 0x0\n");
        out.push_str("Mode: standalone\n");
        out.push_str("Node count: 5\n");
        out
    }
}

impl EmbeddedService for InProcessServer {
    fn shutdown(&self) -> Result<(), ServiceError> {
        if self.running.swap(false, Ordering::SeqCst) {
            tracing::info!(
                data_dir = %self.data_dir.display(),
                uptime_ms = self.uptime().as_millis() as u64,
                "Embedded service shut down"
            );
        }
        Ok(())
    }

    fn close_storage(&self) -> Result<(), ServiceError> {
        self.database.close()
    }

    fn dump_conf(&self) -> String {
        let tick_ms = self.tick_time.as_millis();
        let port = self.client_addr().map(|a| a.port()).unwrap_or_default();
        let address = self
            .client_addr()
            .map(|a| a.ip().to_string())
            .unwrap_or_else(|| "0.0.0.0".to_string());

        format!(
            "clientPort={port}\n\
             clientPortAddress={address}\n\
             secureClient={secure}\n\
             dataDir={data}\n\
             dataLogDir={snap}\n\
             tickTime={tick_ms}\n\
             maxClientCnxns=60\n\
             minSessionTimeout={min}\n\
             maxSessionTimeout={max}\n\
             serverId=0\n",
            secure = self.secure,
            data = self.data_dir.join(VERSION_DIR).display(),
            snap = self.snap_dir.join(VERSION_DIR).display(),
            min = tick_ms * 2,
            max = tick_ms * 20,
        )
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}
