//! Embedded service subsystem.
//!
//! # Data Flow
//! ```text
//! ServiceProvider::construct(data_dir, snap_dir, tick_time, properties)
//!     → server.rs (InProcessServer, opens database.rs)
//! ServiceProvider::create_factory(properties)
//!     → net::listener (TcpConnectionFactory)
//!     → configure(bind, backlog, secure) → startup(service)
//!     → connections answer commands.rs four-letter words
//! ```
//!
//! # Design Decisions
//! - The runner only sees the traits below; the in-process implementation is
//!   one provider among possible others
//! - Settings the service reads at construction travel in an explicit
//!   `ServiceProperties` snapshot, never through process globals

pub mod commands;
pub mod database;
pub mod properties;
pub mod server;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::net::listener::TcpConnectionFactory;
use crate::tls::CredentialError;

pub use properties::ServiceProperties;
pub use server::InProcessServer;

/// Failures reported by service collaborators.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("storage error at {}: {source}", .path.display())]
    Storage {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("required property {0} is not set")]
    MissingProperty(&'static str),

    #[error("listener is not configured")]
    NotConfigured,

    #[error("listener is already started")]
    AlreadyStarted,

    #[error("TLS credentials: {0}")]
    Credentials(#[from] CredentialError),
}

/// The running service instance.
pub trait EmbeddedService: Send + Sync + 'static {
    /// Stop serving requests. Calling it again is a no-op.
    fn shutdown(&self) -> Result<(), ServiceError>;

    /// Release the storage handle (transaction log).
    fn close_storage(&self) -> Result<(), ServiceError>;

    /// Human-readable configuration dump.
    fn dump_conf(&self) -> String;

    fn is_running(&self) -> bool;
}

/// Network front-end of a service instance.
pub trait ConnectionFactory: Send + Sync + 'static {
    type Service: EmbeddedService;

    /// Bind `bind` with `backlog` pending connections, TLS on or off.
    fn configure(&mut self, bind: SocketAddr, backlog: u32, secure: bool) -> Result<(), ServiceError>;

    /// Begin accepting connections for `service`. Must run inside a Tokio runtime.
    fn startup(&mut self, service: Arc<Self::Service>) -> Result<(), ServiceError>;

    /// Address actually bound by `configure`.
    fn local_addr(&self) -> Option<SocketAddr>;

    /// Close every live connection.
    fn close_all(&self) -> Result<(), ServiceError>;

    /// Stop accepting and release the socket.
    fn shutdown(&self) -> Result<(), ServiceError>;
}

/// Creates service instances and their connection factories.
pub trait ServiceProvider: Send + Sync + 'static {
    type Service: EmbeddedService;
    type Factory: ConnectionFactory<Service = Self::Service>;

    fn construct(
        &self,
        data_dir: &Path,
        snap_dir: &Path,
        tick_time: Duration,
        properties: &ServiceProperties,
    ) -> Result<Self::Service, ServiceError>;

    fn create_factory(&self, properties: &ServiceProperties) -> Result<Self::Factory, ServiceError>;
}

/// Provider of [`InProcessServer`] behind a [`TcpConnectionFactory`].
#[derive(Debug, Clone, Copy, Default)]
pub struct InProcessProvider;

impl ServiceProvider for InProcessProvider {
    type Service = InProcessServer;
    type Factory = TcpConnectionFactory;

    fn construct(
        &self,
        data_dir: &Path,
        snap_dir: &Path,
        tick_time: Duration,
        properties: &ServiceProperties,
    ) -> Result<InProcessServer, ServiceError> {
        InProcessServer::new(data_dir, snap_dir, tick_time, properties)
    }

    fn create_factory(&self, properties: &ServiceProperties) -> Result<TcpConnectionFactory, ServiceError> {
        Ok(TcpConnectionFactory::new(properties.clone()))
    }
}
