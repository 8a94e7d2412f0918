//! Loopback listener and connection factory.
//!
//! # Responsibilities
//! - Bind the configured address with an explicit accept backlog
//! - Optionally wrap accepted connections in TLS (client certificates required)
//! - Hand each connection to the service's four-letter command handler
//! - Close live connections and stop accepting on request

use std::future::poll_fn;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::Poll;
use std::time::Duration;

use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_rustls::TlsAcceptor;

use crate::lifecycle::shutdown::Shutdown;
use crate::net::connection::serve_command;
use crate::observability::metrics;
use crate::service::properties::{
    ServiceProperties, SERVER_CNXN_FACTORY, SSL_KEYSTORE_LOCATION, TLS_CONNECTION_FACTORY,
};
use crate::service::server::InProcessServer;
use crate::service::{ConnectionFactory, ServiceError};
use crate::tls::HandshakeMaterial;

/// Upper bound on a server-side TLS handshake.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Pause after a failed accept so a persistent error does not spin.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(50);

/// Bound listener shared by the factory and its accept loop.
///
/// The factory empties the slot on shutdown, which closes the socket before
/// `shutdown` returns.
type ListenerSlot = Arc<Mutex<Option<TcpListener>>>;

/// TCP connection factory serving an [`InProcessServer`].
///
/// `configure` binds, `startup` spawns the accept loop on the current Tokio
/// runtime, `close_all` drops live connections, `shutdown` stops accepting
/// and releases the socket.
pub struct TcpConnectionFactory {
    properties: ServiceProperties,
    listener: ListenerSlot,
    acceptor: Option<TlsAcceptor>,
    local_addr: Option<SocketAddr>,
    accept_task: Option<JoinHandle<()>>,
    stop_accepting: Shutdown,
    close_connections: Shutdown,
}

impl TcpConnectionFactory {
    pub fn new(properties: ServiceProperties) -> Self {
        Self {
            properties,
            listener: Arc::new(Mutex::new(None)),
            acceptor: None,
            local_addr: None,
            accept_task: None,
            stop_accepting: Shutdown::new(),
            close_connections: Shutdown::new(),
        }
    }

    pub fn is_secure(&self) -> bool {
        self.acceptor.is_some()
    }

    fn tls_acceptor(&self) -> Result<TlsAcceptor, ServiceError> {
        if self.properties.get(SERVER_CNXN_FACTORY) != Some(TLS_CONNECTION_FACTORY) {
            return Err(ServiceError::MissingProperty(SERVER_CNXN_FACTORY));
        }
        let tls = self
            .properties
            .tls_config()
            .ok_or(ServiceError::MissingProperty(SSL_KEYSTORE_LOCATION))?;
        let material = HandshakeMaterial::load(&tls)?;
        Ok(TlsAcceptor::from(material.server_config()?))
    }

    /// Whether a socket is currently bound.
    pub fn is_bound(&self) -> bool {
        lock(&self.listener).is_some()
    }

    fn release_listener(&self) -> Option<SocketAddr> {
        lock(&self.listener).take().and(self.local_addr)
    }
}

fn lock(slot: &ListenerSlot) -> MutexGuard<'_, Option<TcpListener>> {
    match slot.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl ConnectionFactory for TcpConnectionFactory {
    type Service = InProcessServer;

    fn configure(&mut self, bind: SocketAddr, backlog: u32, secure: bool) -> Result<(), ServiceError> {
        if secure {
            self.acceptor = Some(self.tls_acceptor()?);
        }

        let listener = bind_listener(bind, backlog)?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ServiceError::Bind { addr: bind, source })?;

        tracing::info!(
            address = %local_addr,
            backlog,
            secure,
            "Listener bound"
        );

        self.local_addr = Some(local_addr);
        *lock(&self.listener) = Some(listener);
        Ok(())
    }

    fn startup(&mut self, service: Arc<InProcessServer>) -> Result<(), ServiceError> {
        if self.accept_task.is_some() {
            return Err(ServiceError::AlreadyStarted);
        }
        if !self.is_bound() {
            return Err(ServiceError::NotConfigured);
        }
        if let Some(addr) = self.local_addr {
            service.set_client_addr(addr);
        }

        let task = tokio::spawn(accept_loop(
            Arc::clone(&self.listener),
            self.acceptor.clone(),
            service,
            self.stop_accepting.subscribe(),
            self.close_connections.clone(),
        ));
        self.accept_task = Some(task);
        Ok(())
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    fn close_all(&self) -> Result<(), ServiceError> {
        let closed = self.close_connections.trigger();
        tracing::debug!(closed, "Closed live connections");
        Ok(())
    }

    fn shutdown(&self) -> Result<(), ServiceError> {
        self.stop_accepting.trigger();
        if let Some(task) = &self.accept_task {
            task.abort();
        }
        if let Some(address) = self.release_listener() {
            tracing::info!(address = %address, "Listener shut down");
        }
        Ok(())
    }
}

impl Drop for TcpConnectionFactory {
    fn drop(&mut self) {
        if let Some(task) = self.accept_task.take() {
            task.abort();
        }
        self.release_listener();
    }
}

fn bind_listener(addr: SocketAddr, backlog: u32) -> Result<TcpListener, ServiceError> {
    let bind_err = move |source| ServiceError::Bind { addr, source };

    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()
    } else {
        TcpSocket::new_v6()
    }
    .map_err(bind_err)?;
    socket.set_reuseaddr(true).map_err(bind_err)?;
    socket.bind(addr).map_err(bind_err)?;
    socket.listen(backlog).map_err(bind_err)
}

/// Accept from the slot; `None` once the factory released the socket.
async fn accept(slot: &ListenerSlot) -> Option<std::io::Result<(TcpStream, SocketAddr)>> {
    poll_fn(|cx| match lock(slot).as_ref() {
        Some(listener) => listener.poll_accept(cx).map(Some),
        None => Poll::Ready(None),
    })
    .await
}

async fn accept_loop(
    listener: ListenerSlot,
    acceptor: Option<TlsAcceptor>,
    service: Arc<InProcessServer>,
    mut stop: broadcast::Receiver<()>,
    close: Shutdown,
) {
    loop {
        tokio::select! {
            accepted = accept(&listener) => match accepted {
                None => break,
                Some(Ok((stream, peer))) => {
                    metrics::record_connection_accepted();
                    let guard = service.connections().track();
                    let acceptor = acceptor.clone();
                    let service = Arc::clone(&service);
                    let mut closed = close.subscribe();

                    tokio::spawn(async move {
                        tokio::select! {
                            result = handle_connection(stream, peer, acceptor, &service) => {
                                if let Err(e) = result {
                                    tracing::debug!(connection_id = %guard.id(), peer = %peer, error = %e, "Connection failed");
                                }
                            }
                            _ = closed.recv() => {
                                tracing::debug!(connection_id = %guard.id(), peer = %peer, "Connection closed by factory");
                            }
                        }
                        drop(guard);
                    });
                }
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "Failed to accept connection");
                    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                }
            },
            _ = stop.recv() => {
                tracing::debug!("Accept loop stopping");
                break;
            }
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    acceptor: Option<TlsAcceptor>,
    service: &InProcessServer,
) -> std::io::Result<()> {
    match acceptor {
        Some(acceptor) => {
            let tls = tokio::time::timeout(HANDSHAKE_TIMEOUT, acceptor.accept(stream))
                .await
                .map_err(|_| {
                    std::io::Error::new(std::io::ErrorKind::TimedOut, "TLS handshake timed out")
                })??;
            serve_command(tls, peer, service).await
        }
        None => serve_command(stream, peer, service).await,
    }
}
