//! Service lifecycle state machine.
//!
//! # States
//! ```text
//! Idle → Initialized → Running → Stopped
//!              ↑                     │
//!              └──── initialize ─────┘
//! ```
//!
//! # Design Decisions
//! - Service and listener handles live in atomically swappable slots; a
//!   compare-and-swap on the service slot decides which start wins
//! - Teardown runs two independently guarded steps and never fails
//! - The working directory is deleted at most once, after the service stops

use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use arc_swap::{ArcSwap, ArcSwapOption};
use thiserror::Error;

use crate::config::RunnerConfig;
use crate::health::{ProbeTarget, ReadinessProber};
use crate::lifecycle::workdir::WorkingDirectory;
use crate::observability::metrics;
use crate::service::properties::{ServiceProperties, FOUR_LETTER_WORD_WHITELIST};
use crate::service::{
    ConnectionFactory, EmbeddedService, InProcessProvider, ServiceError, ServiceProvider,
};

/// Pending connections the listener queues before refusing.
pub const MAX_PENDING_CONNECTIONS: u32 = 1000;

const NOT_INITIALIZED: &str = "Not Initialized";
const ALREADY_RUNNING: &str = "Already Running";

/// Where the runner is in its lifecycle.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    Idle = 0,
    Initialized = 1,
    Running = 2,
    Stopped = 3,
}

impl RunnerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunnerState::Idle => "idle",
            RunnerState::Initialized => "initialized",
            RunnerState::Running => "running",
            RunnerState::Stopped => "stopped",
        }
    }
}

impl From<u8> for RunnerState {
    fn from(val: u8) -> Self {
        match val {
            1 => RunnerState::Initialized,
            2 => RunnerState::Running,
            3 => RunnerState::Stopped,
            _ => RunnerState::Idle,
        }
    }
}

/// Errors surfaced by lifecycle transitions.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("failed to create working directory: {0}")]
    Initialization(#[source] std::io::Error),

    #[error("{0}")]
    IllegalState(&'static str),

    #[error("service is already started")]
    AlreadyStarted,

    #[error("service at {address} not up after {attempts} attempts")]
    StartupTimeout { address: SocketAddr, attempts: u32 },

    #[error(transparent)]
    Service(#[from] ServiceError),
}

/// Owns one embedded service instance, its listener and working directory.
///
/// All transitions take `&self`, so a runner can be shared behind an `Arc`.
/// Dropping the runner closes it.
pub struct ServiceRunner<P: ServiceProvider = InProcessProvider> {
    config: RunnerConfig,
    provider: P,
    prober: ReadinessProber,
    server: ArcSwapOption<P::Service>,
    factory: ArcSwapOption<P::Factory>,
    work_dir: ArcSwapOption<WorkingDirectory>,
    properties: ArcSwap<ServiceProperties>,
    state: AtomicU8,
}

impl ServiceRunner<InProcessProvider> {
    pub fn new(config: RunnerConfig) -> Self {
        Self::with_provider(config, InProcessProvider)
    }
}

impl<P: ServiceProvider> ServiceRunner<P> {
    pub fn with_provider(config: RunnerConfig, provider: P) -> Self {
        let prober = ReadinessProber::new(config.probe.clone());
        Self {
            config,
            provider,
            prober,
            server: ArcSwapOption::empty(),
            factory: ArcSwapOption::empty(),
            work_dir: ArcSwapOption::empty(),
            properties: ArcSwap::from_pointee(ServiceProperties::new()),
            state: AtomicU8::new(RunnerState::Idle as u8),
        }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    pub fn state(&self) -> RunnerState {
        RunnerState::from(self.state.load(Ordering::SeqCst))
    }

    /// Address the listener is bound to while started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        (*self.factory.load()).as_ref().and_then(|f| f.local_addr())
    }

    pub fn working_dir(&self) -> Option<PathBuf> {
        (*self.work_dir.load()).as_ref().map(|d| d.path().to_path_buf())
    }

    /// Current ambient properties handed to the service at construction.
    pub fn properties(&self) -> Arc<ServiceProperties> {
        self.properties.load_full()
    }

    /// Prepare a working directory and the ambient properties.
    ///
    /// A stopped runner gets a fresh directory; the previous one is deleted.
    pub fn initialize(&self) -> Result<(), RunnerError> {
        match self.state() {
            RunnerState::Running => return Err(RunnerError::IllegalState(ALREADY_RUNNING)),
            RunnerState::Initialized if self.work_dir.load().is_some() => {}
            _ => {
                let dir = WorkingDirectory::create().map_err(RunnerError::Initialization)?;
                tracing::info!(path = %dir.path().display(), "Working directory prepared");
                if let Some(previous) = self.work_dir.swap(Some(Arc::new(dir))) {
                    previous.delete();
                }
            }
        }

        let mut properties = ServiceProperties::new().with(FOUR_LETTER_WORD_WHITELIST, "*");
        if self.config.tls.is_secure() {
            properties = properties.with_tls(&self.config.tls);
        }
        self.properties.store(Arc::new(properties));

        self.transition(RunnerState::Initialized);
        Ok(())
    }

    /// Construct the service, bind the listener and wait until it answers.
    ///
    /// On `StartupTimeout` or a listener failure the service stays in its
    /// slot; call [`stop`](Self::stop) or [`close`](Self::close) to release it.
    pub async fn start(&self) -> Result<SocketAddr, RunnerError> {
        if !matches!(self.state(), RunnerState::Initialized | RunnerState::Running) {
            return Err(RunnerError::IllegalState(NOT_INITIALIZED));
        }
        let dir = self
            .work_dir
            .load_full()
            .ok_or(RunnerError::IllegalState(NOT_INITIALIZED))?;
        let properties = self.properties.load_full();

        let service = Arc::new(self.provider.construct(
            dir.path(),
            dir.path(),
            self.config.service.tick_time(),
            &properties,
        )?);

        let already_started = self
            .server
            .compare_and_swap(&None::<Arc<P::Service>>, Some(Arc::clone(&service)))
            .is_some();
        if already_started {
            tracing::warn!("Service already started, discarding the new instance");
            shutdown_service(service.as_ref());
            return Err(RunnerError::AlreadyStarted);
        }

        let secure = self.config.tls.is_secure();
        let bind = SocketAddr::from((Ipv4Addr::LOCALHOST, self.config.port));
        let mut factory = self.provider.create_factory(&properties)?;
        factory.configure(bind, MAX_PENDING_CONNECTIONS, secure)?;
        factory.startup(Arc::clone(&service))?;
        let address = factory.local_addr().unwrap_or(bind);
        self.factory.store(Some(Arc::new(factory)));

        self.transition(RunnerState::Running);
        metrics::record_service_running(true);

        let target = ProbeTarget::loopback(address.port());
        if !self.prober.probe(&target, &self.config.tls).await {
            return Err(RunnerError::StartupTimeout {
                address,
                attempts: self.prober.config().max_attempts,
            });
        }

        tracing::info!(
            address = %address,
            secure,
            conf = %service.dump_conf(),
            "Service started"
        );
        Ok(address)
    }

    /// Tear down the listener, then the service. Safe from any state.
    pub fn stop(&self) {
        if let Some(factory) = self.factory.swap(None) {
            if let Err(e) = factory.close_all() {
                tracing::warn!(error = %e, "Failed to close connections");
            }
            if let Err(e) = factory.shutdown() {
                tracing::warn!(error = %e, "Failed to shut down listener");
            }
        }

        if let Some(service) = self.server.swap(None) {
            shutdown_service(service.as_ref());
            metrics::record_service_running(false);
        }

        if self.config.tls.is_secure() {
            let cleared = (*self.properties.load_full()).clone().without_tls();
            self.properties.store(Arc::new(cleared));
        }

        let stopped = self
            .state
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |s| {
                match RunnerState::from(s) {
                    RunnerState::Initialized | RunnerState::Running => {
                        Some(RunnerState::Stopped as u8)
                    }
                    _ => None,
                }
            })
            .is_ok();
        if stopped {
            metrics::record_transition(RunnerState::Stopped.as_str());
            tracing::info!("Service stopped");
        }
    }

    /// Stop, then delete the working directory.
    pub fn close(&self) {
        self.stop();
        if let Some(dir) = self.work_dir.swap(None) {
            dir.delete();
        }
    }

    fn transition(&self, to: RunnerState) {
        let from = RunnerState::from(self.state.swap(to as u8, Ordering::SeqCst));
        if from != to {
            metrics::record_transition(to.as_str());
            tracing::debug!(from = from.as_str(), to = to.as_str(), "Runner state changed");
        }
    }
}

impl<P: ServiceProvider> Drop for ServiceRunner<P> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Shut the service down and release its storage; each step is attempted.
fn shutdown_service<S: EmbeddedService>(service: &S) {
    if let Err(e) = service.shutdown() {
        tracing::warn!(error = %e, "Failed to shut down service");
    }
    if let Err(e) = service.close_storage() {
        tracing::warn!(error = %e, "Failed to close service storage");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ProbeConfig, TlsConfig};
    use crate::service::properties::SERVER_CNXN_FACTORY;

    fn config() -> RunnerConfig {
        RunnerConfig {
            port: 0,
            probe: ProbeConfig {
                max_attempts: 5,
                retry_delay_ms: 20,
                io_timeout_ms: 1000,
            },
            ..RunnerConfig::default()
        }
    }

    #[test]
    fn state_round_trips_through_u8() {
        for state in [
            RunnerState::Idle,
            RunnerState::Initialized,
            RunnerState::Running,
            RunnerState::Stopped,
        ] {
            assert_eq!(RunnerState::from(state as u8), state);
        }
        assert_eq!(RunnerState::from(42), RunnerState::Idle);
    }

    #[test]
    fn initialize_prepares_directory_and_whitelist() {
        let runner = ServiceRunner::new(config());
        runner.initialize().unwrap();

        assert_eq!(runner.state(), RunnerState::Initialized);
        assert!(runner.working_dir().unwrap().is_dir());
        assert_eq!(runner.properties().get(FOUR_LETTER_WORD_WHITELIST), Some("*"));
        assert_eq!(runner.properties().get(SERVER_CNXN_FACTORY), None);
    }

    #[test]
    fn initialize_twice_keeps_the_directory() {
        let runner = ServiceRunner::new(config());
        runner.initialize().unwrap();
        let first = runner.working_dir().unwrap();
        runner.initialize().unwrap();
        assert_eq!(runner.working_dir().unwrap(), first);
    }

    #[test]
    fn secure_config_sets_and_stop_clears_tls_properties() {
        let mut config = config();
        config.tls = TlsConfig::secure("/ks.pem", "k", "/ts.pem", "t");
        let runner = ServiceRunner::new(config);

        runner.initialize().unwrap();
        assert!(runner.properties().tls_config().is_some());

        runner.stop();
        assert!(runner.properties().tls_config().is_none());
        assert_eq!(runner.state(), RunnerState::Stopped);
    }

    #[tokio::test]
    async fn start_requires_initialize() {
        let runner = ServiceRunner::new(config());
        let err = runner.start().await.unwrap_err();
        assert!(matches!(err, RunnerError::IllegalState(msg) if msg == "Not Initialized"));
        assert_eq!(runner.state(), RunnerState::Idle);
    }

    #[test]
    fn stop_in_idle_is_a_no_op() {
        let runner = ServiceRunner::new(config());
        runner.stop();
        runner.stop();
        assert_eq!(runner.state(), RunnerState::Idle);
        assert!(runner.working_dir().is_none());
    }

    #[tokio::test]
    async fn reinitialize_after_stop_uses_a_fresh_directory() {
        let runner = ServiceRunner::new(config());
        runner.initialize().unwrap();
        runner.start().await.unwrap();
        let first = runner.working_dir().unwrap();

        runner.stop();
        runner.initialize().unwrap();
        let second = runner.working_dir().unwrap();

        assert_ne!(first, second);
        assert!(!first.exists());
        assert!(second.is_dir());
        runner.close();
    }
}
