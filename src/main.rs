//! Embedded service runner.
//!
//! Starts one in-process service on a loopback port, waits until it answers
//! `stat`, then keeps it up until SIGINT or SIGTERM.
//!
//! ```text
//! zk-service-runner <secure> <port> <key-store> <key-store-password> \
//!                   <trust-store> <trust-store-password> [--config runner.toml]
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser};

use zk_service_runner::config::{load_config, RunnerConfig, TlsConfig};
use zk_service_runner::lifecycle::{wait_for_stop_signal, ServiceRunner};
use zk_service_runner::observability::{init_logging, init_metrics};

#[derive(Parser)]
#[command(name = "zk-service-runner")]
#[command(about = "Run an embedded coordination service on a loopback port", long_about = None)]
struct Cli {
    /// Serve over TLS (`true` or `false`).
    #[arg(action = ArgAction::Set)]
    secure: bool,

    /// Loopback port to listen on.
    port: u16,

    /// PEM key store: certificate chain and private key.
    key_store: PathBuf,

    key_store_password: String,

    /// PEM trust store: CA certificates accepted from peers.
    trust_store: PathBuf,

    trust_store_password: String,

    /// Optional TOML file with probe, service and logging settings.
    #[arg(long)]
    config: Option<PathBuf>,
}

impl Cli {
    fn tls(&self) -> TlsConfig {
        if self.secure {
            TlsConfig::secure(
                self.key_store.display().to_string(),
                self.key_store_password.clone(),
                self.trust_store.display().to_string(),
                self.trust_store_password.clone(),
            )
        } else {
            TlsConfig::insecure()
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => match load_config(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load {}: {e}", path.display());
                return ExitCode::FAILURE;
            }
        },
        None => RunnerConfig::default(),
    };
    config.port = cli.port;
    config.tls = cli.tls();

    if let Err(e) = init_logging(&config.observability) {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }

    tracing::info!(
        secure = cli.secure,
        port = cli.port,
        key_store = %cli.key_store.display(),
        key_store_password = "****",
        trust_store = %cli.trust_store.display(),
        trust_store_password = "****",
        "zk-service-runner v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    if let Some(address) = &config.observability.metrics_address {
        match address.parse() {
            Ok(addr) => init_metrics(addr),
            Err(_) => tracing::error!(metrics_address = %address, "Failed to parse metrics address"),
        }
    }

    let runner = ServiceRunner::new(config);
    if let Err(e) = runner.initialize() {
        tracing::error!(error = %e, "Initialization failed");
        runner.close();
        return ExitCode::FAILURE;
    }
    match runner.start().await {
        Ok(address) => tracing::info!(address = %address, "Listening for connections"),
        Err(e) => {
            tracing::error!(error = %e, "Start failed");
            runner.close();
            return ExitCode::FAILURE;
        }
    }

    match wait_for_stop_signal().await {
        Ok(signal) => tracing::info!(signal = ?signal, "Stop signal received"),
        Err(e) => tracing::error!(error = %e, "Failed to listen for stop signals"),
    }

    runner.close();
    tracing::info!("Shutdown complete");
    ExitCode::SUCCESS
}
