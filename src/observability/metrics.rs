//! Metrics collection and exposition.
//!
//! # Metrics
//! - `zk_runner_probe_attempts_total` (counter): readiness attempts by outcome
//! - `zk_runner_service_running` (gauge): 1 while the service is started
//! - `zk_runner_connections_accepted_total` (counter): accepted client connections
//! - `zk_runner_commands_total` (counter): four-letter commands received, by command
//! - `zk_runner_lifecycle_transitions_total` (counter): runner state changes
//!
//! Updates go through the `metrics` facade and are dropped unless a recorder
//! is installed with [`init_metrics`].

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus scrape endpoint on `addr`. Needs a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_probe_attempt(outcome: &'static str) {
    metrics::counter!("zk_runner_probe_attempts_total", "outcome" => outcome).increment(1);
}

pub fn record_service_running(running: bool) {
    metrics::gauge!("zk_runner_service_running").set(if running { 1.0 } else { 0.0 });
}

pub fn record_connection_accepted() {
    metrics::counter!("zk_runner_connections_accepted_total").increment(1);
}

pub fn record_command(command: &'static str) {
    metrics::counter!("zk_runner_commands_total", "command" => command).increment(1);
}

pub fn record_transition(to: &'static str) {
    metrics::counter!("zk_runner_lifecycle_transitions_total", "state" => to).increment(1);
}
