//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! runner, prober, listener
//!     → logging.rs (tracing events, stderr)
//!     → metrics.rs (counters and gauges, optional Prometheus endpoint)
//! ```

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LoggingError};
pub use metrics::init_metrics;
