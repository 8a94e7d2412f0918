//! Readiness checking.
//!
//! # Data Flow
//! ```text
//! ServiceRunner::start or an external caller
//!     → probe.rs (connect, optional TLS, `stat`)
//!     → retry until "Zookeeper version:" or the attempt budget is spent
//! ```

pub mod probe;

pub use probe::{wait_for_server_up, ProbeError, ProbeTarget, ReadinessProber};
