//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! runner.rs
//!     initialize → workdir.rs (fresh directory) + ambient properties
//!     start      → ServiceProvider::construct → ConnectionFactory → health::probe
//!     stop       → listener teardown, then service teardown
//!     close      → stop + directory deletion
//!
//! shutdown.rs: broadcast stop for accept loops and live connections
//! signals.rs:  SIGINT/SIGTERM → close the runner
//! ```

pub mod runner;
pub mod shutdown;
pub mod signals;
pub mod workdir;

pub use runner::{RunnerError, RunnerState, ServiceRunner, MAX_PENDING_CONNECTIONS};
pub use shutdown::Shutdown;
pub use signals::{wait_for_stop_signal, StopSignal};
pub use workdir::WorkingDirectory;
