//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection on the loopback listener
//!     → listener.rs (accept loop, optional TLS handshake)
//!     → connection.rs (tracking, one four-letter command, close)
//! ```
//!
//! # Design Decisions
//! - Each connection is tracked so `stat` and `close_all` see it
//! - TLS is optional and handled before the command is read

pub mod connection;
pub mod listener;

pub use connection::{ConnectionId, ConnectionTracker};
pub use listener::TcpConnectionFactory;
