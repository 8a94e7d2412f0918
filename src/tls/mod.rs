//! TLS credential subsystem.
//!
//! # Data Flow
//! ```text
//! key-store path + password   → credentials.rs → KeyMaterial ─┐
//! trust-store path + password → credentials.rs → TrustMaterial┴→ context.rs
//!     → HandshakeMaterial::client_config()  (readiness prober)
//!     → HandshakeMaterial::server_config()  (connection factory)
//! ```
//!
//! # Design Decisions
//! - Stateless: every call reads the stores from disk again
//! - Failures name their cause (unreadable, malformed, unsupported, password)
//! - One crypto provider (`ring`) for every context the crate builds

pub mod context;
pub mod credentials;

pub use context::HandshakeMaterial;
pub use credentials::{
    crypto_provider, load_key_material, load_trust_material, CredentialError, KeyMaterial,
    TrustMaterial,
};
