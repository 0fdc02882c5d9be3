//! hostrelay
//!
//! TCP relay that routes each connection by the hostname its client names in
//! the first message: the HTTP `Host` header on plain-text ports and the TLS
//! SNI extension on TLS ports. The destination port is always the port the
//! connection arrived on.
//!
//! This crate provides:
//! - The client allow-list and its HTTP control surface
//! - HTTP and TLS hello sniffers
//! - Loop and self-connection protection
//! - The per-port listener and forwarding pipeline

pub mod access;
pub mod api;
pub mod config;
pub mod error;
pub mod proxy;

pub use access::AccessList;
pub use error::{PolicyReason, Reject};
pub use proxy::{
    Listener, ListenerConfig, LoopGuard, Protocol, Relay, RelayConfig, RelayStats, Resolver,
    SniffResult, SystemResolver,
};
