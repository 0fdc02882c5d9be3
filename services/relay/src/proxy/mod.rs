//! Host-sniffing TCP relay.
//!
//! This module provides:
//! - TCP listener management with a connection limit
//! - Host extraction from the first HTTP request or TLS ClientHello
//! - Loop and self-connection protection
//! - Bidirectional forwarding to the sniffed destination
//!
//! ## Architecture
//!
//! ```text
//! Client -> Listener -> AccessList -> HelloSniffer -> LoopGuard -> Resolver::dial -> Destination
//!                                          |                                            ^
//!                                          +------------ replayed hello bytes ----------+
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use proxy::{Listener, ListenerConfig, Protocol, SystemResolver};
//!
//! let access = Arc::new(AccessList::new());
//! let resolver = Arc::new(SystemResolver::new());
//!
//! let config = ListenerConfig::new("[::]:443".parse()?, Protocol::Tls);
//! let listener = Arc::new(Listener::bind(config, access, resolver).await?);
//! listener.run().await?;
//! ```

mod forward;
mod guard;
mod http;
mod listener;
mod relay;
mod resolver;
mod sni;
mod sniff;

pub use forward::{pump, Direction, PumpOutcome};
pub use guard::LoopGuard;
pub use http::parse_host;
pub use listener::{Listener, ListenerConfig, DEFAULT_MAX_CONNECTIONS};
pub use relay::{Destination, Relay, RelayConfig, RelayStats, Stage};
pub use resolver::{BoxedStream, RelayStream, Resolver, SystemResolver, DEFAULT_CONNECT_TIMEOUT};
pub use sni::parse_sni;
pub use sniff::{read_hello, Protocol, SniffResult, HELLO_BUFFER_SIZE};
