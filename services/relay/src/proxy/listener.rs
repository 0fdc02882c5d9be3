//! TCP listener and accept loop.
//!
//! One listener per relayed port. Each accepted connection is served on its
//! own task; the only state shared between tasks is the access list and the
//! relay counters.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tracing::{error, info, warn, Instrument};

use super::relay::{Relay, RelayConfig, RelayStats};
use super::resolver::Resolver;
use super::sniff::Protocol;
use crate::access::AccessList;

/// Default maximum concurrent connections per listener.
pub const DEFAULT_MAX_CONNECTIONS: usize = 10000;

/// Configuration for a listener.
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Protocol sniffed on this listener.
    pub protocol: Protocol,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Optional bound on the hello read.
    pub sniff_timeout: Option<Duration>,
}

impl ListenerConfig {
    /// Create a new listener configuration.
    pub fn new(bind_addr: SocketAddr, protocol: Protocol) -> Self {
        Self {
            bind_addr,
            protocol,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            sniff_timeout: None,
        }
    }
}

/// A bound relay port.
pub struct Listener {
    /// The TCP listener.
    listener: TcpListener,
    /// Session pipeline shared by every connection task.
    relay: Arc<Relay>,
    /// Connection semaphore for limiting concurrent connections.
    conn_semaphore: Arc<Semaphore>,
}

impl Listener {
    /// Bind a listener. The bound port becomes the destination port.
    pub async fn bind(
        config: ListenerConfig,
        access: Arc<AccessList>,
        resolver: Arc<dyn Resolver>,
    ) -> io::Result<Self> {
        let listener = TcpListener::bind(config.bind_addr).await?;
        let local_addr = listener.local_addr()?;

        let mut relay_config = RelayConfig::new(config.protocol, local_addr.port());
        relay_config.sniff_timeout = config.sniff_timeout;

        info!(
            protocol = %config.protocol,
            bind_addr = %local_addr,
            max_connections = config.max_connections,
            "Listener bound"
        );

        Ok(Self {
            listener,
            relay: Arc::new(Relay::new(relay_config, access, resolver)),
            conn_semaphore: Arc::new(Semaphore::new(config.max_connections)),
        })
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// The relay pipeline behind this listener.
    pub fn relay(&self) -> &Arc<Relay> {
        &self.relay
    }

    /// Get relay statistics.
    pub fn stats(&self) -> &RelayStats {
        self.relay.stats()
    }

    /// Run the accept loop. Accept errors are logged and retried.
    pub async fn run(self: Arc<Self>) -> io::Result<()> {
        let local_addr = self.listener.local_addr()?;
        let protocol = self.relay.config().protocol;
        let port = self.relay.config().port;
        info!(protocol = %protocol, bind_addr = %local_addr, "Listener started");

        loop {
            match self.listener.accept().await {
                Ok((stream, peer_addr)) => {
                    let stats = self.relay.stats();

                    let permit = match self.conn_semaphore.clone().try_acquire_owned() {
                        Ok(permit) => permit,
                        Err(_) => {
                            stats.connections_over_limit.fetch_add(1, Ordering::Relaxed);
                            warn!(
                                protocol = %protocol,
                                peer_addr = %peer_addr,
                                "Connection rejected: max connections reached"
                            );
                            continue;
                        }
                    };
                    stats.connections_accepted.fetch_add(1, Ordering::Relaxed);

                    let relay = Arc::clone(&self.relay);
                    tokio::spawn(
                        async move {
                            relay.serve(stream, peer_addr).await;
                            drop(permit);
                        }
                        .instrument(tracing::info_span!(
                            "connection",
                            protocol = %protocol,
                            port = port,
                            peer = %peer_addr
                        )),
                    );
                }
                Err(e) => {
                    error!(protocol = %protocol, error = %e, "Accept error");
                    // Brief sleep to avoid tight loop on persistent errors
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            }
        }
    }
}
