//! Resolver/Dialer seam.
//!
//! The relay never performs DNS or connection setup itself; it goes through
//! a [`Resolver`] so deployments can swap in their own lookup and dial path
//! and tests can substitute a static table.

use std::io;
use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

/// Default connect timeout for outbound dials.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// A bidirectional byte stream usable as either relay leg.
pub trait RelayStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> RelayStream for T {}

/// Boxed outbound stream returned by [`Resolver::dial`].
pub type BoxedStream = Box<dyn RelayStream>;

/// Name resolution and outbound connection setup.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Resolve a hostname to its addresses. Lookup failure is an error.
    async fn resolve(&self, host: &str) -> io::Result<Vec<IpAddr>>;

    /// Open a TCP connection to `host:port`.
    async fn dial(&self, host: &str, port: u16) -> io::Result<BoxedStream>;
}

/// Resolver backed by the operating system's resolver and TCP stack.
#[derive(Debug, Clone)]
pub struct SystemResolver {
    connect_timeout: Duration,
}

impl SystemResolver {
    pub fn new() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Create a resolver with a custom connect timeout.
    pub fn with_timeout(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for SystemResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Resolver for SystemResolver {
    async fn resolve(&self, host: &str) -> io::Result<Vec<IpAddr>> {
        let mut addrs: Vec<IpAddr> = tokio::net::lookup_host((host, 0))
            .await?
            .map(|addr| addr.ip())
            .collect();
        addrs.sort();
        addrs.dedup();

        debug!(host = %host, count = addrs.len(), "Resolved destination");
        Ok(addrs)
    }

    async fn dial(&self, host: &str, port: u16) -> io::Result<BoxedStream> {
        let stream = match timeout(self.connect_timeout, TcpStream::connect((host, port))).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "connect timeout",
                ))
            }
        };
        stream.set_nodelay(true)?;
        Ok(Box::new(stream))
    }
}
