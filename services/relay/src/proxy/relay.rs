//! Per-connection relay pipeline.
//!
//! A session moves through
//! `Accepted -> ClientValidated -> HelloParsed -> DestinationValidated ->
//! Connected -> Closed`; any failed gate closes it immediately and nothing is
//! written back to the client. The gates run strictly in order: client
//! address, access list, hello parse, destination literal, resolution,
//! self-connection.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::{info, warn};

use super::forward::{self, PumpOutcome};
use super::guard::LoopGuard;
use super::resolver::Resolver;
use super::sniff::{read_hello, Protocol, SniffResult, HELLO_BUFFER_SIZE};
use crate::access::AccessList;
use crate::error::Reject;

/// Destination extracted from the hello.
///
/// The port is never taken from the payload; it is the relay's own
/// listening port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub host: String,
    pub port: u16,
}

impl Destination {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl std::fmt::Display for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Furthest stage a session reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Accepted,
    ClientValidated,
    HelloParsed,
    DestinationValidated,
    Connected,
    Closed,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::ClientValidated => "client_validated",
            Self::HelloParsed => "hello_parsed",
            Self::DestinationValidated => "destination_validated",
            Self::Connected => "connected",
            Self::Closed => "closed",
        }
    }
}

/// Relay settings for one listening port.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Protocol sniffed on this port.
    pub protocol: Protocol,
    /// Port dialled on the destination (the listening port).
    pub port: u16,
    /// Size of the single hello read.
    pub hello_bytes: usize,
    /// Optional bound on the hello read.
    pub sniff_timeout: Option<Duration>,
}

impl RelayConfig {
    pub fn new(protocol: Protocol, port: u16) -> Self {
        Self {
            protocol,
            port,
            hello_bytes: HELLO_BUFFER_SIZE,
            sniff_timeout: None,
        }
    }
}

/// Counters for one relay.
#[derive(Debug, Default)]
pub struct RelayStats {
    /// Connections accepted by the listener.
    pub connections_accepted: AtomicU64,
    /// Connections closed because the listener was at capacity.
    pub connections_over_limit: AtomicU64,
    /// Sessions dropped for malformed or incomplete hellos.
    pub rejected_malformed: AtomicU64,
    /// Sessions dropped because the client is not allowed.
    pub rejected_unauthorized: AtomicU64,
    /// Sessions dropped by the loop guard.
    pub rejected_policy: AtomicU64,
    /// Sessions dropped on resolve or dial failure.
    pub rejected_upstream: AtomicU64,
    /// Sessions ended by an I/O error before or during forwarding.
    pub io_errors: AtomicU64,
    /// Sessions that reached the forwarding stage.
    pub forwarded: AtomicU64,
    /// Bytes copied client -> destination (including the replayed hello).
    pub bytes_to_remote: AtomicU64,
    /// Bytes copied destination -> client.
    pub bytes_to_client: AtomicU64,
}

impl RelayStats {
    fn record_reject(&self, reject: &Reject) {
        let counter = match reject {
            Reject::MalformedInput(_) => &self.rejected_malformed,
            Reject::Unauthorized => &self.rejected_unauthorized,
            Reject::Policy(_) => &self.rejected_policy,
            Reject::Upstream(_) => &self.rejected_upstream,
            Reject::Io(_) => &self.io_errors,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// The authorize -> sniff -> guard -> forward pipeline for one port.
pub struct Relay {
    config: RelayConfig,
    access: Arc<AccessList>,
    resolver: Arc<dyn Resolver>,
    guard: LoopGuard,
    stats: RelayStats,
}

impl Relay {
    pub fn new(config: RelayConfig, access: Arc<AccessList>, resolver: Arc<dyn Resolver>) -> Self {
        Self {
            guard: LoopGuard::new(Arc::clone(&resolver)),
            config,
            access,
            resolver,
            stats: RelayStats::default(),
        }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn stats(&self) -> &RelayStats {
        &self.stats
    }

    /// Serve one accepted connection to completion.
    ///
    /// Never fails: every outcome is logged and counted, and the client
    /// stream is dropped (closed) on return.
    pub async fn serve<S>(&self, stream: S, peer: SocketAddr)
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let mut stage = Stage::Accepted;

        match self.run(stream, peer, &mut stage).await {
            Ok(outcome) => {
                self.stats
                    .bytes_to_remote
                    .fetch_add(outcome.to_remote, Ordering::Relaxed);
                self.stats
                    .bytes_to_client
                    .fetch_add(outcome.to_client, Ordering::Relaxed);

                match &outcome.error {
                    Some(e) => {
                        self.stats.io_errors.fetch_add(1, Ordering::Relaxed);
                        info!(
                            ended_by = outcome.ended_by.as_str(),
                            bytes_to_remote = outcome.to_remote,
                            bytes_to_client = outcome.to_client,
                            error = %e,
                            "Session closed on error"
                        );
                    }
                    None => info!(
                        ended_by = outcome.ended_by.as_str(),
                        bytes_to_remote = outcome.to_remote,
                        bytes_to_client = outcome.to_client,
                        "Session closed"
                    ),
                }
            }
            Err(reject) => {
                self.stats.record_reject(&reject);
                match &reject {
                    Reject::Policy(reason) => warn!(
                        stage = stage.as_str(),
                        reason = reason.as_str(),
                        "Connection blocked"
                    ),
                    Reject::Unauthorized => info!(stage = stage.as_str(), "Client not allowed"),
                    other => info!(
                        stage = stage.as_str(),
                        kind = other.kind(),
                        error = %other,
                        "Connection dropped"
                    ),
                }
            }
        }
    }

    async fn run<S>(
        &self,
        mut client: S,
        peer: SocketAddr,
        stage: &mut Stage,
    ) -> Result<PumpOutcome, Reject>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let peer_text = peer.to_string();

        let client_ip = LoopGuard::check_client(&peer_text)?;
        if !self.access.allow(&peer_text).await {
            return Err(Reject::Unauthorized);
        }
        *stage = Stage::ClientValidated;

        let hello = read_hello(&mut client, self.config.hello_bytes, self.config.sniff_timeout)
            .await
            .map_err(|e| Reject::MalformedInput(format!("hello read failed: {}", e)))?;

        let host = match self.config.protocol.sniff(&hello) {
            SniffResult::Found(host) => host,
            other => return Err(Reject::MalformedInput(other.to_string())),
        };
        *stage = Stage::HelloParsed;

        let destination = Destination::new(host, self.config.port);
        self.guard
            .check_destination(&destination.host, client_ip)
            .await?;
        *stage = Stage::DestinationValidated;

        let mut remote = self
            .resolver
            .dial(&destination.host, destination.port)
            .await
            .map_err(|e| Reject::Upstream(format!("dial {}: {}", destination, e)))?;
        *stage = Stage::Connected;

        info!(destination = %destination, "Forwarding");
        self.stats.forwarded.fetch_add(1, Ordering::Relaxed);

        // The destination must see the bytes consumed while sniffing.
        remote.write_all(&hello).await?;
        let replayed = hello.len() as u64;
        drop(hello);

        let mut outcome = forward::pump(client, remote).await;
        outcome.to_remote += replayed;
        *stage = Stage::Closed;

        Ok(outcome)
    }
}
