//! Loop, self-connection and localhost guard.
//!
//! Redirected traffic that the relay forwards back into itself (directly, or
//! through a name that resolves to the client or to loopback) would loop
//! until resources run out. The guard refuses such sessions. Destinations are
//! always resolved and the resolved set is compared; a failed or empty lookup
//! rejects the session.

use std::net::IpAddr;
use std::sync::Arc;

use hostrelay_networking::{canonical, is_ip_literal, parse_host_ip};
use tracing::debug;

use super::resolver::Resolver;
use crate::error::{PolicyReason, Reject};

/// Policy evaluator for (client, destination) pairs.
#[derive(Clone)]
pub struct LoopGuard {
    resolver: Arc<dyn Resolver>,
}

impl LoopGuard {
    pub fn new(resolver: Arc<dyn Resolver>) -> Self {
        Self { resolver }
    }

    /// Validate the accepted peer address.
    ///
    /// Returns the canonical client IP. Loopback and unspecified clients, and
    /// any textual address naming localhost, are refused.
    pub fn check_client(addr: &str) -> Result<IpAddr, PolicyReason> {
        if addr.to_ascii_lowercase().contains("localhost") {
            return Err(PolicyReason::LocalhostClient);
        }

        let ip = parse_host_ip(addr)
            .map(canonical)
            .ok_or(PolicyReason::InvalidClient)?;

        if ip.is_loopback() || ip.is_unspecified() {
            return Err(PolicyReason::LoopbackClient);
        }

        Ok(ip)
    }

    /// Validate a sniffed destination host against the client.
    ///
    /// Checks run in order, each a hard reject:
    /// 1. IP literals are refused without resolution.
    /// 2. `localhost` names are refused without resolution.
    /// 3. The host is resolved; failure or an empty answer is a reject.
    /// 4. Any resolved address that is loopback/unspecified, or equal to the
    ///    client address, is refused.
    ///
    /// Returns the resolved addresses on success.
    pub async fn check_destination(
        &self,
        host: &str,
        client: IpAddr,
    ) -> Result<Vec<IpAddr>, Reject> {
        if is_ip_literal(host) {
            return Err(PolicyReason::LiteralDestination.into());
        }

        let name = host.trim_end_matches('.').to_ascii_lowercase();
        if name == "localhost" || name.ends_with(".localhost") {
            return Err(PolicyReason::LocalhostDestination.into());
        }

        let resolved = self
            .resolver
            .resolve(host)
            .await
            .map_err(|e| Reject::Upstream(format!("resolve {}: {}", host, e)))?;

        if resolved.is_empty() {
            return Err(Reject::Upstream(format!("resolve {}: no addresses", host)));
        }

        let client = canonical(client);
        for addr in &resolved {
            let addr = canonical(*addr);
            if addr == client {
                debug!(host = %host, resolved = %addr, "Destination resolves to client");
                return Err(PolicyReason::SelfConnection.into());
            }
            if addr.is_loopback() || addr.is_unspecified() {
                debug!(host = %host, resolved = %addr, "Destination resolves to loopback");
                return Err(PolicyReason::LoopbackDestination.into());
            }
        }

        Ok(resolved)
    }
}
