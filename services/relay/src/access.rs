//! Client allow-list.
//!
//! A process-wide, in-memory set of network ranges permitted to use the
//! relay. It starts empty and is only changed through the control surface.
//! One reader/writer lock guards the whole collection; lookups are linear,
//! which is fine for the tens to hundreds of entries it is meant to hold.

use std::net::{IpAddr, Ipv4Addr};

use hostrelay_networking::{canonical, parse_host_ip, IpNet};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Concurrency-safe store of authorized client ranges.
#[derive(Debug, Default)]
pub struct AccessList {
    entries: RwLock<Vec<IpNet>>,
}

impl AccessList {
    /// Create an empty access list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether an address (optionally with a port) may use the relay.
    ///
    /// `0.0.0.0` is always allowed. Unparseable input is never allowed.
    pub async fn allow(&self, addr: &str) -> bool {
        let Some(ip) = parse_host_ip(addr) else {
            return false;
        };

        let entries = self.entries.read().await;
        Self::covers(&entries, ip)
    }

    /// Add an address or CIDR range.
    ///
    /// Returns true without mutating when the address is already covered.
    /// Input that parses neither as a range nor as a single address leaves
    /// the list unchanged and returns false.
    pub async fn add(&self, addr: &str) -> bool {
        if self.allow(addr).await {
            return true;
        }

        let net = match IpNet::from_cidr(addr) {
            Ok(net) => net,
            Err(_) => match parse_host_ip(addr) {
                Some(ip) => IpNet::host(canonical(ip)),
                None => return false,
            },
        };

        let mut entries = self.entries.write().await;
        // Another writer may have covered it between the read and write lock.
        if entries.contains(&net) {
            return true;
        }
        entries.push(net);

        info!(range = %net, entries = entries.len(), "Access range added");
        true
    }

    /// Remove the first stored range containing `addr`.
    ///
    /// Removal swaps the last entry into the freed slot, so the order of the
    /// remaining entries is not preserved.
    pub async fn remove(&self, addr: &str) -> bool {
        let Some(ip) = parse_host_ip(addr) else {
            return false;
        };

        let mut entries = self.entries.write().await;
        match entries.iter().position(|net| net.contains(ip)) {
            Some(idx) => {
                let removed = entries.swap_remove(idx);
                info!(range = %removed, entries = entries.len(), "Access range removed");
                true
            }
            None => {
                debug!(addr = %ip, "No access range to remove");
                false
            }
        }
    }

    /// Snapshot of the stored ranges.
    pub async fn list(&self) -> Vec<IpNet> {
        self.entries.read().await.clone()
    }

    /// Remove every range.
    pub async fn clear(&self) {
        let mut entries = self.entries.write().await;
        let cleared = entries.len();
        entries.clear();
        info!(cleared = cleared, "Access list purged");
    }

    /// Number of stored ranges.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Check if no ranges are stored.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    fn covers(entries: &[IpNet], ip: IpAddr) -> bool {
        if canonical(ip) == IpAddr::V4(Ipv4Addr::UNSPECIFIED) {
            return true;
        }
        entries.iter().any(|net| net.contains(ip))
    }
}
