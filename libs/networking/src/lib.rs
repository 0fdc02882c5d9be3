//! Address helpers for the relay.
//!
//! This library provides:
//! - `IpNet`, a CIDR range over IPv4 or IPv6 used by the allow-list
//! - Forgiving `host[:port]` splitting for client and destination strings
//! - IP-literal detection and IPv4-mapped address canonicalization

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use thiserror::Error;

/// Networking errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NetworkError {
    /// Invalid IP address.
    #[error("invalid IP address: {0}")]
    InvalidAddress(String),

    /// Invalid CIDR prefix.
    #[error("invalid CIDR prefix: {0}")]
    InvalidPrefix(String),
}

// ============================================================================
// CIDR ranges
// ============================================================================

/// A network range: base address plus prefix length.
///
/// The base address is always masked to the prefix, so `10.1.2.3/8` is
/// stored and displayed as `10.0.0.0/8`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IpNet {
    address: IpAddr,
    prefix_len: u8,
}

impl IpNet {
    /// Create a new range, masking the address to the prefix.
    pub fn new(address: IpAddr, prefix_len: u8) -> Result<Self, NetworkError> {
        let max = max_prefix_len(&address);
        if prefix_len > max {
            return Err(NetworkError::InvalidPrefix(format!(
                "prefix length {} exceeds {}",
                prefix_len, max
            )));
        }

        Ok(Self {
            address: mask(address, prefix_len),
            prefix_len,
        })
    }

    /// A single-address range (`/32` for IPv4, `/128` for IPv6).
    pub fn host(address: IpAddr) -> Self {
        Self {
            address,
            prefix_len: max_prefix_len(&address),
        }
    }

    /// Parse from CIDR notation (e.g., "10.0.0.0/8", "2001:db8::/32").
    pub fn from_cidr(s: &str) -> Result<Self, NetworkError> {
        let Some((addr_str, prefix_str)) = s.trim().split_once('/') else {
            return Err(NetworkError::InvalidPrefix(format!(
                "missing '/' in CIDR: {}",
                s
            )));
        };

        let address = IpAddr::from_str(addr_str)
            .map_err(|_| NetworkError::InvalidAddress(addr_str.to_string()))?;

        // Leading '+' or whitespace is accepted by u8::from_str; CIDR is digits only.
        if prefix_str.is_empty() || !prefix_str.bytes().all(|b| b.is_ascii_digit()) {
            return Err(NetworkError::InvalidPrefix(prefix_str.to_string()));
        }
        let prefix_len = prefix_str
            .parse::<u8>()
            .map_err(|_| NetworkError::InvalidPrefix(prefix_str.to_string()))?;

        Self::new(address, prefix_len)
    }

    /// Base (network) address.
    pub fn address(&self) -> IpAddr {
        self.address
    }

    /// Prefix length in bits.
    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    /// Check if an address is within this range.
    ///
    /// IPv4-mapped IPv6 addresses are matched against IPv4 ranges.
    pub fn contains(&self, addr: IpAddr) -> bool {
        let addr = match self.address {
            IpAddr::V4(_) => canonical(addr),
            IpAddr::V6(_) => addr,
        };

        match (self.address, addr) {
            (IpAddr::V4(_), IpAddr::V4(_)) | (IpAddr::V6(_), IpAddr::V6(_)) => {
                mask(addr, self.prefix_len) == self.address
            }
            _ => false,
        }
    }
}

impl std::fmt::Display for IpNet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.address, self.prefix_len)
    }
}

impl FromStr for IpNet {
    type Err = NetworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_cidr(s)
    }
}

fn max_prefix_len(addr: &IpAddr) -> u8 {
    match addr {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    }
}

/// Mask an address to a prefix length.
fn mask(addr: IpAddr, prefix_len: u8) -> IpAddr {
    match addr {
        IpAddr::V4(v4) => {
            let bits = u32::from_be_bytes(v4.octets());
            let mask = if prefix_len == 0 {
                0
            } else if prefix_len >= 32 {
                u32::MAX
            } else {
                u32::MAX << (32 - prefix_len)
            };
            IpAddr::V4(Ipv4Addr::from(bits & mask))
        }
        IpAddr::V6(v6) => {
            let bits = u128::from_be_bytes(v6.octets());
            let mask = if prefix_len == 0 {
                0
            } else if prefix_len >= 128 {
                u128::MAX
            } else {
                u128::MAX << (128 - prefix_len)
            };
            IpAddr::V6(Ipv6Addr::from((bits & mask).to_be_bytes()))
        }
    }
}

// ============================================================================
// Host / address parsing
// ============================================================================

/// Split `host:port`, `[v6]:port`, `[v6]` or a bare host.
///
/// Strings that are not a well-formed `host:port` pair (a bare name, a bare
/// IPv6 literal with several colons) come back whole with no port.
pub fn split_host_port(s: &str) -> (&str, Option<&str>) {
    if let Some(rest) = s.strip_prefix('[') {
        if let Some((host, tail)) = rest.split_once(']') {
            return match tail.strip_prefix(':') {
                Some(port) => (host, Some(port)),
                None if tail.is_empty() => (host, None),
                None => (s, None),
            };
        }
        return (s, None);
    }

    match s.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') => (host, Some(port)),
        _ => (s, None),
    }
}

/// Parse a textual client address, stripping a port suffix if present.
pub fn parse_host_ip(s: &str) -> Option<IpAddr> {
    let s = s.trim();
    let (host, _) = split_host_port(s);
    host.parse::<IpAddr>().ok()
}

/// True when `host` (optionally carrying a port) is an IP literal.
pub fn is_ip_literal(host: &str) -> bool {
    parse_host_ip(host).is_some()
}

/// Prefer the IPv4 form of IPv4-mapped IPv6 addresses.
pub fn canonical(addr: IpAddr) -> IpAddr {
    addr.to_canonical()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_ipnet_from_cidr() {
        let net = IpNet::from_cidr("10.1.2.3/8").unwrap();
        assert_eq!(net.to_string(), "10.0.0.0/8");
        assert!(net.contains(ip("10.200.0.1")));
        assert!(!net.contains(ip("11.0.0.1")));

        let v6 = IpNet::from_cidr("fd00::1/64").unwrap();
        assert_eq!(v6.to_string(), "fd00::/64");
        assert!(v6.contains(ip("fd00::abcd")));
        assert!(!v6.contains(ip("fd01::1")));
    }

    #[test]
    fn test_ipnet_rejects_bad_input() {
        assert!(matches!(
            IpNet::from_cidr("10.0.0.1"),
            Err(NetworkError::InvalidPrefix(_))
        ));
        assert!(matches!(
            IpNet::from_cidr("10.0.0.1/33"),
            Err(NetworkError::InvalidPrefix(_))
        ));
        assert!(matches!(
            IpNet::from_cidr("nope/8"),
            Err(NetworkError::InvalidAddress(_))
        ));
        assert!(IpNet::from_cidr("10.0.0.1/+8").is_err());
        assert!(IpNet::from_cidr("::1/129").is_err());
    }

    #[test]
    fn test_ipnet_host() {
        let net = IpNet::host(ip("192.0.2.7"));
        assert_eq!(net.to_string(), "192.0.2.7/32");
        assert!(net.contains(ip("192.0.2.7")));
        assert!(!net.contains(ip("192.0.2.8")));

        assert_eq!(IpNet::host(ip("::2")).to_string(), "::2/128");
    }

    #[test]
    fn test_ipnet_matches_mapped_v4() {
        let net = IpNet::from_cidr("192.0.2.0/24").unwrap();
        assert!(net.contains(ip("::ffff:192.0.2.9")));
        assert!(!IpNet::from_cidr("::/0").unwrap().contains(ip("192.0.2.9")));
    }

    #[test]
    fn test_zero_prefix_covers_family() {
        let net = IpNet::from_cidr("0.0.0.0/0").unwrap();
        assert!(net.contains(ip("203.0.113.1")));
        assert!(!net.contains(ip("2001:db8::1")));
    }

    #[test]
    fn test_split_host_port() {
        assert_eq!(split_host_port("example.com:443"), ("example.com", Some("443")));
        assert_eq!(split_host_port("example.com"), ("example.com", None));
        assert_eq!(split_host_port("[::1]:80"), ("::1", Some("80")));
        assert_eq!(split_host_port("[::1]"), ("::1", None));
        assert_eq!(split_host_port("::1"), ("::1", None));
        assert_eq!(split_host_port("[::1]x"), ("[::1]x", None));
    }

    #[test]
    fn test_parse_host_ip() {
        assert_eq!(parse_host_ip("10.0.0.5:5555"), Some(ip("10.0.0.5")));
        assert_eq!(parse_host_ip("10.0.0.5"), Some(ip("10.0.0.5")));
        assert_eq!(parse_host_ip("[2001:db8::1]:443"), Some(ip("2001:db8::1")));
        assert_eq!(parse_host_ip("2001:db8::1"), Some(ip("2001:db8::1")));
        assert_eq!(parse_host_ip("localhost:80"), None);
    }

    #[test]
    fn test_is_ip_literal() {
        assert!(is_ip_literal("127.0.0.1"));
        assert!(is_ip_literal("[::1]:443"));
        assert!(!is_ip_literal("example.com"));
        assert!(!is_ip_literal("example.com:443"));
    }

    #[test]
    fn test_canonical() {
        assert_eq!(canonical(ip("::ffff:10.0.0.5")), ip("10.0.0.5"));
        assert_eq!(canonical(ip("2001:db8::1")), ip("2001:db8::1"));
    }
}
