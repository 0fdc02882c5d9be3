//! Relay configuration.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::proxy::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_MAX_CONNECTIONS};

/// Relay configuration (env-driven).
#[derive(Debug, Clone)]
pub struct Config {
    /// Bind addresses for HTTP-sniffing listeners.
    pub http_addrs: Vec<SocketAddr>,

    /// Bind addresses for TLS-sniffing listeners.
    pub tls_addrs: Vec<SocketAddr>,

    /// Control surface bind address.
    pub api_addr: SocketAddr,

    /// Shared secret for mutating control endpoints. Empty disables them.
    pub secret: String,

    /// Max concurrent sessions per listener.
    pub max_connections: usize,

    /// Optional bound on the hello read.
    pub sniff_timeout: Option<Duration>,

    /// Outbound dial timeout.
    pub connect_timeout: Duration,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let http_addrs = parse_addrs(
            &var("HOSTRELAY_HTTP_ADDRS").unwrap_or_else(|| "[::]:80".to_string()),
        )
        .context("HOSTRELAY_HTTP_ADDRS must be a comma-separated list of socket addresses.")?;

        let tls_addrs = parse_addrs(
            &var("HOSTRELAY_TLS_ADDRS").unwrap_or_else(|| "[::]:443".to_string()),
        )
        .context("HOSTRELAY_TLS_ADDRS must be a comma-separated list of socket addresses.")?;

        let api_addr = var("HOSTRELAY_API_ADDR")
            .unwrap_or_else(|| "127.0.0.1:8080".to_string())
            .parse()
            .context("HOSTRELAY_API_ADDR must be a socket address.")?;

        let secret = var("HOSTRELAY_SECRET").unwrap_or_default();

        let max_connections: usize = var("HOSTRELAY_MAX_CONNECTIONS")
            .map(|v| v.parse())
            .transpose()
            .context("HOSTRELAY_MAX_CONNECTIONS must be an integer.")?
            .unwrap_or(DEFAULT_MAX_CONNECTIONS)
            .max(1);

        let sniff_timeout = var("HOSTRELAY_SNIFF_TIMEOUT_MS")
            .map(|v| v.parse::<u64>())
            .transpose()
            .context("HOSTRELAY_SNIFF_TIMEOUT_MS must be an integer (milliseconds).")?
            .map(Duration::from_millis);

        let connect_timeout = var("HOSTRELAY_CONNECT_TIMEOUT_MS")
            .map(|v| v.parse::<u64>())
            .transpose()
            .context("HOSTRELAY_CONNECT_TIMEOUT_MS must be an integer (milliseconds).")?
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_CONNECT_TIMEOUT);

        let log_level = var("HOSTRELAY_LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        Ok(Self {
            http_addrs,
            tls_addrs,
            api_addr,
            secret,
            max_connections,
            sniff_timeout,
            connect_timeout,
            log_level,
        })
    }
}

fn parse_addrs(value: &str) -> Result<Vec<SocketAddr>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse()
                .with_context(|| format!("invalid socket address: {}", s))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.http_addrs, vec!["[::]:80".parse().unwrap()]);
        assert_eq!(config.tls_addrs, vec!["[::]:443".parse().unwrap()]);
        assert_eq!(config.api_addr, "127.0.0.1:8080".parse().unwrap());
        assert!(config.secret.is_empty());
        assert_eq!(config.max_connections, DEFAULT_MAX_CONNECTIONS);
        assert!(config.sniff_timeout.is_none());
        assert_eq!(config.connect_timeout, DEFAULT_CONNECT_TIMEOUT);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_address_lists() {
        let config = load(&[
            ("HOSTRELAY_HTTP_ADDRS", "0.0.0.0:80, [::]:8080"),
            ("HOSTRELAY_TLS_ADDRS", ""),
        ])
        .unwrap();
        assert_eq!(config.http_addrs.len(), 2);
        assert!(config.tls_addrs.is_empty());
    }

    #[test]
    fn test_timeouts() {
        let config = load(&[
            ("HOSTRELAY_SNIFF_TIMEOUT_MS", "2500"),
            ("HOSTRELAY_CONNECT_TIMEOUT_MS", "500"),
        ])
        .unwrap();
        assert_eq!(config.sniff_timeout, Some(Duration::from_millis(2500)));
        assert_eq!(config.connect_timeout, Duration::from_millis(500));
    }

    #[test]
    fn test_invalid_values() {
        assert!(load(&[("HOSTRELAY_HTTP_ADDRS", "not-an-addr")]).is_err());
        assert!(load(&[("HOSTRELAY_API_ADDR", "8080")]).is_err());
        assert!(load(&[("HOSTRELAY_MAX_CONNECTIONS", "many")]).is_err());
        assert!(load(&[("HOSTRELAY_SNIFF_TIMEOUT_MS", "-1")]).is_err());
    }
}
