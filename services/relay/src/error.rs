//! Rejection taxonomy for relay sessions.
//!
//! Every reject path closes the client connection without a response; these
//! values exist so the decision can be logged and counted.

use std::io;

use thiserror::Error;

/// Why the loop guard refused a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyReason {
    /// Client address could not be parsed as an IP.
    InvalidClient,
    /// Client is a loopback or unspecified address.
    LoopbackClient,
    /// Client address text names localhost.
    LocalhostClient,
    /// Sniffed destination is an IP literal.
    LiteralDestination,
    /// Sniffed destination is `localhost`.
    LocalhostDestination,
    /// Destination resolves to a loopback or unspecified address.
    LoopbackDestination,
    /// Destination resolves to the client's own address.
    SelfConnection,
}

impl PolicyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidClient => "invalid_client",
            Self::LoopbackClient => "loopback_client",
            Self::LocalhostClient => "localhost_client",
            Self::LiteralDestination => "literal_destination",
            Self::LocalhostDestination => "localhost_destination",
            Self::LoopbackDestination => "loopback_destination",
            Self::SelfConnection => "self_connection",
        }
    }
}

impl std::fmt::Display for PolicyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A terminal decision that ends a session before or during forwarding.
#[derive(Debug, Error)]
pub enum Reject {
    /// Incomplete or invalid hello bytes.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// Client not covered by the access list.
    #[error("client not allowed")]
    Unauthorized,

    /// Loop, self-connection or localhost policy.
    #[error("policy reject: {0}")]
    Policy(PolicyReason),

    /// Destination resolution or dial failed.
    #[error("upstream failure: {0}")]
    Upstream(String),

    /// Read or write failure on an established leg.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

impl Reject {
    /// Short label used in logs and counters.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MalformedInput(_) => "malformed_input",
            Self::Unauthorized => "unauthorized",
            Self::Policy(_) => "policy",
            Self::Upstream(_) => "upstream_failure",
            Self::Io(_) => "io_error",
        }
    }
}

impl From<PolicyReason> for Reject {
    fn from(reason: PolicyReason) -> Self {
        Self::Policy(reason)
    }
}
