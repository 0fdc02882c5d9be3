//! First-message sniffing shared by the HTTP and TLS relays.
//!
//! Each accepted connection gets exactly one read of at most
//! [`HELLO_BUFFER_SIZE`] bytes. A hello split across several TCP segments is
//! not reassembled; it is rejected like any other malformed input.

use std::io;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::timeout;

use super::{http, sni};

/// Upper bound for the single hello read.
pub const HELLO_BUFFER_SIZE: usize = 1400;

/// Application protocol a relay instance sniffs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    /// Plain HTTP, routed by the `Host` header.
    Http,
    /// TLS, routed by the ClientHello SNI extension.
    Tls,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "HTTP",
            Self::Tls => "TLS",
        }
    }

    /// Extract the destination host from a hello buffer.
    pub fn sniff(&self, data: &[u8]) -> SniffResult {
        match self {
            Self::Http => http::parse_host(data),
            Self::Tls => sni::parse_sni(data),
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of sniffing a hello buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SniffResult {
    /// Destination hostname (lowercase, trailing dot trimmed, no port).
    Found(String),
    /// Bytes are not the expected protocol.
    NotProtocol,
    /// The buffer ends before the message is complete.
    Incomplete,
    /// Message parsed but carries no destination host.
    NoHost,
    /// A length field points outside the buffer or a value is invalid.
    Malformed,
}

impl std::fmt::Display for SniffResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Found(host) => write!(f, "found {}", host),
            Self::NotProtocol => f.write_str("unexpected protocol"),
            Self::Incomplete => f.write_str("incomplete hello"),
            Self::NoHost => f.write_str("no destination host"),
            Self::Malformed => f.write_str("malformed hello"),
        }
    }
}

/// Lowercase a hostname and trim a trailing dot.
pub(crate) fn normalize_host(host: &str) -> String {
    host.trim().to_ascii_lowercase().trim_end_matches('.').to_string()
}

/// Perform the single hello read.
///
/// Returns the bytes read; an immediate end-of-stream is an error. With a
/// timeout, a client that stays silent past it fails with `TimedOut`.
pub async fn read_hello<R: AsyncRead + Unpin>(
    stream: &mut R,
    max_bytes: usize,
    read_timeout: Option<Duration>,
) -> io::Result<Vec<u8>> {
    let mut buffer = vec![0u8; max_bytes];

    let n = match read_timeout {
        Some(limit) => match timeout(limit, stream.read(&mut buffer)).await {
            Ok(result) => result?,
            Err(_) => return Err(io::Error::new(io::ErrorKind::TimedOut, "hello read timeout")),
        },
        None => stream.read(&mut buffer).await?,
    };

    if n == 0 {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "connection closed before hello",
        ));
    }

    buffer.truncate(n);
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[test]
    fn test_normalize_host() {
        assert_eq!(normalize_host("Example.COM."), "example.com");
        assert_eq!(normalize_host(" example.org "), "example.org");
    }

    #[test]
    fn test_protocol_dispatch() {
        let request = b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n";
        assert_eq!(
            Protocol::Http.sniff(request),
            SniffResult::Found("example.com".to_string())
        );
        assert_eq!(Protocol::Tls.sniff(request), SniffResult::NotProtocol);
    }

    #[tokio::test]
    async fn test_read_hello_single_read() {
        let (mut client, mut server) = tokio::io::duplex(4096);
        client.write_all(b"first").await.unwrap();

        let hello = read_hello(&mut server, HELLO_BUFFER_SIZE, None).await.unwrap();
        assert_eq!(hello, b"first");
    }

    #[tokio::test]
    async fn test_read_hello_is_bounded() {
        let (mut client, mut server) = tokio::io::duplex(8192);
        client.write_all(&[b'a'; 3000]).await.unwrap();

        let hello = read_hello(&mut server, HELLO_BUFFER_SIZE, None).await.unwrap();
        assert!(hello.len() <= HELLO_BUFFER_SIZE);
    }

    #[tokio::test]
    async fn test_read_hello_eof() {
        let (client, mut server) = tokio::io::duplex(64);
        drop(client);

        let err = read_hello(&mut server, HELLO_BUFFER_SIZE, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[tokio::test]
    async fn test_read_hello_timeout() {
        let (_client, mut server) = tokio::io::duplex(64);

        let err = read_hello(
            &mut server,
            HELLO_BUFFER_SIZE,
            Some(Duration::from_millis(20)),
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }
}
