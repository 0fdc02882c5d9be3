//! Destination extraction from an HTTP request head.
//!
//! No request-line or version validation is done: any bytes holding a
//! CRLF-separated header block terminated by an empty line and carrying a
//! `Host` header are accepted.

use std::collections::HashMap;

use hostrelay_networking::split_host_port;

use super::sniff::{normalize_host, SniffResult};

const HEADER_END: &[u8] = b"\r\n\r\n";

/// Parse the `Host` header out of a request head.
///
/// Header names are matched case-insensitively; on duplicates the last
/// value wins. A `host:port` value yields only the host.
pub fn parse_host(data: &[u8]) -> SniffResult {
    let Some(end) = data
        .windows(HEADER_END.len())
        .position(|window| window == HEADER_END)
    else {
        return SniffResult::Incomplete;
    };

    let head = String::from_utf8_lossy(&data[..end]);
    let mut headers: HashMap<String, &str> = HashMap::new();

    // The first line is the request line.
    for line in head.split("\r\n").skip(1) {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        headers.insert(name.trim().to_ascii_uppercase(), value.trim());
    }

    let Some(value) = headers.get("HOST") else {
        return SniffResult::NoHost;
    };

    let (host, _port) = split_host_port(value);
    let host = normalize_host(host);
    if host.is_empty() {
        return SniffResult::NoHost;
    }

    SniffResult::Found(host)
}
