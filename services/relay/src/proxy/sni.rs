//! SNI (Server Name Indication) extraction from TLS ClientHello.
//!
//! The input is untrusted: every length field is checked against the bytes
//! actually present before it is followed, and any out-of-range reference
//! is a parse failure.

use super::sniff::{normalize_host, SniffResult};

/// TLS record content type for handshake messages.
const CONTENT_TYPE_HANDSHAKE: u8 = 0x16;

/// Handshake message type for ClientHello.
const HANDSHAKE_CLIENT_HELLO: u8 = 0x01;

/// Extension type carrying the server name list.
const EXTENSION_SERVER_NAME: u16 = 0x0000;

/// Server name type for DNS hostnames.
const NAME_TYPE_HOST_NAME: u8 = 0x00;

/// Shortest buffer worth parsing.
pub const MIN_CLIENT_HELLO_LEN: usize = 45;

/// Bounds-checked big-endian reader over a byte slice.
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        if n > self.remaining() {
            return None;
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Some(slice)
    }

    fn skip(&mut self, n: usize) -> Option<()> {
        self.take(n).map(|_| ())
    }

    fn u8(&mut self) -> Option<u8> {
        self.take(1).map(|b| b[0])
    }

    fn u16(&mut self) -> Option<u16> {
        self.take(2).map(|b| u16::from_be_bytes([b[0], b[1]]))
    }
}

/// Parse SNI from a TLS ClientHello buffer.
///
/// TLS record / ClientHello layout:
/// - record header: type (1, 0x16), version (2), length (2)
/// - handshake header: type (1, 0x01), length (3)
/// - client version (2), random (32)
/// - session ID: length (1) + bytes
/// - cipher suites: length (2) + bytes
/// - compression methods: length (1) + bytes
/// - extensions: length (2), then { type (2), length (2), body }*
///
/// The extension block is walked over whatever part of it the buffer holds,
/// but each extension body that is followed must be complete.
pub fn parse_sni(data: &[u8]) -> SniffResult {
    if data.first().is_some_and(|b| *b != CONTENT_TYPE_HANDSHAKE) {
        return SniffResult::NotProtocol;
    }
    if data.len() < MIN_CLIENT_HELLO_LEN {
        return SniffResult::Incomplete;
    }

    let mut reader = Reader::new(data);
    match walk_client_hello(&mut reader) {
        Some(result) => result,
        None => SniffResult::Malformed,
    }
}

fn walk_client_hello(reader: &mut Reader<'_>) -> Option<SniffResult> {
    // Record header
    reader.skip(5)?;

    // Handshake header
    if reader.u8()? != HANDSHAKE_CLIENT_HELLO {
        return Some(SniffResult::NotProtocol);
    }
    reader.skip(3)?;

    // Client version + random
    reader.skip(2 + 32)?;

    let session_id_len = reader.u8()? as usize;
    reader.skip(session_id_len)?;

    let cipher_suites_len = reader.u16()? as usize;
    reader.skip(cipher_suites_len)?;

    let compression_len = reader.u8()? as usize;
    reader.skip(compression_len)?;

    // A ClientHello may end without an extension block.
    if reader.remaining() == 0 {
        return Some(SniffResult::NoHost);
    }

    let extensions_len = reader.u16()? as usize;
    let available = extensions_len.min(reader.remaining());
    let mut extensions = Reader::new(reader.take(available)?);

    while extensions.remaining() >= 4 {
        let ext_type = extensions.u16()?;
        let ext_len = extensions.u16()? as usize;
        let body = extensions.take(ext_len)?;

        if ext_type == EXTENSION_SERVER_NAME {
            return parse_server_name_list(body);
        }
    }

    Some(SniffResult::NoHost)
}

/// Parse the server_name extension body.
///
/// - 2 bytes: list length
/// - for each entry: name type (1), name length (2), name
///
/// The first non-empty host_name entry wins; other name types are skipped.
fn parse_server_name_list(body: &[u8]) -> Option<SniffResult> {
    let mut reader = Reader::new(body);
    let list_len = reader.u16()? as usize;
    let mut list = Reader::new(reader.take(list_len)?);

    while list.remaining() >= 3 {
        let name_type = list.u8()?;
        let name_len = list.u16()? as usize;
        let name = list.take(name_len)?;

        if name_type != NAME_TYPE_HOST_NAME || name.is_empty() {
            continue;
        }

        let Ok(hostname) = std::str::from_utf8(name) else {
            return Some(SniffResult::Malformed);
        };
        let hostname = normalize_host(hostname);
        if hostname.is_empty() {
            return Some(SniffResult::NoHost);
        }
        return Some(SniffResult::Found(hostname));
    }

    Some(SniffResult::NoHost)
}
