//! HTTP upgrade handshake per RFC 6455 Section 4.
//!
//! Pure computations (accept key, request/response text, header parsing)
//! plus the bounded header read shared by both sides of the upgrade.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use sha1::{Digest, Sha1};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{Error, Result};

/// Magic GUID appended to the client key before hashing (RFC 6455 Section 1.3).
pub const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// WebSocket protocol version this crate speaks.
pub const WS_VERSION: u16 = 13;

/// Compute the `Sec-WebSocket-Accept` value for a client key.
///
/// `base64(SHA1(key + GUID))`.
#[must_use]
pub fn compute_accept_key(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(WS_GUID.as_bytes());
    BASE64.encode(hasher.finalize())
}

/// Generate a fresh `Sec-WebSocket-Key`: base64 of 16 random bytes.
#[must_use]
pub fn generate_key() -> String {
    BASE64.encode(random_key_bytes())
}

/// 16 bytes of OS entropy, or clock-derived bytes if the OS source fails.
fn random_key_bytes() -> [u8; 16] {
    let mut bytes = [0u8; 16];
    if getrandom::getrandom(&mut bytes).is_err() {
        let nanos: u128 = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0x5EED_5EED_5EED_5EED);
        bytes = nanos.to_be_bytes();
    }
    bytes
}

/// Read an HTTP header block: everything up to the first `\r\n\r\n`.
///
/// Bounded at `max_size` bytes ([`Error::HeaderTooLarge`] beyond that); EOF
/// before the terminator is [`Error::UnexpectedEof`].
pub async fn read_http_header<R>(stream: &mut R, max_size: usize) -> Result<String>
where
    R: AsyncRead + Unpin,
{
    let mut header = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let read = stream.read(&mut chunk).await?;
        if read == 0 {
            return Err(Error::UnexpectedEof { wanted: 4 });
        }
        header.extend_from_slice(&chunk[..read]);
        if header.windows(4).any(|w| w == b"\r\n\r\n") {
            return Ok(String::from_utf8_lossy(&header).into_owned());
        }
        if header.len() > max_size {
            return Err(Error::HeaderTooLarge { max: max_size });
        }
    }
}

/// Build the client's GET upgrade request (without the trailing blank line).
#[must_use]
pub fn build_client_request(host: &str, path: &str, key: &str) -> String {
    format!(
        "GET {path} HTTP/1.1\r\n\
         Host: {host}\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Key: {key}\r\n\
         Sec-WebSocket-Version: {WS_VERSION}"
    )
}

/// Check the server's response against the key we sent.
///
/// # Errors
///
/// [`Error::InvalidHandshake`] when the response carries no
/// `Sec-WebSocket-Accept` header, [`Error::AcceptMismatch`] when the value
/// disagrees with the one computed from our key.
pub fn validate_response(header: &str, key: &str) -> Result<()> {
    let headers = parse_headers(header);
    let actual = headers
        .get("sec-websocket-accept")
        .ok_or_else(|| Error::InvalidHandshake("missing Sec-WebSocket-Accept".into()))?;
    let expected = compute_accept_key(key);
    if *actual != expected {
        return Err(Error::AcceptMismatch {
            expected,
            actual: actual.clone(),
        });
    }
    Ok(())
}

/// The parts of a client upgrade request the server acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeRequest {
    /// Request path from the GET line.
    pub path: String,
    /// Client's `Sec-WebSocket-Key`.
    pub key: String,
    /// Requested `Sec-WebSocket-Version`.
    pub version: u16,
}

impl UpgradeRequest {
    /// Parse the raw request header.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidHandshake`] when the key or version header is
    /// missing or unparseable.
    pub fn parse(header: &str) -> Result<Self> {
        let request_line = header
            .lines()
            .next()
            .ok_or_else(|| Error::InvalidHandshake("empty request".into()))?;
        let path = request_line
            .split_whitespace()
            .nth(1)
            .unwrap_or("/")
            .to_string();

        let headers = parse_headers(header);
        let key = headers
            .get("sec-websocket-key")
            .ok_or_else(|| Error::InvalidHandshake("missing Sec-WebSocket-Key".into()))?
            .clone();
        let version = headers
            .get("sec-websocket-version")
            .ok_or_else(|| Error::InvalidHandshake("missing Sec-WebSocket-Version".into()))?
            .parse::<u16>()
            .map_err(|_| Error::InvalidHandshake("unparseable Sec-WebSocket-Version".into()))?;

        Ok(Self { path, key, version })
    }

    /// The 101 response accepting this upgrade.
    #[must_use]
    pub fn accept_response(&self) -> String {
        format!(
            "HTTP/1.1 101 Switching Protocols\r\n\
             Connection: Upgrade\r\n\
             Upgrade: websocket\r\n\
             Sec-WebSocket-Accept: {}",
            compute_accept_key(&self.key)
        )
    }
}

/// The 426 response for clients speaking an older protocol version.
#[must_use]
pub fn upgrade_required_response() -> String {
    format!("HTTP/1.1 426 Upgrade Required\r\nSec-WebSocket-Version: {WS_VERSION}")
}

/// The 400 response for requests the handshake cannot make sense of.
#[must_use]
pub fn bad_request_response() -> String {
    "HTTP/1.1 400 Bad Request".to_string()
}

/// Lowercased header-name map from a raw HTTP header block.
pub(crate) fn parse_headers(header: &str) -> std::collections::HashMap<String, String> {
    header
        .lines()
        .skip(1)
        .take_while(|line| !line.is_empty())
        .filter_map(|line| {
            let (name, value) = line.split_once(':')?;
            Some((name.trim().to_ascii_lowercase(), value.trim().to_string()))
        })
        .collect()
}
