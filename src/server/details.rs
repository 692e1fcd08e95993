//! What the server shell learns about a connection before handing it to a
//! service.

use std::net::SocketAddr;

use tokio::io::{AsyncRead, AsyncWrite};

use crate::protocol::handshake::parse_headers;

/// Stream object trait for connections handed to services.
///
/// Anything readable and writable qualifies; [`StreamSecurity`] hooks
/// return TLS-wrapped streams behind the same type.
///
/// [`StreamSecurity`]: crate::server::StreamSecurity
pub trait AsyncStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T> AsyncStream for T where T: AsyncRead + AsyncWrite + Send + Unpin {}

/// Boxed connection stream.
pub type BoxStream = Box<dyn AsyncStream>;

/// What kind of request opened the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionKind {
    /// A GET request asking for a WebSocket upgrade.
    WebSocket,
    /// A plain HTTP GET request.
    Http,
    /// Anything that is not an HTTP GET.
    Unknown,
}

/// Everything known about an accepted connection at dispatch time.
pub struct ConnectionDetails {
    /// The connection's stream, ownership included.
    pub stream: BoxStream,
    /// Peer address.
    pub peer: SocketAddr,
    /// Request path, empty for [`ConnectionKind::Unknown`].
    pub path: String,
    /// The raw request header block.
    pub header: String,
    /// Classification of the request.
    pub kind: ConnectionKind,
}

impl std::fmt::Debug for ConnectionDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionDetails")
            .field("peer", &self.peer)
            .field("path", &self.path)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Classify a request header block, extracting the path.
#[must_use]
pub fn classify(header: &str) -> (ConnectionKind, String) {
    let request_line = header.lines().next().unwrap_or("");
    let mut parts = request_line.split_whitespace();
    let is_get = parts.next() == Some("GET");
    let path = parts.next().unwrap_or("");
    let is_http = parts.next().is_some_and(|v| v.starts_with("HTTP/1."));
    if !is_get || !is_http {
        return (ConnectionKind::Unknown, String::new());
    }

    let headers = parse_headers(header);
    let wants_upgrade = headers
        .get("upgrade")
        .is_some_and(|v| v.eq_ignore_ascii_case("websocket"));
    let kind = if wants_upgrade {
        ConnectionKind::WebSocket
    } else {
        ConnectionKind::Http
    };
    (kind, path.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_websocket_upgrade() {
        let header = "GET /chat HTTP/1.1\r\n\
                      Host: localhost\r\n\
                      Upgrade: websocket\r\n\
                      Connection: Upgrade\r\n\r\n";
        assert_eq!(
            classify(header),
            (ConnectionKind::WebSocket, "/chat".to_string())
        );
    }

    #[test]
    fn test_classify_upgrade_header_case_insensitive() {
        let header = "GET / HTTP/1.1\r\nUpgrade: WebSocket\r\n\r\n";
        assert_eq!(classify(header).0, ConnectionKind::WebSocket);
    }

    #[test]
    fn test_classify_plain_http() {
        let header = "GET /index.html HTTP/1.1\r\nHost: localhost\r\n\r\n";
        assert_eq!(
            classify(header),
            (ConnectionKind::Http, "/index.html".to_string())
        );
    }

    #[test]
    fn test_classify_non_get_is_unknown() {
        let header = "POST /submit HTTP/1.1\r\nHost: localhost\r\n\r\n";
        assert_eq!(classify(header), (ConnectionKind::Unknown, String::new()));
    }

    #[test]
    fn test_classify_garbage_is_unknown() {
        assert_eq!(classify("\x16\x03\x01junk"), (ConnectionKind::Unknown, String::new()));
    }
}
