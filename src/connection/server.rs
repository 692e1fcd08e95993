//! Server-side handshake adapter.

use async_trait::async_trait;
use tracing::debug;

use crate::connection::protocol::ConnectionProtocol;
use crate::connection::websocket::WebSocket;
use crate::error::{Error, Result};
use crate::message::CloseInfo;
use crate::protocol::handshake::{self, UpgradeRequest};

/// Wraps an application protocol and answers the client's upgrade request
/// before handing over.
///
/// The raw request header arrives from the server shell, which already read
/// it to classify the connection.
pub struct ServerProtocol {
    header: String,
    inner: Box<dyn ConnectionProtocol>,
}

impl ServerProtocol {
    pub fn new(header: impl Into<String>, inner: Box<dyn ConnectionProtocol>) -> Self {
        Self {
            header: header.into(),
            inner,
        }
    }

    /// Work out what to answer: 101 on success, 426 for old protocol
    /// versions, 400 for anything else.
    fn upgrade_outcome(&self) -> (String, Result<()>) {
        let request = match UpgradeRequest::parse(&self.header) {
            Ok(request) => request,
            Err(err) => return (handshake::bad_request_response(), Err(err)),
        };
        if request.version < handshake::WS_VERSION {
            return (
                handshake::upgrade_required_response(),
                Err(Error::UnsupportedVersion(request.version)),
            );
        }
        (request.accept_response(), Ok(()))
    }
}

#[async_trait]
impl ConnectionProtocol for ServerProtocol {
    async fn on_connection_started(&self, ws: &WebSocket) -> Result<()> {
        let (response, outcome) = self.upgrade_outcome();
        ws.write_header(&response).await?;
        match &outcome {
            Ok(()) => debug!("upgrade accepted"),
            Err(err) => debug!(error = %err, "upgrade refused"),
        }
        outcome?;
        self.inner.on_connection_started(ws).await
    }

    async fn on_connection_closed(&self, ws: &WebSocket, close: &CloseInfo) {
        self.inner.on_connection_closed(ws, close).await;
    }

    async fn process(&self, ws: &WebSocket) -> Result<()> {
        self.inner.process(ws).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Idle;

    #[async_trait]
    impl ConnectionProtocol for Idle {
        async fn process(&self, _ws: &WebSocket) -> Result<()> {
            Ok(())
        }
    }

    fn request_with_version(version: &str) -> String {
        format!(
            "GET /chat HTTP/1.1\r\n\
             Host: localhost\r\n\
             Upgrade: websocket\r\n\
             Connection: Upgrade\r\n\
             Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
             Sec-WebSocket-Version: {version}\r\n\r\n"
        )
    }

    #[test]
    fn test_current_version_gets_101() {
        let adapter = ServerProtocol::new(request_with_version("13"), Box::new(Idle));
        let (response, outcome) = adapter.upgrade_outcome();
        assert!(outcome.is_ok());
        assert!(response.starts_with("HTTP/1.1 101 Switching Protocols"));
        assert!(response.contains("Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo="));
    }

    #[test]
    fn test_old_version_gets_426() {
        let adapter = ServerProtocol::new(request_with_version("12"), Box::new(Idle));
        let (response, outcome) = adapter.upgrade_outcome();
        assert_eq!(outcome.unwrap_err(), Error::UnsupportedVersion(12));
        assert!(response.starts_with("HTTP/1.1 426 Upgrade Required"));
        assert!(response.contains("Sec-WebSocket-Version: 13"));
    }

    #[test]
    fn test_garbage_gets_400() {
        let adapter = ServerProtocol::new("GET / HTTP/1.1\r\n\r\n", Box::new(Idle));
        let (response, outcome) = adapter.upgrade_outcome();
        assert!(outcome.is_err());
        assert_eq!(response, "HTTP/1.1 400 Bad Request");
    }
}
