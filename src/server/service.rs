//! Per-connection services and the factory that makes them.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::config::Config;
use crate::connection::protocol::ConnectionProtocol;
use crate::connection::role::Role;
use crate::connection::server::ServerProtocol;
use crate::connection::websocket::WebSocket;
use crate::error::Result;
use crate::message::CloseCode;
use crate::server::details::{BoxStream, ConnectionDetails, ConnectionKind};

/// One accepted connection's worth of work.
#[async_trait]
pub trait Service: Send + Sync {
    /// Handle the connection. Runs for the connection's lifetime.
    async fn respond(&self) -> Result<()>;

    /// Release the connection's resources. Safe to call while
    /// [`respond`](Self::respond) is still running on another task.
    async fn dispose(&self);
}

/// Picks a service for each classified connection.
pub trait ServiceFactory: Send + Sync {
    fn create(&self, details: ConnectionDetails) -> Arc<dyn Service>;
}

/// Serves a WebSocket connection: handshake, application protocol, close.
pub struct WebSocketService {
    ws: Arc<WebSocket>,
}

impl WebSocketService {
    /// Wire a controller to the connection with the server handshake
    /// adapter in front of the application protocol.
    pub fn new(
        details: ConnectionDetails,
        protocol: Box<dyn ConnectionProtocol>,
        config: Config,
    ) -> Self {
        let adapter = ServerProtocol::new(details.header, protocol);
        let ws = WebSocket::new(details.stream, Role::Server, config, Box::new(adapter));
        Self { ws: Arc::new(ws) }
    }

    /// The connection's controller.
    #[must_use]
    pub fn controller(&self) -> Arc<WebSocket> {
        Arc::clone(&self.ws)
    }
}

#[async_trait]
impl Service for WebSocketService {
    async fn respond(&self) -> Result<()> {
        self.ws.run().await
    }

    async fn dispose(&self) {
        self.ws.close_connection(CloseCode::GoingAway).await;
    }
}

/// Answers non-WebSocket connections with a fixed HTTP response and hangs
/// up.
pub struct RejectService {
    response: String,
    stream: Mutex<Option<BoxStream>>,
}

impl RejectService {
    pub fn new(response: impl Into<String>, stream: BoxStream) -> Self {
        Self {
            response: response.into(),
            stream: Mutex::new(Some(stream)),
        }
    }
}

#[async_trait]
impl Service for RejectService {
    async fn respond(&self) -> Result<()> {
        let Some(mut stream) = self.stream.lock().await.take() else {
            return Ok(());
        };
        debug!(response = %self.response, "rejecting connection");
        stream
            .write_all(format!("{}\r\n\r\n", self.response.trim_end()).as_bytes())
            .await?;
        stream.flush().await?;
        if let Err(err) = stream.shutdown().await {
            warn!(error = %err, "shutdown after reject failed");
        }
        Ok(())
    }

    async fn dispose(&self) {
        self.stream.lock().await.take();
    }
}

/// Maps connection paths to application protocols.
///
/// Returning `None` rejects the connection.
pub type ProtocolProvider =
    dyn Fn(&ConnectionDetails) -> Option<Box<dyn ConnectionProtocol>> + Send + Sync;

/// Default dispatch: WebSocket upgrades go to the protocol provider, plain
/// HTTP gets told this server only speaks WebSocket, anything else is a bad
/// request.
pub struct DefaultServiceFactory {
    provider: Box<ProtocolProvider>,
    config: Config,
}

impl DefaultServiceFactory {
    pub fn new(provider: Box<ProtocolProvider>, config: Config) -> Self {
        Self { provider, config }
    }
}

impl ServiceFactory for DefaultServiceFactory {
    fn create(&self, details: ConnectionDetails) -> Arc<dyn Service> {
        match details.kind {
            ConnectionKind::WebSocket => match (self.provider)(&details) {
                Some(protocol) => Arc::new(WebSocketService::new(
                    details,
                    protocol,
                    self.config.clone(),
                )),
                None => Arc::new(RejectService::new(
                    "HTTP/1.1 404 Not Found",
                    details.stream,
                )),
            },
            ConnectionKind::Http => Arc::new(RejectService::new(
                "HTTP/1.1 501 Not Implemented",
                details.stream,
            )),
            ConnectionKind::Unknown => Arc::new(RejectService::new(
                "HTTP/1.1 400 Bad Request",
                details.stream,
            )),
        }
    }
}
