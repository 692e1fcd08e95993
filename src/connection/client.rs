//! Client-side handshake adapter and the TCP connector built on it.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tracing::debug;

use crate::config::Config;
use crate::connection::protocol::ConnectionProtocol;
use crate::connection::role::Role;
use crate::connection::websocket::WebSocket;
use crate::error::Result;
use crate::message::{CloseCode, CloseInfo};
use crate::protocol::handshake;

/// Wraps an application protocol and splices the client handshake in front
/// of it.
pub struct ClientProtocol {
    host: String,
    path: String,
    inner: Box<dyn ConnectionProtocol>,
}

impl ClientProtocol {
    /// `host` goes into the `Host` header, `path` into the GET line.
    pub fn new(
        host: impl Into<String>,
        path: impl Into<String>,
        inner: Box<dyn ConnectionProtocol>,
    ) -> Self {
        Self {
            host: host.into(),
            path: path.into(),
            inner,
        }
    }
}

#[async_trait]
impl ConnectionProtocol for ClientProtocol {
    async fn on_connection_started(&self, ws: &WebSocket) -> Result<()> {
        let key = handshake::generate_key();
        ws.write_header(&handshake::build_client_request(&self.host, &self.path, &key))
            .await?;
        let response = ws.read_header().await?;
        handshake::validate_response(&response, &key)?;
        debug!(host = %self.host, path = %self.path, "upgrade accepted");
        self.inner.on_connection_started(ws).await
    }

    async fn on_connection_closed(&self, ws: &WebSocket, close: &CloseInfo) {
        self.inner.on_connection_closed(ws, close).await;
    }

    async fn process(&self, ws: &WebSocket) -> Result<()> {
        self.inner.process(ws).await
    }
}

/// A WebSocket client over TCP.
pub struct WebSocketClient {
    ws: Arc<WebSocket>,
}

impl WebSocketClient {
    /// Connect to `host:port` and prepare a controller for `path`.
    ///
    /// The handshake itself happens inside [`run`](Self::run).
    pub async fn connect(
        host: &str,
        port: u16,
        path: &str,
        protocol: Box<dyn ConnectionProtocol>,
        config: Config,
    ) -> Result<Self> {
        let stream = TcpStream::connect((host, port)).await?;
        stream.set_nodelay(config.nodelay)?;
        let adapter = ClientProtocol::new(format!("{host}:{port}"), path, protocol);
        let ws = Arc::new(WebSocket::new(stream, Role::Client, config, Box::new(adapter)));
        Ok(Self { ws })
    }

    /// The controller, for sending from other tasks.
    #[must_use]
    pub fn controller(&self) -> Arc<WebSocket> {
        Arc::clone(&self.ws)
    }

    /// Run handshake and protocol to completion.
    pub async fn run(&self) -> Result<()> {
        self.ws.run().await
    }

    /// Close the connection, announcing that this endpoint is going away.
    pub async fn close(&self) {
        self.ws.close_connection(CloseCode::GoingAway).await;
    }
}
