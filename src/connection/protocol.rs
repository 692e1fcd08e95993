//! Application-facing connection protocol hooks.

use async_trait::async_trait;

use crate::connection::WebSocket;
use crate::error::Result;
use crate::message::CloseInfo;

/// Hooks a connection controller drives over a connection's lifetime.
///
/// Implementations hold the application's per-connection logic. The
/// client/server handshake adapters wrap an inner protocol and splice the
/// upgrade exchange into `on_connection_started`, so application protocols
/// never deal with HTTP.
#[async_trait]
pub trait ConnectionProtocol: Send + Sync {
    /// Called once before the connection opens.
    ///
    /// An error here aborts the connection before any application traffic.
    async fn on_connection_started(&self, ws: &WebSocket) -> Result<()> {
        let _ = ws;
        Ok(())
    }

    /// Called exactly once when the connection closes.
    async fn on_connection_closed(&self, ws: &WebSocket, close: &CloseInfo) {
        let _ = (ws, close);
    }

    /// The connection's main loop. Runs after the handshake; the
    /// connection winds down when this returns.
    async fn process(&self, ws: &WebSocket) -> Result<()>;
}
