//! Hook for wrapping accepted sockets before any bytes are read.

use async_trait::async_trait;
use tokio::net::TcpStream;

use crate::error::Result;
use crate::server::details::BoxStream;

/// Turns an accepted TCP socket into the stream the connection will use.
///
/// Implementations can run a TLS accept here; this crate ships only the
/// pass-through. An error drops the connection before classification.
#[async_trait]
pub trait StreamSecurity: Send + Sync {
    async fn secure(&self, stream: TcpStream) -> Result<BoxStream>;
}

/// Pass-through: the connection speaks plain TCP.
pub struct NoTls;

#[async_trait]
impl StreamSecurity for NoTls {
    async fn secure(&self, stream: TcpStream) -> Result<BoxStream> {
        Ok(Box::new(stream))
    }
}
