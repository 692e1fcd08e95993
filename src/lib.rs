//! RFC 6455 WebSocket protocol engine with a small concurrent connection
//! server.
//!
//! The crate is layered bottom-up:
//!
//! - [`codec`]: exact-length reads and endian-aware integers.
//! - [`protocol`]: frames, masking, opcodes, and the HTTP upgrade
//!   computation.
//! - [`connection`]: the [`WebSocket`] controller driving one connection's
//!   state machine, plus client/server handshake adapters.
//! - [`server`]: a TCP accept loop that classifies connections and hands
//!   each to a pluggable [`Service`](server::Service) on its own task.
//!
//! Applications implement [`ConnectionProtocol`] and never touch sockets or
//! HTTP directly:
//!
//! ```no_run
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use websock::{Config, ConnectionProtocol, ReceivedMessage, Result, WebSocket};
//! use websock::server::{DefaultServiceFactory, WebSocketServer};
//!
//! struct Echo;
//!
//! #[async_trait]
//! impl ConnectionProtocol for Echo {
//!     async fn process(&self, ws: &WebSocket) -> Result<()> {
//!         loop {
//!             match ws.receive_or_null().await? {
//!                 Some(ReceivedMessage::Text { text, .. }) => ws.send_text(&text).await?,
//!                 Some(_) => {}
//!                 None if !ws.is_open() => return Ok(()),
//!                 None => {}
//!             }
//!         }
//!     }
//! }
//!
//! # async fn run() -> Result<()> {
//! let factory = DefaultServiceFactory::new(Box::new(|_| Some(Box::new(Echo))), Config::new());
//! let server = WebSocketServer::new(Arc::new(factory), Config::new());
//! let _addr = server.listen("127.0.0.1:9001").await?;
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod config;
pub mod connection;
pub mod error;
pub mod message;
pub mod protocol;
pub mod server;

pub use config::Config;
pub use connection::{
    ClientProtocol, ConnectionProtocol, ConnectionState, Role, ServerProtocol, WebSocket,
    WebSocketClient,
};
pub use error::{Error, Result};
pub use message::{CloseCode, CloseInfo, Continuation, ReceivedMessage};
pub use protocol::{Frame, FrameReader, FrameWriter, OpCode};
