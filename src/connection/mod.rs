//! Connection controller, lifecycle state, and the handshake adapters.

pub mod client;
pub mod protocol;
pub mod role;
pub mod server;
pub mod state;
pub mod websocket;

pub use client::{ClientProtocol, WebSocketClient};
pub use protocol::ConnectionProtocol;
pub use role::Role;
pub use server::ServerProtocol;
pub use state::ConnectionState;
pub use websocket::WebSocket;
