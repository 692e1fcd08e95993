//! The connection server shell: accept loop, classification, and service
//! dispatch.

pub mod details;
pub mod listener;
pub mod security;
pub mod service;

pub use details::{AsyncStream, BoxStream, ConnectionDetails, ConnectionKind, classify};
pub use listener::WebSocketServer;
pub use security::{NoTls, StreamSecurity};
pub use service::{
    DefaultServiceFactory, ProtocolProvider, RejectService, Service, ServiceFactory,
    WebSocketService,
};
