//! The accept loop and live-connection tracking.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::protocol::handshake;
use crate::server::details::{self, ConnectionDetails};
use crate::server::security::{NoTls, StreamSecurity};
use crate::server::service::{Service, ServiceFactory};

/// A connection the server is currently tracking.
struct LiveConnection {
    /// Set once the worker has classified the connection and built its
    /// service.
    service: Option<Arc<dyn Service>>,
    abort: Option<AbortHandle>,
}

/// Accepts TCP connections and runs one service per connection on its own
/// task.
pub struct WebSocketServer {
    factory: Arc<dyn ServiceFactory>,
    security: Arc<dyn StreamSecurity>,
    config: Config,
    connections: Mutex<HashMap<u64, LiveConnection>>,
    next_id: AtomicU64,
    accept_task: std::sync::Mutex<Option<JoinHandle<()>>>,
    shutting_down: AtomicBool,
}

impl WebSocketServer {
    pub fn new(factory: Arc<dyn ServiceFactory>, config: Config) -> Arc<Self> {
        Self::with_security(factory, Arc::new(NoTls), config)
    }

    pub fn with_security(
        factory: Arc<dyn ServiceFactory>,
        security: Arc<dyn StreamSecurity>,
        config: Config,
    ) -> Arc<Self> {
        Arc::new(Self {
            factory,
            security,
            config,
            connections: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
            accept_task: std::sync::Mutex::new(None),
            shutting_down: AtomicBool::new(false),
        })
    }

    /// Bind `addr` and start accepting in the background.
    ///
    /// Returns the bound address, so `"127.0.0.1:0"` picks an ephemeral
    /// port the caller can discover.
    pub async fn listen(self: &Arc<Self>, addr: &str) -> Result<SocketAddr> {
        let listener = TcpListener::bind(addr).await?;
        let local = listener.local_addr()?;
        info!(%local, "listening");

        let server = Arc::clone(self);
        let task = tokio::spawn(async move { server.accept_loop(listener).await });
        if let Ok(mut slot) = self.accept_task.lock() {
            *slot = Some(task);
        }
        Ok(local)
    }

    async fn accept_loop(self: Arc<Self>, listener: TcpListener) {
        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(err) => {
                    if self.shutting_down.load(Ordering::SeqCst) {
                        return;
                    }
                    warn!(error = %err, "accept failed");
                    continue;
                }
            };

            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            // Register before spawning so the worker's removal always finds
            // an entry to remove.
            self.connections.lock().await.insert(
                id,
                LiveConnection {
                    service: None,
                    abort: None,
                },
            );
            let server = Arc::clone(&self);
            let handle =
                tokio::spawn(async move { server.handle_connection(id, stream, peer).await });
            if let Some(entry) = self.connections.lock().await.get_mut(&id) {
                entry.abort = Some(handle.abort_handle());
            }
        }
    }

    async fn handle_connection(self: Arc<Self>, id: u64, stream: TcpStream, peer: SocketAddr) {
        debug!(%peer, id, "connection opened");
        if let Err(err) = self.serve(id, stream, peer).await {
            warn!(%peer, id, error = %err, "connection ended with error");
        }
        self.connections.lock().await.remove(&id);
        debug!(%peer, id, "connection finished");
    }

    async fn serve(&self, id: u64, stream: TcpStream, peer: SocketAddr) -> Result<()> {
        stream.set_nodelay(self.config.nodelay)?;
        let mut stream = self.security.secure(stream).await?;

        let header =
            handshake::read_http_header(&mut stream, self.config.max_header_size).await?;
        let (kind, path) = details::classify(&header);
        debug!(%peer, ?kind, %path, "request classified");

        let service = self.factory.create(ConnectionDetails {
            stream,
            peer,
            path,
            header,
            kind,
        });
        if let Some(entry) = self.connections.lock().await.get_mut(&id) {
            entry.service = Some(Arc::clone(&service));
        }
        service.respond().await
    }

    /// Number of connections currently tracked.
    pub async fn connection_count(&self) -> usize {
        self.connections.lock().await.len()
    }

    /// Stop accepting and tear down every live connection.
    ///
    /// The live map is snapshotted and cleared in one step; each service is
    /// disposed and its worker aborted, so even a stuck handler goes away.
    pub async fn shutdown(&self) {
        if self.shutting_down.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Ok(mut slot) = self.accept_task.lock() {
            if let Some(task) = slot.take() {
                task.abort();
            }
        }

        let live: Vec<LiveConnection> = {
            let mut connections = self.connections.lock().await;
            connections.drain().map(|(_, conn)| conn).collect()
        };
        let count = live.len();
        for conn in live {
            if let Some(service) = conn.service {
                service.dispose().await;
            }
            if let Some(abort) = conn.abort {
                abort.abort();
            }
        }
        info!(connections = count, "server shut down");
    }
}
