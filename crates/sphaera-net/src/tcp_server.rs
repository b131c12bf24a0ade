//! TCP server: accepts client connections, runs the handshake, and hands
//! each connection to the [`ServerApi`].

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::{RwLock, watch};

use crate::messages::{ClientProtocol, ClientRequest, ClientResponse, ServerProtocol};
use crate::mux::{MuxConfig, spawn_connection};
use crate::roster::ClientLink;
use crate::service::{ServerApi, ServerDispatch};

/// Unique identifier for a TCP connection within a server session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

/// Atomic generator for monotonically increasing [`ConnectionId`]s.
pub struct IdGenerator {
    next: AtomicU64,
}

impl IdGenerator {
    /// Create a new generator starting at 1.
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Return the next unique [`ConnectionId`].
    pub fn next_id(&self) -> ConnectionId {
        ConnectionId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Error returned when the connection map is at capacity.
#[derive(Debug)]
pub struct ConnectionLimitReached;

/// Every open connection, handshaken or not, keyed by [`ConnectionId`].
pub struct ConnectionMap {
    inner: RwLock<HashMap<ConnectionId, ClientLink>>,
    max_connections: usize,
}

impl ConnectionMap {
    /// Create a new map with the given capacity limit.
    pub fn new(max_connections: usize) -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
            max_connections,
        }
    }

    /// Insert a connection. Returns `Err` if the map is at capacity.
    pub async fn insert(
        &self,
        id: ConnectionId,
        link: ClientLink,
    ) -> Result<(), ConnectionLimitReached> {
        let mut map = self.inner.write().await;
        if map.len() >= self.max_connections {
            return Err(ConnectionLimitReached);
        }
        map.insert(id, link);
        Ok(())
    }

    /// Remove a connection by ID.
    pub async fn remove(&self, id: &ConnectionId) -> Option<ClientLink> {
        self.inner.write().await.remove(id)
    }

    /// Return the number of open connections.
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Return whether the map is empty.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

/// Configuration for [`SyncServer`].
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to. Default: `0.0.0.0:7777`.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections. Default: 64.
    pub max_connections: usize,
    /// How long a new client may take to report its person state. Default: 10 s.
    pub handshake_timeout: Duration,
    /// Framing and compression settings.
    pub mux: MuxConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 7777)),
            max_connections: 64,
            handshake_timeout: Duration::from_secs(10),
            mux: MuxConfig::default(),
        }
    }
}

async fn until_shutdown(rx: &mut watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
}

/// TCP server that accepts clients and serves them through a [`ServerApi`].
pub struct SyncServer {
    config: ServerConfig,
    api: Arc<dyn ServerApi>,
    /// Open connection map (public for test inspection).
    pub connections: Arc<ConnectionMap>,
    id_gen: Arc<IdGenerator>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl SyncServer {
    /// Create a new server with the given configuration.
    pub fn new(config: ServerConfig, api: Arc<dyn ServerApi>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            connections: Arc::new(ConnectionMap::new(config.max_connections)),
            id_gen: Arc::new(IdGenerator::new()),
            config,
            api,
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Bind to the configured address and run the accept loop.
    pub async fn run(&self) -> std::io::Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!("Server listening on {}", self.config.bind_addr);
        self.run_with_listener(listener).await
    }

    /// Run the accept loop with a pre-bound listener (useful for tests).
    pub async fn run_with_listener(&self, listener: TcpListener) -> std::io::Result<()> {
        let mut shutdown_rx = self.shutdown_rx.clone();

        loop {
            let (stream, peer_addr) = tokio::select! {
                result = listener.accept() => result?,
                () = until_shutdown(&mut shutdown_rx) => {
                    tracing::info!("Server shutting down");
                    break;
                }
            };
            stream.set_nodelay(true)?;

            let id = self.id_gen.next_id();
            let link: ClientLink = Arc::new(spawn_connection::<_, ServerProtocol, ClientProtocol>(
                stream,
                Arc::new(ServerDispatch::new(Arc::clone(&self.api), id)),
                self.config.mux.clone(),
            ));

            if self.connections.insert(id, Arc::clone(&link)).await.is_err() {
                tracing::warn!("Connection limit reached, rejecting {peer_addr}");
                link.close();
                continue;
            }

            tracing::info!("Accepted connection {id:?} from {peer_addr}");

            tokio::spawn(Self::handle_connection(
                id,
                link,
                Arc::clone(&self.api),
                Arc::clone(&self.connections),
                self.config.handshake_timeout,
                self.shutdown_rx.clone(),
            ));
        }

        Ok(())
    }

    /// Signal the server and every open connection to shut down.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Handshake, then wait for the connection to end.
    async fn handle_connection(
        id: ConnectionId,
        link: ClientLink,
        api: Arc<dyn ServerApi>,
        connections: Arc<ConnectionMap>,
        handshake_timeout: Duration,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        let handshake =
            tokio::time::timeout(handshake_timeout, link.call(ClientRequest::GetPersonState)).await;

        match handshake {
            Ok(Ok(ClientResponse::PersonState(state))) => {
                tracing::info!("Connection {id:?} joined as '{}'", state.name);

                let joined = {
                    let api = Arc::clone(&api);
                    let link = Arc::clone(&link);
                    tokio::task::spawn_blocking(move || api.peer_connected(id, state, link))
                };
                if let Err(e) = joined.await {
                    tracing::error!("Registering {id:?} failed: {e}");
                    link.close();
                }

                tokio::select! {
                    () = link.closed() => {}
                    () = until_shutdown(&mut shutdown_rx) => link.close(),
                }

                let left = {
                    let api = Arc::clone(&api);
                    tokio::task::spawn_blocking(move || api.peer_disconnected(id))
                };
                if let Err(e) = left.await {
                    tracing::error!("Unregistering {id:?} failed: {e}");
                }
            }
            Ok(Ok(other)) => {
                tracing::warn!("Connection {id:?} answered the handshake with {other:?}");
                link.close();
            }
            Ok(Err(e)) => tracing::info!("Connection {id:?} lost during handshake: {e}"),
            Err(_) => {
                tracing::warn!("Connection {id:?} handshake timed out after {handshake_timeout:?}");
                link.close();
            }
        }

        connections.remove(&id).await;
        tracing::info!("Connection {id:?} closed");
    }
}

#[cfg(test)]
#[path = "tcp_tests.rs"]
mod tests;
