//! TCP client for connecting to a Sphaera world server.
//!
//! The connection state is broadcast via a [`watch`] channel so any number
//! of consumers can react to the link going away without polling.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpStream;
use tokio::sync::watch;

use crate::messages::{ClientProtocol, ServerProtocol};
use crate::mux::{MuxConfig, RpcClient, spawn_connection};
use crate::service::{ClientApi, ClientDispatch};

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Attempting to establish a TCP connection.
    Connecting,
    /// TCP connection established, ready for communication.
    Connected,
    /// Connection lost or intentionally closed.
    Disconnected,
}

/// Observable connection state backed by a [`watch`] channel.
pub struct ConnectionStateWatch {
    tx: watch::Sender<ConnectionState>,
    rx: watch::Receiver<ConnectionState>,
}

impl Default for ConnectionStateWatch {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionStateWatch {
    /// Create a new watch initialized to [`ConnectionState::Disconnected`].
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(ConnectionState::Disconnected);
        Self { tx, rx }
    }

    /// Set the current connection state, notifying all subscribers.
    pub fn set(&self, state: ConnectionState) {
        let _ = self.tx.send(state);
    }

    /// Return a new subscriber receiver.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.rx.clone()
    }

    /// Return the current state without blocking.
    pub fn current(&self) -> ConnectionState {
        *self.rx.borrow()
    }
}

/// The client's calling half of its server connection.
pub type ServerLink = Arc<RpcClient<ServerProtocol>>;

/// Handle to a connected world server.
///
/// Requests from the server are routed to the [`ClientApi`] given at
/// connect time; calls to the server go through [`SyncClient::link`].
pub struct SyncClient {
    link: ServerLink,
    state: Arc<ConnectionStateWatch>,
    peer_addr: SocketAddr,
}

impl SyncClient {
    /// Connect to the server at `addr` and start serving `api`.
    ///
    /// Sets `TCP_NODELAY` and returns right after the TCP handshake. The
    /// server's first call is [`ClientApi::get_person_state`].
    pub async fn connect(
        addr: SocketAddr,
        api: Arc<dyn ClientApi>,
        config: MuxConfig,
    ) -> std::io::Result<Self> {
        let state = Arc::new(ConnectionStateWatch::new());
        state.set(ConnectionState::Connecting);

        let stream = match TcpStream::connect(addr).await {
            Ok(stream) => stream,
            Err(e) => {
                state.set(ConnectionState::Disconnected);
                return Err(e);
            }
        };
        stream.set_nodelay(true)?;

        let link: ServerLink = Arc::new(spawn_connection::<_, ClientProtocol, ServerProtocol>(
            stream,
            Arc::new(ClientDispatch::new(api)),
            config,
        ));
        state.set(ConnectionState::Connected);
        tracing::info!("Connected to {addr}");

        let watch_link = Arc::clone(&link);
        let watch_state = Arc::clone(&state);
        tokio::spawn(async move {
            watch_link.closed().await;
            watch_state.set(ConnectionState::Disconnected);
            tracing::info!("Disconnected from {addr}");
        });

        Ok(Self {
            link,
            state,
            peer_addr: addr,
        })
    }

    /// The calling half of the connection.
    pub fn link(&self) -> &ServerLink {
        &self.link
    }

    /// Return the connection state watch.
    pub fn state(&self) -> &Arc<ConnectionStateWatch> {
        &self.state
    }

    /// Address of the server.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Disconnect from the server.
    ///
    /// Transitions to [`ConnectionState::Disconnected`] immediately;
    /// outstanding calls fail with shut down.
    pub fn disconnect(&self) {
        self.link.close();
        self.state.set(ConnectionState::Disconnected);
    }
}
