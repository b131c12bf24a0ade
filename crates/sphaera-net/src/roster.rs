//! Roster of connected players and fire-and-forget fan-out to them.
//!
//! A peer whose connection reports shut down during a broadcast is pruned,
//! and the remaining peers are told it left.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use sphaera_voxel::PlayerState;

use crate::messages::{ClientProtocol, ClientRequest};
use crate::mux::{RpcError, RpcClient};
use crate::tcp_server::ConnectionId;

/// The server's calling half of one client connection.
pub type ClientLink = Arc<RpcClient<ClientProtocol>>;

struct Peer {
    state: PlayerState,
    link: ClientLink,
}

/// Connected players keyed by connection.
#[derive(Default)]
pub struct PeerRoster {
    peers: RwLock<HashMap<ConnectionId, Peer>>,
}

impl PeerRoster {
    /// Create an empty roster.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a peer that finished its handshake.
    pub fn register(&self, id: ConnectionId, state: PlayerState, link: ClientLink) {
        self.peers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Peer { state, link });
    }

    /// Remove a peer, returning its last known state.
    pub fn remove(&self, id: ConnectionId) -> Option<PlayerState> {
        self.peers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
            .map(|peer| peer.state)
    }

    /// Replace a peer's avatar state. Returns `false` for unknown peers.
    pub fn update_state(&self, id: ConnectionId, state: PlayerState) -> bool {
        match self
            .peers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(&id)
        {
            Some(peer) => {
                peer.state = state;
                true
            }
            None => false,
        }
    }

    /// A peer's last known state.
    pub fn state(&self, id: ConnectionId) -> Option<PlayerState> {
        self.peers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .map(|peer| peer.state.clone())
    }

    /// Snapshot of every peer's state.
    pub fn states(&self) -> Vec<PlayerState> {
        self.peers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|peer| peer.state.clone())
            .collect()
    }

    /// Number of registered peers.
    pub fn len(&self) -> usize {
        self.peers.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether no peers are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Send `request` to every peer except `except`.
    ///
    /// Peers whose connection is shut down are removed and announced to
    /// the rest with [`ClientRequest::PersonDisconnected`]. Returns the
    /// states of the removed peers.
    pub fn broadcast(
        &self,
        request: ClientRequest,
        except: Option<ConnectionId>,
    ) -> Vec<PlayerState> {
        let mut pruned = Vec::new();
        let mut queue = vec![(request, except)];

        while let Some((request, except)) = queue.pop() {
            let targets: Vec<(ConnectionId, ClientLink)> = self
                .peers
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .iter()
                .filter(|(id, _)| Some(**id) != except)
                .map(|(id, peer)| (*id, Arc::clone(&peer.link)))
                .collect();

            for (id, link) in targets {
                match link.notify(request.clone()) {
                    Ok(()) => {}
                    Err(RpcError::Shutdown) => {
                        let Some(state) = self.remove(id) else {
                            continue;
                        };
                        tracing::info!("Pruning {id:?} ({}): connection is shut down", state.name);
                        queue.push((ClientRequest::PersonDisconnected(state.name.clone()), None));
                        pruned.push(state);
                    }
                    Err(e) => tracing::warn!("Failed to notify {id:?}: {e}"),
                }
            }
        }

        pruned
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use tokio::io::duplex;

    use super::*;
    use crate::messages::{ClientResponse, ServerProtocol, ServerRequest, ServerResponse};
    use crate::mux::{MuxConfig, spawn_connection};
    use crate::service::Handler;

    #[derive(Default)]
    struct Inbox {
        received: Mutex<Vec<ClientRequest>>,
    }

    impl Handler<ClientProtocol> for Inbox {
        fn handle(&self, request: ClientRequest) -> ClientResponse {
            self.received.lock().unwrap().push(request);
            ClientResponse::Ack
        }
    }

    struct NoServer;

    impl Handler<ServerProtocol> for NoServer {
        fn handle(&self, _request: ServerRequest) -> ServerResponse {
            ServerResponse::Ack
        }
    }

    /// A server-side link to an in-memory client, plus that client's inbox
    /// and its own calling half for shutting it down.
    fn peer() -> (
        ClientLink,
        Arc<Inbox>,
        RpcClient<ServerProtocol>,
    ) {
        let (server_io, client_io) = duplex(64 * 1024);
        let inbox = Arc::new(Inbox::default());
        let link = spawn_connection::<_, ServerProtocol, ClientProtocol>(
            server_io,
            Arc::new(NoServer),
            MuxConfig::default(),
        );
        let client = spawn_connection::<_, ClientProtocol, ServerProtocol>(
            client_io,
            inbox.clone(),
            MuxConfig::default(),
        );
        (Arc::new(link), inbox, client)
    }

    async fn settle(inbox: &Inbox, count: usize) -> Vec<ClientRequest> {
        for _ in 0..200 {
            let received = inbox.received.lock().unwrap().clone();
            if received.len() >= count {
                return received;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        inbox.received.lock().unwrap().clone()
    }

    #[tokio::test]
    async fn test_broadcast_skips_origin() {
        let roster = PeerRoster::new();
        let (link_a, inbox_a, _client_a) = peer();
        let (link_b, inbox_b, _client_b) = peer();
        roster.register(ConnectionId(1), PlayerState::named("a"), link_a);
        roster.register(ConnectionId(2), PlayerState::named("b"), link_b);

        let pruned = roster.broadcast(ClientRequest::SendText("hi".into()), Some(ConnectionId(1)));
        assert!(pruned.is_empty());

        assert_eq!(
            settle(&inbox_b, 1).await,
            vec![ClientRequest::SendText("hi".into())]
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(inbox_a.received.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_shut_down_peer_is_pruned_and_announced() {
        let roster = PeerRoster::new();
        let (link_a, inbox_a, _client_a) = peer();
        let (link_b, _inbox_b, client_b) = peer();
        roster.register(ConnectionId(1), PlayerState::named("a"), link_a);
        roster.register(ConnectionId(2), PlayerState::named("b"), link_b.clone());

        client_b.close();
        link_b.closed().await;

        let pruned = roster.broadcast(ClientRequest::SendText("hi".into()), None);
        assert_eq!(pruned, vec![PlayerState::named("b")]);
        assert_eq!(roster.len(), 1);

        let received = settle(&inbox_a, 2).await;
        assert!(received.contains(&ClientRequest::SendText("hi".into())));
        assert!(received.contains(&ClientRequest::PersonDisconnected("b".into())));
    }

    #[tokio::test]
    async fn test_state_updates() {
        let roster = PeerRoster::new();
        let (link, _inbox, _client) = peer();
        roster.register(ConnectionId(9), PlayerState::named("ada"), link);

        let mut moved = PlayerState::named("ada");
        moved.position = [1.0, 2.0, 3.0];
        assert!(roster.update_state(ConnectionId(9), moved.clone()));
        assert!(!roster.update_state(ConnectionId(10), moved.clone()));
        assert_eq!(roster.state(ConnectionId(9)), Some(moved.clone()));
        assert_eq!(roster.states(), vec![moved.clone()]);

        assert_eq!(roster.remove(ConnectionId(9)), Some(moved));
        assert!(roster.is_empty());
    }
}
