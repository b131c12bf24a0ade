use std::sync::Mutex;

use sphaera_coords::ChunkIndex;
use sphaera_voxel::{ChunkData, PlanetGeometry, PlanetId, PlanetState, PlayerState};
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;

use super::*;
use crate::messages::{CellUpdate, Hit, ServerRequest, ServerResponse};
use crate::service::ClientApi;
use crate::tcp_client::{ConnectionState, SyncClient};

#[derive(Default)]
struct TestWorld {
    joined: Mutex<Vec<(ConnectionId, String)>>,
    left: Mutex<Vec<ConnectionId>>,
}

impl ServerApi for TestWorld {
    fn get_planet_states(&self) -> Vec<PlanetState> {
        vec![PlanetState::default()]
    }

    fn get_chunk(&self, planet: PlanetId, _index: ChunkIndex) -> Result<ChunkData, String> {
        Err(format!("no planet {planet}"))
    }

    fn get_planet_geometry(&self, _planet: PlanetId) -> Result<PlanetGeometry, String> {
        Ok(PlanetGeometry::default())
    }

    fn set_cell_material(&self, _peer: ConnectionId, _update: CellUpdate) -> Result<bool, String> {
        Ok(true)
    }

    fn update_person_state(&self, _peer: ConnectionId, _state: PlayerState) {}

    fn send_text(&self, _peer: ConnectionId, _text: String) {}

    fn hit_player(&self, _peer: ConnectionId, _hit: Hit) {}

    fn peer_connected(&self, peer: ConnectionId, state: PlayerState, _link: ClientLink) {
        self.joined.lock().unwrap().push((peer, state.name));
    }

    fn peer_disconnected(&self, peer: ConnectionId) {
        self.left.lock().unwrap().push(peer);
    }
}

struct TestPlayer(&'static str);

impl ClientApi for TestPlayer {
    fn get_person_state(&self) -> PlayerState {
        PlayerState::named(self.0)
    }
    fn set_cell_material(&self, _update: CellUpdate) {}
    fn update_person_state(&self, _state: PlayerState) {}
    fn person_disconnected(&self, _name: String) {}
    fn send_text(&self, _text: String) {}
    fn hit_player(&self, _hit: Hit) {}
}

/// Helper: start a server on an ephemeral port and return the bound address.
async fn start_test_server(
    max_connections: usize,
) -> (SocketAddr, Arc<SyncServer>, Arc<TestWorld>) {
    let world = Arc::new(TestWorld::default());
    let config = ServerConfig {
        bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        max_connections,
        handshake_timeout: Duration::from_millis(500),
        ..ServerConfig::default()
    };
    let server = Arc::new(SyncServer::new(config, world.clone()));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let srv = Arc::clone(&server);
    tokio::spawn(async move {
        srv.run_with_listener(listener).await.unwrap();
    });
    tokio::time::sleep(Duration::from_millis(10)).await;
    (addr, server, world)
}

async fn connect(addr: SocketAddr, name: &'static str) -> SyncClient {
    SyncClient::connect(addr, Arc::new(TestPlayer(name)), MuxConfig::default())
        .await
        .unwrap()
}

async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    check()
}

#[tokio::test]
async fn test_handshake_registers_player() {
    let (addr, _server, world) = start_test_server(16).await;
    let client = connect(addr, "ada").await;
    assert_eq!(client.state().current(), ConnectionState::Connected);

    assert!(eventually(|| world.joined.lock().unwrap().len() == 1).await);
    let joined = world.joined.lock().unwrap().clone();
    assert_eq!(joined[0].1, "ada");
}

#[tokio::test]
async fn test_client_calls_reach_the_api() {
    let (addr, _server, _world) = start_test_server(16).await;
    let client = connect(addr, "ada").await;

    let reply = client.link().call(ServerRequest::GetPlanetStates).await.unwrap();
    assert_eq!(
        reply,
        ServerResponse::PlanetStates(vec![PlanetState::default()])
    );

    let reply = client
        .link()
        .call(ServerRequest::GetChunk {
            planet: PlanetId(4),
            index: ChunkIndex::new(0, 0, 0),
        })
        .await
        .unwrap();
    assert_eq!(reply, ServerResponse::Error("no planet 4".into()));
}

#[tokio::test]
async fn test_disconnect_unregisters_player() {
    let (addr, server, world) = start_test_server(16).await;
    let client = connect(addr, "ada").await;
    assert!(eventually(|| world.joined.lock().unwrap().len() == 1).await);

    client.disconnect();
    assert_eq!(client.state().current(), ConnectionState::Disconnected);

    assert!(eventually(|| world.left.lock().unwrap().len() == 1).await);
    let joined_id = world.joined.lock().unwrap()[0].0;
    assert_eq!(world.left.lock().unwrap()[0], joined_id);
    for _ in 0..200 {
        if server.connections.is_empty().await {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(server.connections.is_empty().await);
}

#[tokio::test]
async fn test_max_connections_enforced() {
    let max = 2;
    let (addr, server, _world) = start_test_server(max).await;

    let _c1 = connect(addr, "a").await;
    let _c2 = connect(addr, "b").await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(server.connections.len().await, 2);

    let c3 = connect(addr, "c").await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(server.connections.len().await <= max);
    assert!(eventually(|| c3.state().current() == ConnectionState::Disconnected).await);
}

#[tokio::test]
async fn test_silent_client_times_out() {
    let (addr, server, world) = start_test_server(16).await;

    // Raw socket that never answers the handshake.
    let mut stream = TcpStream::connect(addr).await.unwrap();
    tokio::time::sleep(Duration::from_millis(800)).await;

    let mut buf = Vec::new();
    let _ = stream.read_to_end(&mut buf).await;
    assert!(world.joined.lock().unwrap().is_empty());
    assert!(server.connections.is_empty().await);
}

#[tokio::test]
async fn test_graceful_shutdown_closes_connections() {
    let (addr, server, _world) = start_test_server(16).await;
    let client = connect(addr, "ada").await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    server.shutdown();
    assert!(eventually(|| client.state().current() == ConnectionState::Disconnected).await);
}

#[tokio::test]
async fn test_connect_to_closed_port_fails() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let result = SyncClient::connect(addr, Arc::new(TestPlayer("ada")), MuxConfig::default()).await;
    assert!(result.is_err());
}

#[test]
fn test_connection_id_uniqueness() {
    let id_gen = IdGenerator::new();
    let id1 = id_gen.next_id();
    let id2 = id_gen.next_id();
    let id3 = id_gen.next_id();
    assert_ne!(id1, id2);
    assert_ne!(id2, id3);
    assert_eq!(id1.0 + 1, id2.0);
    assert_eq!(id2.0 + 1, id3.0);
}
