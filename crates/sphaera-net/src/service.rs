//! Service traits for each call direction and the dispatchers that route
//! decoded requests onto them.
//!
//! Handlers are synchronous; the connection runs each one on the blocking
//! pool so they may block on storage or on calls over other links.

use std::sync::Arc;

use sphaera_coords::ChunkIndex;
use sphaera_voxel::{ChunkData, PlanetGeometry, PlanetId, PlanetState, PlayerState};

use crate::messages::{
    CellUpdate, ClientProtocol, ClientRequest, ClientResponse, Hit, Protocol, ServerProtocol,
    ServerRequest, ServerResponse,
};
use crate::roster::ClientLink;
use crate::tcp_server::ConnectionId;

/// Handles requests of protocol `P` arriving on one connection.
pub trait Handler<P: Protocol>: Send + Sync + 'static {
    /// Serve one request.
    fn handle(&self, request: P::Request) -> P::Response;
}

// ---------------------------------------------------------------------------
// Server side
// ---------------------------------------------------------------------------

/// Operations the server exposes to clients.
///
/// `peer` identifies the calling connection so fan-out can skip it.
pub trait ServerApi: Send + Sync + 'static {
    /// Every planet in the universe.
    fn get_planet_states(&self) -> Vec<PlanetState>;

    /// Contents of one chunk.
    fn get_chunk(&self, planet: PlanetId, index: ChunkIndex) -> Result<ChunkData, String>;

    /// Surface geometry of a planet.
    fn get_planet_geometry(&self, planet: PlanetId) -> Result<PlanetGeometry, String>;

    /// Edit a cell; returns whether it changed.
    fn set_cell_material(&self, peer: ConnectionId, update: CellUpdate) -> Result<bool, String>;

    /// Record a client's avatar state.
    fn update_person_state(&self, peer: ConnectionId, state: PlayerState);

    /// Chat line from a client.
    fn send_text(&self, peer: ConnectionId, text: String);

    /// A client hit another player.
    fn hit_player(&self, peer: ConnectionId, hit: Hit);

    /// A client finished the handshake and is ready for fan-out.
    fn peer_connected(&self, peer: ConnectionId, state: PlayerState, link: ClientLink);

    /// A client's connection closed.
    fn peer_disconnected(&self, peer: ConnectionId);
}

/// Routes [`ServerRequest`]s from one connection onto a [`ServerApi`].
pub struct ServerDispatch {
    api: Arc<dyn ServerApi>,
    peer: ConnectionId,
}

impl ServerDispatch {
    /// Dispatcher for the connection `peer`.
    pub fn new(api: Arc<dyn ServerApi>, peer: ConnectionId) -> Self {
        Self { api, peer }
    }
}

impl Handler<ServerProtocol> for ServerDispatch {
    fn handle(&self, request: ServerRequest) -> ServerResponse {
        match request {
            ServerRequest::GetPlanetStates => {
                ServerResponse::PlanetStates(self.api.get_planet_states())
            }
            ServerRequest::GetChunk { planet, index } => match self.api.get_chunk(planet, index) {
                Ok(data) => ServerResponse::Chunk(data),
                Err(e) => ServerResponse::Error(e),
            },
            ServerRequest::GetPlanetGeometry { planet } => {
                match self.api.get_planet_geometry(planet) {
                    Ok(geometry) => ServerResponse::Geometry(geometry),
                    Err(e) => ServerResponse::Error(e),
                }
            }
            ServerRequest::SetCellMaterial(update) => {
                match self.api.set_cell_material(self.peer, update) {
                    Ok(changed) => ServerResponse::CellSet(changed),
                    Err(e) => ServerResponse::Error(e),
                }
            }
            ServerRequest::UpdatePersonState(state) => {
                self.api.update_person_state(self.peer, state);
                ServerResponse::Ack
            }
            ServerRequest::SendText(text) => {
                self.api.send_text(self.peer, text);
                ServerResponse::Ack
            }
            ServerRequest::HitPlayer(hit) => {
                self.api.hit_player(self.peer, hit);
                ServerResponse::Ack
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Client side
// ---------------------------------------------------------------------------

/// Operations a client exposes to the server.
pub trait ClientApi: Send + Sync + 'static {
    /// Current avatar state, asked for once during the handshake.
    fn get_person_state(&self) -> PlayerState;

    /// Another client edited a cell.
    fn set_cell_material(&self, update: CellUpdate);

    /// Another client moved.
    fn update_person_state(&self, state: PlayerState);

    /// A client left.
    fn person_disconnected(&self, name: String);

    /// Chat line from another player.
    fn send_text(&self, text: String);

    /// A player was hit.
    fn hit_player(&self, hit: Hit);
}

/// Routes [`ClientRequest`]s onto a [`ClientApi`].
pub struct ClientDispatch {
    api: Arc<dyn ClientApi>,
}

impl ClientDispatch {
    /// Dispatcher over `api`.
    pub fn new(api: Arc<dyn ClientApi>) -> Self {
        Self { api }
    }
}

impl Handler<ClientProtocol> for ClientDispatch {
    fn handle(&self, request: ClientRequest) -> ClientResponse {
        match request {
            ClientRequest::GetPersonState => ClientResponse::PersonState(self.api.get_person_state()),
            ClientRequest::SetCellMaterial(update) => {
                self.api.set_cell_material(update);
                ClientResponse::Ack
            }
            ClientRequest::UpdatePersonState(state) => {
                self.api.update_person_state(state);
                ClientResponse::Ack
            }
            ClientRequest::PersonDisconnected(name) => {
                self.api.person_disconnected(name);
                ClientResponse::Ack
            }
            ClientRequest::SendText(text) => {
                self.api.send_text(text);
                ClientResponse::Ack
            }
            ClientRequest::HitPlayer(hit) => {
                self.api.hit_player(hit);
                ClientResponse::Ack
            }
        }
    }
}
