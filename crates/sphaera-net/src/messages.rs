//! Message catalogue for both call directions.
//!
//! Calls from client to server travel on [`Channel::ClientToServer`] and are
//! described by [`ServerProtocol`]; calls from server to client travel on
//! [`Channel::ServerToClient`] and are described by [`ClientProtocol`].

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sphaera_coords::{CellIndex, ChunkIndex};
use sphaera_voxel::{ChunkData, Material, PlanetGeometry, PlanetId, PlanetState, PlayerState};

use crate::framing::Channel;

/// A set of requests and responses bound to one channel.
pub trait Protocol: Send + Sync + 'static {
    /// Request message type.
    type Request: Serialize + DeserializeOwned + Send + 'static;
    /// Response message type.
    type Response: Serialize + DeserializeOwned + Send + 'static;
    /// Channel on which requests of this protocol travel.
    const CHANNEL: Channel;
}

/// Calls a client makes into the server.
pub enum ServerProtocol {}

impl Protocol for ServerProtocol {
    type Request = ServerRequest;
    type Response = ServerResponse;
    const CHANNEL: Channel = Channel::ClientToServer;
}

/// Calls the server makes into a client.
pub enum ClientProtocol {}

impl Protocol for ClientProtocol {
    type Request = ClientRequest;
    type Response = ClientResponse;
    const CHANNEL: Channel = Channel::ServerToClient;
}

/// A single cell edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellUpdate {
    /// Planet the cell belongs to.
    pub planet: PlanetId,
    /// Cell being edited.
    pub cell: CellIndex,
    /// New material.
    pub material: Material,
}

/// One player hitting another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hit {
    /// Name of the attacker.
    pub from: String,
    /// Name of the player being hit.
    pub target: String,
    /// Health removed.
    pub amount: i32,
}

/// Requests handled by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ServerRequest {
    /// Every planet in the universe.
    GetPlanetStates,
    /// Contents of one chunk.
    GetChunk {
        /// Planet to read from.
        planet: PlanetId,
        /// Chunk to read.
        index: ChunkIndex,
    },
    /// Surface geometry of a planet.
    GetPlanetGeometry {
        /// Planet to scan.
        planet: PlanetId,
    },
    /// Edit a cell and fan it out to the other clients.
    SetCellMaterial(CellUpdate),
    /// Report the caller's avatar state.
    UpdatePersonState(PlayerState),
    /// Chat line from the caller.
    SendText(String),
    /// The caller hit another player.
    HitPlayer(Hit),
}

/// Server replies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ServerResponse {
    /// Reply to [`ServerRequest::GetPlanetStates`].
    PlanetStates(Vec<PlanetState>),
    /// Reply to [`ServerRequest::GetChunk`].
    Chunk(ChunkData),
    /// Reply to [`ServerRequest::GetPlanetGeometry`].
    Geometry(PlanetGeometry),
    /// Reply to [`ServerRequest::SetCellMaterial`]; whether the cell changed.
    CellSet(bool),
    /// Reply to notifications that carry no data.
    Ack,
    /// The request could not be served.
    Error(String),
}

/// Requests handled by a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClientRequest {
    /// Handshake: the client's current avatar state.
    GetPersonState,
    /// Another client edited a cell.
    SetCellMaterial(CellUpdate),
    /// Another client moved.
    UpdatePersonState(PlayerState),
    /// A client left; carries its player name.
    PersonDisconnected(String),
    /// Chat line from another player.
    SendText(String),
    /// A player was hit.
    HitPlayer(Hit),
}

/// Client replies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClientResponse {
    /// Reply to [`ClientRequest::GetPersonState`].
    PersonState(PlayerState),
    /// Reply to notifications.
    Ack,
}
