//! Seams between the world and whatever transport connects it to peers.

use sphaera_coords::{CellIndex, ChunkIndex};
use sphaera_voxel::{ChunkData, Material, PlanetGeometry, PlanetId};

use crate::error::RemoteError;

/// Callback invoked exactly once when an asynchronous fetch completes.
pub type Completion<T> = Box<dyn FnOnce(Result<T, RemoteError>) + Send + 'static>;

/// Identity of a connected peer, as assigned by the transport.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PeerId(pub u64);

/// Whether and where a cell change travels after being applied locally.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Propagation {
    /// Apply locally only. Used for changes that arrived from a peer.
    Silent,
    /// Send to every interested peer.
    Broadcast,
    /// Send to every interested peer except the one the change came from.
    BroadcastExcept(PeerId),
}

/// The authoritative peer, as seen by a non-authoritative world.
pub trait RemoteWorld: Send + Sync {
    /// Fetch a chunk, blocking the calling thread until the reply arrives.
    ///
    /// Must not be called from inside an async runtime worker.
    fn fetch_chunk(&self, planet: PlanetId, index: ChunkIndex) -> Result<ChunkData, RemoteError>;

    /// Start fetching a chunk; `done` runs when the reply arrives.
    fn fetch_chunk_async(&self, planet: PlanetId, index: ChunkIndex, done: Completion<ChunkData>);

    /// Fetch a planet's coarse geometry, blocking until the reply arrives.
    fn fetch_geometry(&self, planet: PlanetId) -> Result<PlanetGeometry, RemoteError>;

    /// Start fetching a planet's coarse geometry.
    fn fetch_geometry_async(&self, planet: PlanetId, done: Completion<PlanetGeometry>);

    /// Fire-and-forget notification of a local edit.
    fn send_cell_material(&self, planet: PlanetId, cell: CellIndex, material: Material);
}

/// Fan-out of cell edits to connected peers, on the authoritative side.
pub trait PeerFanout: Send + Sync {
    /// Deliver `(planet, cell, material)` to every peer other than `except`.
    fn cell_changed(
        &self,
        planet: PlanetId,
        cell: CellIndex,
        material: Material,
        except: Option<PeerId>,
    );
}
