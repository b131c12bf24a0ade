//! Durable storage for world state.
//!
//! [`WorldStore`] is keyed the way a relational schema would be: chunks by
//! `(planet, lon, lat, alt)`, planets by id, players by name. Values are
//! encoded with the self-describing record format from `sphaera-voxel`, so
//! stores only move bytes around.

mod error;
mod file;
mod memory;

pub use error::StorageError;
pub use file::FileStore;
pub use memory::MemoryStore;

use sphaera_coords::ChunkIndex;
use sphaera_voxel::{ChunkData, PlanetId, PlanetState, PlayerState};

/// Read-through / write-through persistence used by authoritative worlds.
///
/// Implementations guard their own state; callers never hold world locks
/// while calling in.
pub trait WorldStore: Send + Sync {
    /// Load a stored chunk, or `None` if it was never saved.
    fn load_chunk(&self, planet: PlanetId, index: ChunkIndex)
    -> Result<Option<ChunkData>, StorageError>;

    /// Insert or replace a chunk.
    fn save_chunk(
        &self,
        planet: PlanetId,
        index: ChunkIndex,
        data: &ChunkData,
    ) -> Result<(), StorageError>;

    /// All stored planets, ordered by id.
    fn load_planets(&self) -> Result<Vec<PlanetState>, StorageError>;

    /// Insert or replace a planet.
    fn save_planet(&self, state: &PlanetState) -> Result<(), StorageError>;

    /// Load a player's last saved state.
    fn load_player(&self, name: &str) -> Result<Option<PlayerState>, StorageError>;

    /// Insert or replace a player's state.
    fn save_player(&self, state: &PlayerState) -> Result<(), StorageError>;
}
