//! In-memory store for tests and standalone sessions.

use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::atomic::{AtomicUsize, Ordering};

use rustc_hash::FxHashMap;
use sphaera_coords::ChunkIndex;
use sphaera_voxel::{
    ChunkData, PlanetId, PlanetState, PlayerState, RecordKind, decode_record, encode_record,
};

use crate::{StorageError, WorldStore};

#[derive(Default)]
struct Tables {
    chunks: FxHashMap<(PlanetId, ChunkIndex), Vec<u8>>,
    planets: FxHashMap<PlanetId, Vec<u8>>,
    players: FxHashMap<String, Vec<u8>>,
}

/// A [`WorldStore`] that keeps encoded records in hash maps.
///
/// Counts chunk reads and writes so callers can observe persistence traffic.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    chunk_reads: AtomicUsize,
    chunk_writes: AtomicUsize,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `load_chunk` calls so far.
    pub fn chunk_reads(&self) -> usize {
        self.chunk_reads.load(Ordering::SeqCst)
    }

    /// Number of `save_chunk` calls so far.
    pub fn chunk_writes(&self) -> usize {
        self.chunk_writes.load(Ordering::SeqCst)
    }

    fn tables(&self) -> std::sync::MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl WorldStore for MemoryStore {
    fn load_chunk(
        &self,
        planet: PlanetId,
        index: ChunkIndex,
    ) -> Result<Option<ChunkData>, StorageError> {
        self.chunk_reads.fetch_add(1, Ordering::SeqCst);
        let bytes = self.tables().chunks.get(&(planet, index)).cloned();
        Ok(bytes
            .map(|b| decode_record(RecordKind::Chunk, &b))
            .transpose()?)
    }

    fn save_chunk(
        &self,
        planet: PlanetId,
        index: ChunkIndex,
        data: &ChunkData,
    ) -> Result<(), StorageError> {
        let bytes = encode_record(RecordKind::Chunk, data)?;
        self.chunk_writes.fetch_add(1, Ordering::SeqCst);
        self.tables().chunks.insert((planet, index), bytes);
        Ok(())
    }

    fn load_planets(&self) -> Result<Vec<PlanetState>, StorageError> {
        let encoded: Vec<Vec<u8>> = self.tables().planets.values().cloned().collect();
        let mut planets = encoded
            .iter()
            .map(|b| decode_record::<PlanetState>(RecordKind::Planet, b))
            .collect::<Result<Vec<_>, _>>()?;
        planets.sort_by_key(|p| p.id);
        Ok(planets)
    }

    fn save_planet(&self, state: &PlanetState) -> Result<(), StorageError> {
        let bytes = encode_record(RecordKind::Planet, state)?;
        self.tables().planets.insert(state.id, bytes);
        Ok(())
    }

    fn load_player(&self, name: &str) -> Result<Option<PlayerState>, StorageError> {
        let bytes = self.tables().players.get(name).cloned();
        Ok(bytes
            .map(|b| decode_record(RecordKind::Player, &b))
            .transpose()?)
    }

    fn save_player(&self, state: &PlayerState) -> Result<(), StorageError> {
        let bytes = encode_record(RecordKind::Player, state)?;
        self.tables().players.insert(state.name.clone(), bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sphaera_voxel::Material;

    fn sample_chunk() -> ChunkData {
        ChunkData {
            lon_cells: 1,
            lat_cells: 1,
            alt_cells: 2,
            materials: vec![Material::STONE, Material::AIR],
        }
    }

    #[test]
    fn test_missing_chunk_is_none() {
        let store = MemoryStore::new();
        let got = store.load_chunk(PlanetId(0), ChunkIndex::new(1, 2, 3)).unwrap();
        assert!(got.is_none());
        assert_eq!(store.chunk_reads(), 1);
    }

    #[test]
    fn test_chunks_keyed_by_planet_and_index() {
        let store = MemoryStore::new();
        store
            .save_chunk(PlanetId(1), ChunkIndex::new(0, 0, 0), &sample_chunk())
            .unwrap();
        assert!(store.load_chunk(PlanetId(0), ChunkIndex::new(0, 0, 0)).unwrap().is_none());
        assert_eq!(
            store.load_chunk(PlanetId(1), ChunkIndex::new(0, 0, 0)).unwrap(),
            Some(sample_chunk())
        );
        assert_eq!(store.chunk_writes(), 1);
    }

    #[test]
    fn test_planets_sorted_by_id() {
        let store = MemoryStore::new();
        for id in [2, 0, 1] {
            store
                .save_planet(&PlanetState { id: PlanetId(id), ..PlanetState::default() })
                .unwrap();
        }
        let ids: Vec<u32> = store.load_planets().unwrap().iter().map(|p| p.id.0).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn test_player_overwrite() {
        let store = MemoryStore::new();
        let mut p = PlayerState::named("ada");
        store.save_player(&p).unwrap();
        p.position = [1.0, 2.0, 3.0];
        store.save_player(&p).unwrap();
        assert_eq!(store.load_player("ada").unwrap(), Some(p));
        assert_eq!(store.load_player("bob").unwrap(), None);
    }
}
