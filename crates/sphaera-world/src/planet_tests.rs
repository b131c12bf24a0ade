//! Unit tests for chunk loading, mutation, and geometry.

use std::sync::atomic::{AtomicBool, AtomicUsize};
use std::sync::mpsc;
use std::sync::{Barrier, Mutex};
use std::time::Duration;

use sphaera_coords::CHUNK_EDGE;
use sphaera_storage::{MemoryStore, StorageError};
use sphaera_voxel::{PlayerState, PlanetGeometry};

use super::*;
use crate::error::RemoteError;
use crate::remote::{Completion, PeerFanout, PeerId, RemoteWorld};

fn sphere_state() -> PlanetState {
    PlanetState {
        generator: "sphere".to_string(),
        radius: 64.0,
        alt_cells: 64,
        seed: 1,
        ..PlanetState::default()
    }
}

fn authoritative(services: WorldServices) -> Arc<Planet> {
    Arc::new(Planet::new(sphere_state(), Arc::new(services)))
}

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

/// Store whose chunk reads always fail.
struct BrokenStore;

impl WorldStore for BrokenStore {
    fn load_chunk(&self, _: PlanetId, _: ChunkIndex) -> Result<Option<ChunkData>, StorageError> {
        Err(StorageError::Io {
            path: "chunks".into(),
            source: std::io::Error::other("disk gone"),
        })
    }
    fn save_chunk(&self, _: PlanetId, _: ChunkIndex, _: &ChunkData) -> Result<(), StorageError> {
        Ok(())
    }
    fn load_planets(&self) -> Result<Vec<PlanetState>, StorageError> {
        Ok(Vec::new())
    }
    fn save_planet(&self, _: &PlanetState) -> Result<(), StorageError> {
        Ok(())
    }
    fn load_player(&self, _: &str) -> Result<Option<PlayerState>, StorageError> {
        Ok(None)
    }
    fn save_player(&self, _: &PlayerState) -> Result<(), StorageError> {
        Ok(())
    }
}

/// Store that, once armed, parks the next chunk save until released.
struct GatedStore {
    inner: Arc<MemoryStore>,
    armed: AtomicBool,
    parked: Mutex<mpsc::Sender<()>>,
    release: Mutex<mpsc::Receiver<()>>,
}

impl GatedStore {
    /// The store, a receiver signalled when a save parks, and a sender
    /// that lets it finish.
    fn new(inner: Arc<MemoryStore>) -> (Self, mpsc::Receiver<()>, mpsc::Sender<()>) {
        let (parked_tx, parked_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let store = Self {
            inner,
            armed: AtomicBool::new(false),
            parked: Mutex::new(parked_tx),
            release: Mutex::new(release_rx),
        };
        (store, parked_rx, release_tx)
    }
}

impl WorldStore for GatedStore {
    fn load_chunk(&self, planet: PlanetId, index: ChunkIndex) -> Result<Option<ChunkData>, StorageError> {
        self.inner.load_chunk(planet, index)
    }
    fn save_chunk(&self, planet: PlanetId, index: ChunkIndex, data: &ChunkData) -> Result<(), StorageError> {
        if self.armed.swap(false, Ordering::SeqCst) {
            self.parked.lock().unwrap().send(()).unwrap();
            self.release.lock().unwrap().recv().unwrap();
        }
        self.inner.save_chunk(planet, index, data)
    }
    fn load_planets(&self) -> Result<Vec<PlanetState>, StorageError> {
        self.inner.load_planets()
    }
    fn save_planet(&self, state: &PlanetState) -> Result<(), StorageError> {
        self.inner.save_planet(state)
    }
    fn load_player(&self, name: &str) -> Result<Option<PlayerState>, StorageError> {
        self.inner.load_player(name)
    }
    fn save_player(&self, state: &PlayerState) -> Result<(), StorageError> {
        self.inner.save_player(state)
    }
}

/// Remote peer that serves sphere chunks and parks async requests until
/// the test releases them.
#[derive(Default)]
struct FakeRemote {
    fail: bool,
    fetches: AtomicUsize,
    parked: Mutex<Vec<(ChunkIndex, Completion<ChunkData>)>>,
    parked_geometry: Mutex<Vec<Completion<PlanetGeometry>>>,
    sent: Mutex<Vec<(PlanetId, CellIndex, Material)>>,
}

impl FakeRemote {
    fn serve(&self, index: ChunkIndex) -> Result<ChunkData, RemoteError> {
        if self.fail {
            return Err(RemoteError::Shutdown);
        }
        let grid = sphere_state().grid();
        Ok(generate_chunk(&grid, generator_for("sphere", 1).as_ref(), index).to_data())
    }

    fn release_all(&self) {
        let parked: Vec<_> = self.parked.lock().unwrap().drain(..).collect();
        for (index, done) in parked {
            done(self.serve(index));
        }
    }
}

impl RemoteWorld for FakeRemote {
    fn fetch_chunk(&self, _: PlanetId, index: ChunkIndex) -> Result<ChunkData, RemoteError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.serve(index)
    }

    fn fetch_chunk_async(&self, _: PlanetId, index: ChunkIndex, done: Completion<ChunkData>) {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.parked.lock().unwrap().push((index, done));
    }

    fn fetch_geometry(&self, _: PlanetId) -> Result<PlanetGeometry, RemoteError> {
        Ok(PlanetGeometry::default())
    }

    fn fetch_geometry_async(&self, _: PlanetId, done: Completion<PlanetGeometry>) {
        self.parked_geometry.lock().unwrap().push(done);
    }

    fn send_cell_material(&self, planet: PlanetId, cell: CellIndex, material: Material) {
        self.sent.lock().unwrap().push((planet, cell, material));
    }
}

#[derive(Default)]
struct RecordingFanout {
    calls: Mutex<Vec<(PlanetId, CellIndex, Material, Option<PeerId>)>>,
}

impl PeerFanout for RecordingFanout {
    fn cell_changed(
        &self,
        planet: PlanetId,
        cell: CellIndex,
        material: Material,
        except: Option<PeerId>,
    ) {
        self.calls.lock().unwrap().push((planet, cell, material, except));
    }
}

// ---------------------------------------------------------------------------
// Authoritative loading
// ---------------------------------------------------------------------------

#[test]
fn test_out_of_range_chunk_is_none() {
    let store = Arc::new(MemoryStore::new());
    let planet = authoritative(WorldServices::authoritative(store.clone()));
    for index in [
        ChunkIndex::new(-1, 0, 0),
        ChunkIndex::new(9, 0, 0),
        ChunkIndex::new(0, 6, 0),
        ChunkIndex::new(0, 0, 4),
    ] {
        assert!(planet.get_chunk(index, LoadMode::Blocking).unwrap().is_none());
    }
    assert_eq!(store.chunk_reads(), 0);
    assert_eq!(planet.resident_chunks(), 0);
}

#[test]
fn test_sphere_scenario_edit_and_idempotence() {
    let store = Arc::new(MemoryStore::new());
    let planet = authoritative(WorldServices::authoritative(store.clone()));

    let above = CellIndex::new(10, 48, 40);
    let below = CellIndex::new(10, 48, 20);
    assert_eq!(planet.get_cell(above).unwrap(), Some(Material::AIR));
    assert_eq!(planet.get_cell(below).unwrap(), Some(Material::STONE));

    let writes = store.chunk_writes();
    assert!(planet.set_cell_material(below, Material::AIR, Propagation::Silent).unwrap());
    assert_eq!(planet.get_cell(below).unwrap(), Some(Material::AIR));
    assert_eq!(store.chunk_writes(), writes + 1);

    assert!(!planet.set_cell_material(below, Material::AIR, Propagation::Silent).unwrap());
    assert_eq!(store.chunk_writes(), writes + 1, "no-op edit must not persist");
}

#[test]
fn test_stored_chunk_preferred_over_generation() {
    let store = Arc::new(MemoryStore::new());
    let index = ChunkIndex::new(1, 2, 3);
    let grid = sphere_state().grid();
    let stored = Chunk::from_fn(index, grid.resolution(index), |_| Material::MOON);
    store.save_chunk(PlanetId(0), index, &stored.to_data()).unwrap();

    let planet = authoritative(WorldServices::authoritative(store.clone()));
    let chunk = planet.get_chunk(index, LoadMode::Blocking).unwrap().unwrap();
    assert_eq!(chunk.to_data(), stored.to_data());
    assert_eq!(store.chunk_writes(), 1, "loaded chunk is not re-persisted");
}

#[test]
fn test_generated_chunk_is_persisted_once() {
    let store = Arc::new(MemoryStore::new());
    let planet = authoritative(WorldServices::authoritative(store.clone()));
    let index = ChunkIndex::new(4, 3, 1);
    let first = planet.get_chunk(index, LoadMode::Blocking).unwrap().unwrap();
    let again = planet.get_chunk(index, LoadMode::Background).unwrap().unwrap();
    assert!(Arc::ptr_eq(&first, &again));
    assert_eq!(store.chunk_writes(), 1);
    assert_eq!(
        store.load_chunk(PlanetId(0), index).unwrap(),
        Some(first.to_data())
    );
}

#[test]
fn test_concurrent_requests_load_once() {
    let store = Arc::new(MemoryStore::new());
    let planet = authoritative(WorldServices::authoritative(store.clone()));
    let index = ChunkIndex::new(2, 3, 2);
    let callers = 8;
    let barrier = Arc::new(Barrier::new(callers));

    let handles: Vec<_> = (0..callers)
        .map(|_| {
            let planet = Arc::clone(&planet);
            let barrier = Arc::clone(&barrier);
            std::thread::spawn(move || {
                barrier.wait();
                loop {
                    if let Some(chunk) = planet.get_chunk(index, LoadMode::Blocking).unwrap() {
                        return chunk;
                    }
                    std::thread::yield_now();
                }
            })
        })
        .collect();

    let chunks: Vec<Arc<Chunk>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(chunks.iter().all(|c| Arc::ptr_eq(c, &chunks[0])));
    assert_eq!(store.chunk_reads(), 1);
    assert_eq!(store.chunk_writes(), 1);
}

#[test]
fn test_concurrent_edits_to_one_chunk_all_reach_storage() {
    let inner = Arc::new(MemoryStore::new());
    let (gated, parked, release) = GatedStore::new(Arc::clone(&inner));
    let gated = Arc::new(gated);
    let planet = authoritative(WorldServices::authoritative(gated.clone()));
    let index = ChunkIndex::new(2, 3, 2);
    planet.get_chunk(index, LoadMode::Blocking).unwrap().unwrap();

    // Two air cells of the same chunk.
    let a = CellIndex::new(33, 50, 40);
    let b = CellIndex::new(40, 56, 44);
    assert_eq!(planet.grid().locate(a).0, index);
    assert_eq!(planet.grid().locate(b).0, index);

    gated.armed.store(true, Ordering::SeqCst);
    let first = {
        let planet = Arc::clone(&planet);
        std::thread::spawn(move || planet.set_cell_material(a, Material::STONE, Propagation::Silent))
    };
    parked.recv().unwrap();

    let second = {
        let planet = Arc::clone(&planet);
        std::thread::spawn(move || planet.set_cell_material(b, Material::STONE, Propagation::Silent))
    };
    std::thread::sleep(Duration::from_millis(50));
    release.send(()).unwrap();

    assert!(first.join().unwrap().unwrap());
    assert!(second.join().unwrap().unwrap());

    // A fresh planet over the same storage sees both edits.
    let reloaded = authoritative(WorldServices::authoritative(inner));
    assert_eq!(reloaded.get_cell(a).unwrap(), Some(Material::STONE));
    assert_eq!(reloaded.get_cell(b).unwrap(), Some(Material::STONE));
}

#[test]
fn test_storage_failure_is_fatal_and_leaves_no_placeholder() {
    let services = WorldServices::authoritative(Arc::new(BrokenStore));
    let faults = services.faults.clone();
    let planet = authoritative(services);
    let index = ChunkIndex::new(0, 2, 2);

    let err = planet.get_chunk(index, LoadMode::Blocking).unwrap_err();
    assert!(matches!(err, WorldError::Storage(_)));
    assert!(faults.current().unwrap().contains("disk gone"));
    assert_eq!(planet.resident_chunks(), 0);
}

#[test]
fn test_sub_sampled_cells_share_a_slot() {
    let store = Arc::new(MemoryStore::new());
    let planet = authoritative(WorldServices::authoritative(store));
    // Latitude band 0 stores half the longitude samples, so cells 0 and 1
    // map to the same slot.
    let a = CellIndex::new(0, 3, 20);
    let b = CellIndex::new(1, 3, 20);
    assert_eq!(planet.grid().resolution(a.chunk()).lon, CHUNK_EDGE / 2);
    assert!(planet.set_cell_material(a, Material::DIRT, Propagation::Silent).unwrap());
    assert_eq!(planet.get_cell(b).unwrap(), Some(Material::DIRT));
}

#[test]
fn test_longitude_wraps_and_out_of_range_cells_ignored() {
    let store = Arc::new(MemoryStore::new());
    let planet = authoritative(WorldServices::authoritative(store));
    let lon_cells = planet.grid().lon_cells();
    assert!(planet
        .set_cell_material(CellIndex::new(-1, 48, 40), Material::GRASS, Propagation::Silent)
        .unwrap());
    assert_eq!(
        planet.get_cell(CellIndex::new(lon_cells - 1, 48, 40)).unwrap(),
        Some(Material::GRASS)
    );
    assert_eq!(planet.get_cell(CellIndex::new(0, -1, 5)).unwrap(), None);
    assert_eq!(planet.get_cell(CellIndex::new(0, 5, 64)).unwrap(), None);
    assert!(!planet
        .set_cell_material(CellIndex::new(0, 5, 64), Material::GRASS, Propagation::Broadcast)
        .unwrap());
}

// ---------------------------------------------------------------------------
// Propagation
// ---------------------------------------------------------------------------

#[test]
fn test_fanout_skips_origin_and_silent_edits() {
    let fanout = Arc::new(RecordingFanout::default());
    let planet = authoritative(
        WorldServices::authoritative(Arc::new(MemoryStore::new())).with_fanout(fanout.clone()),
    );
    let cell = CellIndex::new(5, 40, 20);

    planet.set_cell_material(cell, Material::AIR, Propagation::Silent).unwrap();
    assert!(fanout.calls.lock().unwrap().is_empty());

    planet
        .set_cell_material(cell, Material::RED_SAND, Propagation::BroadcastExcept(PeerId(3)))
        .unwrap();
    planet.set_cell_material(cell, Material::RED_SAND, Propagation::Broadcast).unwrap();
    let calls = fanout.calls.lock().unwrap();
    assert_eq!(*calls, vec![(PlanetId(0), cell, Material::RED_SAND, Some(PeerId(3)))]);
}

// ---------------------------------------------------------------------------
// Remote loading
// ---------------------------------------------------------------------------

#[test]
fn test_background_fetch_installs_on_completion() {
    let remote = Arc::new(FakeRemote::default());
    let planet = authoritative(WorldServices::remote(remote.clone()));
    let index = ChunkIndex::new(3, 3, 1);

    assert!(planet.get_chunk(index, LoadMode::Background).unwrap().is_none());
    assert!(planet.get_chunk(index, LoadMode::Background).unwrap().is_none());
    assert!(planet.get_chunk(index, LoadMode::Blocking).unwrap().is_none());
    assert_eq!(remote.fetches.load(Ordering::SeqCst), 1);
    assert_eq!(planet.resident_chunks(), 1);
    assert!(planet.resident_chunk(index).is_none());

    remote.release_all();
    let chunk = planet.get_chunk(index, LoadMode::Background).unwrap().unwrap();
    assert!(!chunk.waiting_for_data());
    assert_eq!(remote.fetches.load(Ordering::SeqCst), 1);
}

#[test]
fn test_background_fetch_failure_raises_fault() {
    let remote = Arc::new(FakeRemote {
        fail: true,
        ..FakeRemote::default()
    });
    let services = WorldServices::remote(remote.clone());
    let faults = services.faults.clone();
    let planet = authoritative(services);
    let index = ChunkIndex::new(3, 3, 1);

    assert!(planet.get_chunk(index, LoadMode::Background).unwrap().is_none());
    remote.release_all();
    assert!(faults.current().unwrap().contains("shut down"));
    assert_eq!(planet.resident_chunks(), 0);
}

#[test]
fn test_blocking_remote_fetch() {
    let remote = Arc::new(FakeRemote::default());
    let planet = authoritative(WorldServices::remote(remote.clone()));
    let below = CellIndex::new(10, 48, 20);
    let chunk = planet.get_chunk(below.chunk(), LoadMode::Blocking).unwrap().unwrap();
    let (_, local) = planet.grid().locate(below);
    assert_eq!(chunk.get(local), Material::STONE);
}

#[test]
fn test_client_edit_goes_to_server_without_persisting() {
    let remote = Arc::new(FakeRemote::default());
    let planet = authoritative(WorldServices::remote(remote.clone()));
    let cell = CellIndex::new(10, 48, 20);

    // Not resident yet: the edit is dropped.
    assert!(!planet.set_cell_material(cell, Material::AIR, Propagation::Broadcast).unwrap());
    remote.release_all();

    assert!(planet.set_cell_material(cell, Material::AIR, Propagation::Broadcast).unwrap());
    assert!(planet.set_cell_material(cell, Material::DIRT, Propagation::Silent).unwrap());
    assert_eq!(
        *remote.sent.lock().unwrap(),
        vec![(PlanetId(0), cell, Material::AIR)]
    );
}

// ---------------------------------------------------------------------------
// Residency budget
// ---------------------------------------------------------------------------

#[test]
fn test_lru_eviction_keeps_recent_chunks_and_edits() {
    let store = Arc::new(MemoryStore::new());
    let planet = authoritative(
        WorldServices::authoritative(store.clone()).with_max_resident_chunks(Some(2)),
    );
    let a = ChunkIndex::new(0, 2, 1);
    let b = ChunkIndex::new(1, 2, 1);
    let c = ChunkIndex::new(2, 2, 1);

    planet.get_chunk(a, LoadMode::Blocking).unwrap();
    planet.get_chunk(b, LoadMode::Blocking).unwrap();
    planet.get_chunk(a, LoadMode::Blocking).unwrap();
    let edited = CellIndex::new(32, 32, 20);
    assert_eq!(edited.chunk(), c);
    planet.set_cell_material(edited, Material::SUN, Propagation::Silent).unwrap();

    assert_eq!(planet.resident_chunks(), 2);
    assert!(planet.resident_chunk(a).is_some());
    assert!(planet.resident_chunk(b).is_none());
    assert!(planet.resident_chunk(c).is_some());

    // Evict c by touching a and b again, then reload it from storage.
    planet.get_chunk(a, LoadMode::Blocking).unwrap();
    planet.get_chunk(b, LoadMode::Blocking).unwrap();
    assert!(planet.resident_chunk(c).is_none());
    assert_eq!(planet.get_cell(edited).unwrap(), Some(Material::SUN));
}

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

#[test]
fn test_authoritative_geometry_cached() {
    let planet = authoritative(WorldServices::authoritative(Arc::new(MemoryStore::new())));
    let first = planet.geometry(LoadMode::Background).unwrap().unwrap();
    let second = planet.geometry(LoadMode::Blocking).unwrap().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.surface(0, 16).map(|(_, alt)| alt), Some(31));
}

#[test]
fn test_remote_geometry_loading_state() {
    let remote = Arc::new(FakeRemote::default());
    let planet = authoritative(WorldServices::remote(remote.clone()));
    assert!(planet.geometry(LoadMode::Background).unwrap().is_none());
    assert!(planet.geometry(LoadMode::Blocking).unwrap().is_none());

    let parked: Vec<_> = remote.parked_geometry.lock().unwrap().drain(..).collect();
    assert_eq!(parked.len(), 1);
    for done in parked {
        done(Ok(PlanetGeometry::default()));
    }
    assert!(planet.geometry(LoadMode::Background).unwrap().is_some());
}
