//! A planet: voxel store, chunk loader, and mutation entry point.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rustc_hash::FxHashMap;
use sphaera_coords::{CellIndex, ChunkIndex, PlanetGrid};
use sphaera_storage::WorldStore;
use sphaera_terrain::{CellGenerator, generate_chunk, generate_geometry, generator_for};
use sphaera_voxel::{Chunk, ChunkData, Material, PlanetGeometry, PlanetId, PlanetState};

use crate::error::WorldError;
use crate::remote::Propagation;
use crate::{ChunkSource, WorldServices};

/// How a caller waits for a chunk that is not resident yet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadMode {
    /// Resolve before returning.
    Blocking,
    /// Return `None` immediately and install the chunk when it arrives.
    ///
    /// Authoritative planets resolve synchronously in either mode; only
    /// remote fetches run in the background.
    Background,
}

enum GeometrySlot {
    Absent,
    Loading,
    Ready(Arc<PlanetGeometry>),
}

/// One planet and its resident chunks.
pub struct Planet {
    state: PlanetState,
    grid: PlanetGrid,
    generator: Box<dyn CellGenerator>,
    chunks: Mutex<FxHashMap<ChunkIndex, Arc<Chunk>>>,
    geometry: Mutex<GeometrySlot>,
    /// Held from snapshot to save, so the last snapshot taken is the last
    /// one stored.
    writes: Mutex<()>,
    services: Arc<WorldServices>,
    clock: AtomicU64,
}

impl Planet {
    /// Create a planet with no resident chunks.
    pub fn new(state: PlanetState, services: Arc<WorldServices>) -> Self {
        let grid = state.grid();
        let generator = generator_for(&state.generator, state.seed);
        Self {
            state,
            grid,
            generator,
            chunks: Mutex::new(FxHashMap::default()),
            geometry: Mutex::new(GeometrySlot::Absent),
            writes: Mutex::new(()),
            services,
            clock: AtomicU64::new(0),
        }
    }

    /// Identifier of this planet.
    pub fn id(&self) -> PlanetId {
        self.state.id
    }

    /// Persistent description.
    pub fn state(&self) -> &PlanetState {
        &self.state
    }

    /// Derived grid and coordinate transforms.
    pub fn grid(&self) -> &PlanetGrid {
        &self.grid
    }

    /// Number of chunks in the map, placeholders included.
    pub fn resident_chunks(&self) -> usize {
        self.lock_chunks().len()
    }

    /// The chunk at `index` if it is resident and ready. Never loads.
    pub fn resident_chunk(&self, index: ChunkIndex) -> Option<Arc<Chunk>> {
        self.lock_chunks()
            .get(&index)
            .filter(|c| !c.waiting_for_data())
            .cloned()
    }

    fn lock_chunks(&self) -> MutexGuard<'_, FxHashMap<ChunkIndex, Arc<Chunk>>> {
        self.chunks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_geometry(&self) -> MutexGuard<'_, GeometrySlot> {
        self.geometry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn fatal(&self, err: WorldError) -> WorldError {
        self.services
            .faults
            .raise(format_args!("planet {}: {err}", self.state.id));
        err
    }

    // -----------------------------------------------------------------------
    // Chunks
    // -----------------------------------------------------------------------

    /// Look up the chunk at `index`, starting a load if it is absent.
    ///
    /// Returns `Ok(None)` for indices outside the planet and for chunks that
    /// are still being fetched. The first caller for an absent index installs
    /// a placeholder under the map lock; everyone after it sees "not ready"
    /// until the load finishes.
    pub fn get_chunk(
        self: &Arc<Self>,
        index: ChunkIndex,
        mode: LoadMode,
    ) -> Result<Option<Arc<Chunk>>, WorldError> {
        if !self.grid.contains_chunk(index) {
            return Ok(None);
        }
        {
            let mut chunks = self.lock_chunks();
            if let Some(chunk) = chunks.get(&index) {
                if chunk.waiting_for_data() {
                    return Ok(None);
                }
                chunk.touch(self.tick());
                return Ok(Some(Arc::clone(chunk)));
            }
            chunks.insert(index, Arc::new(Chunk::placeholder(index)));
        }

        match &self.services.source {
            ChunkSource::Authoritative(store) => {
                let result = self.load_or_generate(store.as_ref(), index);
                self.install(index, result).map(Some)
            }
            ChunkSource::Remote(remote) => match mode {
                LoadMode::Blocking => {
                    tracing::debug!("Planet {} chunk {index:?} fetching from remote", self.state.id);
                    let result = remote
                        .fetch_chunk(self.state.id, index)
                        .map_err(WorldError::from)
                        .and_then(|data| self.chunk_from_data(index, data));
                    self.install(index, result).map(Some)
                }
                LoadMode::Background => {
                    tracing::debug!("Planet {} chunk {index:?} queued for remote fetch", self.state.id);
                    let planet = Arc::clone(self);
                    remote.fetch_chunk_async(
                        self.state.id,
                        index,
                        Box::new(move |reply| {
                            let result = reply
                                .map_err(WorldError::from)
                                .and_then(|data| planet.chunk_from_data(index, data));
                            // Failures were raised on the fault signal already.
                            let _ = planet.install(index, result);
                        }),
                    );
                    Ok(None)
                }
            },
        }
    }

    fn load_or_generate(
        &self,
        store: &dyn WorldStore,
        index: ChunkIndex,
    ) -> Result<Chunk, WorldError> {
        if let Some(data) = store.load_chunk(self.state.id, index)? {
            tracing::debug!("Planet {} chunk {index:?} loaded from storage", self.state.id);
            return self.chunk_from_data(index, data);
        }
        let chunk = generate_chunk(&self.grid, self.generator.as_ref(), index);
        store.save_chunk(self.state.id, index, &chunk.to_data())?;
        tracing::debug!("Planet {} chunk {index:?} generated", self.state.id);
        Ok(chunk)
    }

    fn chunk_from_data(&self, index: ChunkIndex, data: ChunkData) -> Result<Chunk, WorldError> {
        Ok(Chunk::from_data(index, self.grid.resolution(index), data)?)
    }

    /// Replace the placeholder at `index` with the load result.
    ///
    /// On failure the placeholder is removed, so no partial chunk is ever
    /// visible, and the error is raised as a fault.
    fn install(
        &self,
        index: ChunkIndex,
        result: Result<Chunk, WorldError>,
    ) -> Result<Arc<Chunk>, WorldError> {
        match result {
            Ok(chunk) => {
                chunk.touch(self.tick());
                let chunk = Arc::new(chunk);
                let mut chunks = self.lock_chunks();
                chunks.insert(index, Arc::clone(&chunk));
                self.evict_over_budget(&mut chunks, index);
                Ok(chunk)
            }
            Err(err) => {
                self.lock_chunks().remove(&index);
                Err(self.fatal(err))
            }
        }
    }

    /// Drop least-recently used ready chunks until the map fits the budget.
    fn evict_over_budget(
        &self,
        chunks: &mut FxHashMap<ChunkIndex, Arc<Chunk>>,
        keep: ChunkIndex,
    ) {
        let Some(max) = self.services.max_resident_chunks else {
            return;
        };
        while chunks.len() > max {
            let victim = chunks
                .iter()
                .filter(|(i, c)| **i != keep && !c.waiting_for_data())
                .min_by_key(|(_, c)| c.last_access())
                .map(|(i, _)| *i);
            let Some(victim) = victim else {
                break;
            };
            chunks.remove(&victim);
            tracing::trace!("Planet {} evicted chunk {victim:?}", self.state.id);
        }
    }

    // -----------------------------------------------------------------------
    // Cells
    // -----------------------------------------------------------------------

    /// Wrap longitude and reject cells outside the latitude/altitude range.
    fn normalize(&self, cell: CellIndex) -> Option<CellIndex> {
        let cell = self.grid.wrap_cell(cell);
        let in_range = (0..self.grid.lat_cells()).contains(&cell.lat)
            && (0..self.grid.alt_cells()).contains(&cell.alt);
        in_range.then_some(cell)
    }

    /// Material of `cell`, or `None` if its chunk is not available yet.
    pub fn get_cell(self: &Arc<Self>, cell: CellIndex) -> Result<Option<Material>, WorldError> {
        let Some(cell) = self.normalize(cell) else {
            return Ok(None);
        };
        let (index, local) = self.grid.locate(cell);
        Ok(self
            .get_chunk(index, LoadMode::Background)?
            .map(|chunk| chunk.get(local)))
    }

    /// Set the material of `cell`.
    ///
    /// Returns `Ok(false)` without side effects when the chunk is not
    /// available or already holds `material`. Otherwise the owning chunk is
    /// written through to storage (authoritative planets) and the change is
    /// propagated as requested.
    pub fn set_cell_material(
        self: &Arc<Self>,
        cell: CellIndex,
        material: Material,
        propagation: Propagation,
    ) -> Result<bool, WorldError> {
        let Some(cell) = self.normalize(cell) else {
            return Ok(false);
        };
        let (index, local) = self.grid.locate(cell);
        let Some(chunk) = self.get_chunk(index, LoadMode::Background)? else {
            return Ok(false);
        };
        if !chunk.set(local, material) {
            return Ok(false);
        }

        if let ChunkSource::Authoritative(store) = &self.services.source {
            let _writing = self.writes.lock().unwrap_or_else(PoisonError::into_inner);
            store
                .save_chunk(self.state.id, index, &chunk.to_data())
                .map_err(|e| self.fatal(e.into()))?;
        }

        let except = match propagation {
            Propagation::Silent => return Ok(true),
            Propagation::Broadcast => None,
            Propagation::BroadcastExcept(peer) => Some(peer),
        };
        if let ChunkSource::Remote(remote) = &self.services.source {
            remote.send_cell_material(self.state.id, cell, material);
        }
        if let Some(fanout) = &self.services.fanout {
            fanout.cell_changed(self.state.id, cell, material, except);
        }
        Ok(true)
    }

    // -----------------------------------------------------------------------
    // Geometry
    // -----------------------------------------------------------------------

    /// Coarse surface map, built or fetched on first use.
    ///
    /// Returns `Ok(None)` while a background fetch is outstanding.
    pub fn geometry(
        self: &Arc<Self>,
        mode: LoadMode,
    ) -> Result<Option<Arc<PlanetGeometry>>, WorldError> {
        {
            let mut slot = self.lock_geometry();
            match &*slot {
                GeometrySlot::Ready(geom) => return Ok(Some(Arc::clone(geom))),
                GeometrySlot::Loading => return Ok(None),
                GeometrySlot::Absent => *slot = GeometrySlot::Loading,
            }
        }

        let fetched = match &self.services.source {
            ChunkSource::Authoritative(_) => {
                Ok(generate_geometry(&self.grid, self.generator.as_ref()))
            }
            ChunkSource::Remote(remote) => match mode {
                LoadMode::Blocking => remote.fetch_geometry(self.state.id).map_err(WorldError::from),
                LoadMode::Background => {
                    let planet = Arc::clone(self);
                    remote.fetch_geometry_async(
                        self.state.id,
                        Box::new(move |reply| {
                            let _ = planet.install_geometry(reply.map_err(WorldError::from));
                        }),
                    );
                    return Ok(None);
                }
            },
        };
        self.install_geometry(fetched).map(Some)
    }

    fn install_geometry(
        &self,
        result: Result<PlanetGeometry, WorldError>,
    ) -> Result<Arc<PlanetGeometry>, WorldError> {
        let mut slot = self.lock_geometry();
        match result {
            Ok(geom) => {
                let geom = Arc::new(geom);
                *slot = GeometrySlot::Ready(Arc::clone(&geom));
                Ok(geom)
            }
            Err(err) => {
                *slot = GeometrySlot::Absent;
                drop(slot);
                Err(self.fatal(err))
            }
        }
    }
}

#[cfg(test)]
#[path = "planet_tests.rs"]
mod tests;
