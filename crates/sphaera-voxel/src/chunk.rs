//! Chunk storage with per-chunk resolution.
//!
//! A [`Chunk`] holds a dense array of [`Material`] codes laid out as
//! `[lon][lat][alt]` at the chunk's [`Resolution`]. Cells are atomics so that
//! concurrent edits need no lock beyond the one used to find the chunk;
//! concurrent writers to one cell resolve as last-write-wins.

use std::sync::atomic::{AtomicU16, AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use sphaera_coords::{ChunkIndex, LocalCell, Resolution};

use crate::material::Material;

/// Serializable snapshot of a chunk's cells.
///
/// This is the value stored in the persistence layer and sent in chunk-fetch
/// replies.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkData {
    /// Stored longitude cells.
    #[serde(alias = "lonCells")]
    pub lon_cells: i32,
    /// Stored latitude cells.
    #[serde(alias = "latCells")]
    pub lat_cells: i32,
    /// Stored altitude cells.
    #[serde(alias = "altCells")]
    pub alt_cells: i32,
    /// Materials in `[lon][lat][alt]` order.
    #[serde(alias = "cells")]
    pub materials: Vec<Material>,
}

/// Errors raised when a snapshot does not fit the chunk it is installed into.
#[derive(Debug, thiserror::Error)]
pub enum ChunkDataError {
    /// Snapshot dimensions differ from the resolution of the target chunk.
    #[error("chunk {index:?} expects {expected:?} cells per axis, snapshot has {found:?}")]
    ResolutionMismatch {
        /// Target chunk.
        index: ChunkIndex,
        /// Resolution of the target chunk.
        expected: (i32, i32, i32),
        /// Dimensions declared by the snapshot.
        found: (i32, i32, i32),
    },
    /// Snapshot cell count differs from its declared dimensions.
    #[error("chunk {index:?} snapshot holds {found} cells, expected {expected}")]
    LengthMismatch {
        /// Target chunk.
        index: ChunkIndex,
        /// Cell count implied by the dimensions.
        expected: usize,
        /// Cell count present.
        found: usize,
    },
}

/// One chunk of a planet.
pub struct Chunk {
    index: ChunkIndex,
    resolution: Resolution,
    cells: Box<[AtomicU16]>,
    waiting_for_data: bool,
    last_access: AtomicU64,
}

impl Chunk {
    /// Placeholder installed while the chunk is being resolved.
    ///
    /// It stores no cells and reports [`waiting_for_data`](Self::waiting_for_data).
    pub fn placeholder(index: ChunkIndex) -> Self {
        Self {
            index,
            resolution: Resolution::FULL,
            cells: Box::new([]),
            waiting_for_data: true,
            last_access: AtomicU64::new(0),
        }
    }

    /// Build a chunk by evaluating `f` for every stored slot.
    pub fn from_fn(
        index: ChunkIndex,
        resolution: Resolution,
        mut f: impl FnMut(LocalCell) -> Material,
    ) -> Self {
        let mut cells = Vec::with_capacity(resolution.volume());
        for lon in 0..resolution.lon {
            for lat in 0..resolution.lat {
                for alt in 0..resolution.alt {
                    cells.push(AtomicU16::new(f(LocalCell::new(lon, lat, alt)).0));
                }
            }
        }
        Self::with_cells(index, resolution, cells.into_boxed_slice())
    }

    /// Rebuild a chunk from a snapshot, checking it against `resolution`.
    pub fn from_data(
        index: ChunkIndex,
        resolution: Resolution,
        data: ChunkData,
    ) -> Result<Self, ChunkDataError> {
        let found = (data.lon_cells, data.lat_cells, data.alt_cells);
        let expected = (resolution.lon, resolution.lat, resolution.alt);
        if found != expected {
            return Err(ChunkDataError::ResolutionMismatch {
                index,
                expected,
                found,
            });
        }
        if data.materials.len() != resolution.volume() {
            return Err(ChunkDataError::LengthMismatch {
                index,
                expected: resolution.volume(),
                found: data.materials.len(),
            });
        }
        let cells = data
            .materials
            .into_iter()
            .map(|m| AtomicU16::new(m.0))
            .collect();
        Ok(Self::with_cells(index, resolution, cells))
    }

    fn with_cells(index: ChunkIndex, resolution: Resolution, cells: Box<[AtomicU16]>) -> Self {
        Self {
            index,
            resolution,
            cells,
            waiting_for_data: false,
            last_access: AtomicU64::new(0),
        }
    }

    /// Index of this chunk within its planet.
    pub fn index(&self) -> ChunkIndex {
        self.index
    }

    /// Stored cell counts.
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// `true` for a placeholder whose data has not arrived yet.
    pub fn waiting_for_data(&self) -> bool {
        self.waiting_for_data
    }

    fn offset(&self, local: LocalCell) -> usize {
        let r = self.resolution;
        ((local.lon * r.lat + local.lat) * r.alt + local.alt) as usize
    }

    /// Material stored at `local`. Placeholders read as air.
    pub fn get(&self, local: LocalCell) -> Material {
        self.cells
            .get(self.offset(local))
            .map(|c| Material(c.load(Ordering::Acquire)))
            .unwrap_or(Material::AIR)
    }

    /// Store `material` at `local`, returning whether the stored value changed.
    pub fn set(&self, local: LocalCell, material: Material) -> bool {
        match self.cells.get(self.offset(local)) {
            Some(cell) => cell.swap(material.0, Ordering::AcqRel) != material.0,
            None => false,
        }
    }

    /// Copy the current cells into a serializable snapshot.
    pub fn to_data(&self) -> ChunkData {
        ChunkData {
            lon_cells: self.resolution.lon,
            lat_cells: self.resolution.lat,
            alt_cells: self.resolution.alt,
            materials: self
                .cells
                .iter()
                .map(|c| Material(c.load(Ordering::Acquire)))
                .collect(),
        }
    }

    /// Record an access at logical time `tick`.
    pub fn touch(&self, tick: u64) {
        self.last_access.store(tick, Ordering::Relaxed);
    }

    /// Logical time of the most recent access.
    pub fn last_access(&self) -> u64 {
        self.last_access.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for Chunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chunk")
            .field("index", &self.index)
            .field("resolution", &self.resolution)
            .field("waiting_for_data", &self.waiting_for_data)
            .finish_non_exhaustive()
    }
}
