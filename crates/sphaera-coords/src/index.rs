//! Index and location types shared by every crate that addresses cells.

use serde::{Deserialize, Serialize};

/// Nominal edge length of a chunk, in cells, along every axis.
pub const CHUNK_EDGE: i32 = 16;

/// Integer chunk coordinates. Valid range is `[0, cells / CHUNK_EDGE)` per axis.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkIndex {
    /// Longitude chunk.
    pub lon: i32,
    /// Latitude chunk.
    pub lat: i32,
    /// Altitude chunk.
    pub alt: i32,
}

impl ChunkIndex {
    /// Create a chunk index from its three components.
    pub const fn new(lon: i32, lat: i32, alt: i32) -> Self {
        Self { lon, lat, alt }
    }
}

/// Integer cell coordinates in planet-wide index space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellIndex {
    /// Longitude cell.
    pub lon: i32,
    /// Latitude cell.
    pub lat: i32,
    /// Altitude cell.
    pub alt: i32,
}

impl CellIndex {
    /// Create a cell index from its three components.
    pub const fn new(lon: i32, lat: i32, alt: i32) -> Self {
        Self { lon, lat, alt }
    }

    /// The chunk containing this cell.
    ///
    /// Floor division, so negative components land in negative chunks instead
    /// of being folded into chunk zero.
    pub fn chunk(self) -> ChunkIndex {
        ChunkIndex {
            lon: self.lon.div_euclid(CHUNK_EDGE),
            lat: self.lat.div_euclid(CHUNK_EDGE),
            alt: self.alt.div_euclid(CHUNK_EDGE),
        }
    }
}

/// Fractional cell coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CellLoc {
    /// Longitude in cells.
    pub lon: f64,
    /// Latitude in cells.
    pub lat: f64,
    /// Altitude in cells.
    pub alt: f64,
}

impl CellLoc {
    /// Create a cell location from its three components.
    pub const fn new(lon: f64, lat: f64, alt: f64) -> Self {
        Self { lon, lat, alt }
    }
}

impl From<CellIndex> for CellLoc {
    fn from(c: CellIndex) -> Self {
        Self {
            lon: f64::from(c.lon),
            lat: f64::from(c.lat),
            alt: f64::from(c.alt),
        }
    }
}

/// Position of a stored cell inside a chunk's (possibly sub-sampled) array.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct LocalCell {
    /// Longitude slot, `< Resolution::lon`.
    pub lon: i32,
    /// Latitude slot, `< Resolution::lat`.
    pub lat: i32,
    /// Altitude slot, `< Resolution::alt`.
    pub alt: i32,
}

impl LocalCell {
    /// Create a local cell position from its three components.
    pub const fn new(lon: i32, lat: i32, alt: i32) -> Self {
        Self { lon, lat, alt }
    }
}
