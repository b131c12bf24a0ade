//! Level-of-detail rule for chunk storage.
//!
//! A chunk always spans `CHUNK_EDGE³` cells of index space, but it only stores
//! as many longitude and latitude samples as its physical size warrants.
//! Longitude bands narrow toward the poles and shells shrink toward the core,
//! so those chunks are sub-sampled by powers of two.

use crate::index::CHUNK_EDGE;

/// Angular distance from the equator, in degrees, at which longitude storage halves.
const POLAR_BAND_DEG: f64 = 60.0;

/// Angular distance from the equator, in degrees, at which longitude storage halves again.
const HIGH_POLAR_BAND_DEG: f64 = 80.0;

/// Fraction of the planet radius below which lon/lat storage halves.
const CORE_FRACTION: f64 = 0.25;

/// Fraction of the planet radius below which lon/lat storage halves again.
const DEEP_CORE_FRACTION: f64 = 0.125;

/// Number of stored cells per axis in one chunk.
///
/// Each component divides [`CHUNK_EDGE`] evenly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Resolution {
    /// Stored longitude cells.
    pub lon: i32,
    /// Stored latitude cells.
    pub lat: i32,
    /// Stored altitude cells (always [`CHUNK_EDGE`]).
    pub alt: i32,
}

impl Resolution {
    /// Full resolution: `CHUNK_EDGE` samples on every axis.
    pub const FULL: Self = Self {
        lon: CHUNK_EDGE,
        lat: CHUNK_EDGE,
        alt: CHUNK_EDGE,
    };

    /// Resolve the stored cell counts for a chunk from two band measurements.
    ///
    /// `degrees_from_equator` is the angular distance of the chunk's latitude
    /// band center from the equator; `radius_fraction` is the chunk's altitude
    /// band midpoint, in cells above the grid bottom, divided by the planet
    /// radius.
    pub fn from_bands(degrees_from_equator: f64, radius_fraction: f64) -> Self {
        let mut res = Self::FULL;
        if degrees_from_equator >= POLAR_BAND_DEG {
            res.lon /= 2;
        }
        if degrees_from_equator >= HIGH_POLAR_BAND_DEG {
            res.lon /= 2;
        }
        if radius_fraction < CORE_FRACTION {
            res.lon /= 2;
            res.lat /= 2;
        }
        if radius_fraction < DEEP_CORE_FRACTION {
            res.lon /= 2;
            res.lat /= 2;
        }
        res
    }

    /// Index-space width, in cells, covered by one stored longitude sample.
    pub fn lon_width(&self) -> i32 {
        CHUNK_EDGE / self.lon
    }

    /// Index-space width, in cells, covered by one stored latitude sample.
    pub fn lat_width(&self) -> i32 {
        CHUNK_EDGE / self.lat
    }

    /// Total number of stored cells.
    pub fn volume(&self) -> usize {
        (self.lon * self.lat * self.alt) as usize
    }
}
