//! Grid dimensions of one planet and every transform between its spaces.

use std::f64::consts::{PI, TAU};

use glam::DVec3;

use crate::index::{CHUNK_EDGE, CellIndex, CellLoc, ChunkIndex, LocalCell};
use crate::resolution::Resolution;

/// Physical altitude covered by one altitude cell.
pub const ALT_DELTA: f64 = 1.0;

/// Largest latitude, in degrees from the equator, covered by the grid.
pub const LAT_MAX_DEG: f64 = 90.0;

/// A spherical coordinate triple. Angles are in radians.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Spherical {
    /// Distance from the planet center.
    pub r: f64,
    /// Polar angle measured from +Z, in `[0, π]`.
    pub theta: f64,
    /// Azimuth in the XY plane.
    pub phi: f64,
}

/// Derived grid of a planet: cell counts per axis plus the transforms.
///
/// Every axis count is a multiple of [`CHUNK_EDGE`], so every chunk spans a
/// full `CHUNK_EDGE³` block of index space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlanetGrid {
    radius: f64,
    lon_cells: i32,
    lat_cells: i32,
    alt_cells: i32,
    alt_min: f64,
}

fn round_down_to_chunk(cells: i32) -> i32 {
    cells / CHUNK_EDGE * CHUNK_EDGE
}

impl PlanetGrid {
    /// Derive the grid of a planet with the given physical radius and
    /// requested number of altitude cells.
    pub fn new(radius: f64, alt_cells: i32) -> Self {
        let alt_cells = round_down_to_chunk(alt_cells.max(0));
        // Longitude circumference is taken at mid-radius.
        let lon_cells = round_down_to_chunk((TAU * 0.75 * (0.5 * radius) + 0.5) as i32);
        let lat_cells = round_down_to_chunk(((LAT_MAX_DEG / 90.0) * PI * (0.5 * radius)) as i32);
        Self {
            radius,
            lon_cells,
            lat_cells,
            alt_cells,
            alt_min: radius - f64::from(alt_cells) * ALT_DELTA,
        }
    }

    /// Physical radius of the planet.
    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Longitude cell count.
    pub fn lon_cells(&self) -> i32 {
        self.lon_cells
    }

    /// Latitude cell count.
    pub fn lat_cells(&self) -> i32 {
        self.lat_cells
    }

    /// Altitude cell count.
    pub fn alt_cells(&self) -> i32 {
        self.alt_cells
    }

    /// Physical radius of the bottom of altitude cell 0.
    pub fn alt_min(&self) -> f64 {
        self.alt_min
    }

    /// Number of chunks along each axis.
    pub fn chunk_counts(&self) -> ChunkIndex {
        ChunkIndex {
            lon: self.lon_cells / CHUNK_EDGE,
            lat: self.lat_cells / CHUNK_EDGE,
            alt: self.alt_cells / CHUNK_EDGE,
        }
    }

    /// Whether `index` names a chunk of this planet.
    pub fn contains_chunk(&self, index: ChunkIndex) -> bool {
        let n = self.chunk_counts();
        (0..n.lon).contains(&index.lon)
            && (0..n.lat).contains(&index.lat)
            && (0..n.alt).contains(&index.alt)
    }

    /// Wrap longitude into `[0, lon_cells)`. Latitude and altitude are left alone.
    pub fn wrap_cell(&self, cell: CellIndex) -> CellIndex {
        CellIndex {
            lon: cell.lon.rem_euclid(self.lon_cells.max(1)),
            ..cell
        }
    }

    /// Wrap a fractional longitude into `[0, lon_cells)`.
    pub fn wrap_loc(&self, loc: CellLoc) -> CellLoc {
        CellLoc {
            lon: loc.lon.rem_euclid(f64::from(self.lon_cells.max(1))),
            ..loc
        }
    }

    // -----------------------------------------------------------------------
    // Spherical <-> cell location
    // -----------------------------------------------------------------------

    /// Convert spherical coordinates to a fractional cell location.
    ///
    /// Latitude carries a half-cell offset so that integer latitudes sit on
    /// band centers.
    pub fn spherical_to_cell_loc(&self, s: Spherical) -> CellLoc {
        let phi = if s.phi < 0.0 { s.phi + TAU } else { s.phi };
        CellLoc {
            lon: phi * f64::from(self.lon_cells) / TAU,
            lat: (s.theta.to_degrees() - 90.0 + LAT_MAX_DEG) * f64::from(self.lat_cells)
                / (2.0 * LAT_MAX_DEG)
                - 0.5,
            alt: (s.r - self.alt_min) / ALT_DELTA,
        }
    }

    /// Exact inverse of [`spherical_to_cell_loc`](Self::spherical_to_cell_loc).
    pub fn cell_loc_to_spherical(&self, loc: CellLoc) -> Spherical {
        let theta_deg = (90.0 - LAT_MAX_DEG)
            + ((loc.lat + 0.5) / f64::from(self.lat_cells)) * 2.0 * LAT_MAX_DEG;
        Spherical {
            r: loc.alt * ALT_DELTA + self.alt_min,
            theta: theta_deg.to_radians(),
            phi: TAU * loc.lon / f64::from(self.lon_cells),
        }
    }

    /// Snap a location to the nearest cell center.
    ///
    /// Longitude wraps around; latitude and altitude are clamped to the grid.
    pub fn nearest_cell_center(&self, loc: CellLoc) -> CellIndex {
        let snapped = CellIndex {
            lon: (loc.lon + 0.5).floor() as i32,
            lat: (loc.lat + 0.5).floor() as i32,
            alt: (loc.alt + 0.5).floor() as i32,
        };
        let wrapped = self.wrap_cell(snapped);
        CellIndex {
            lat: wrapped.lat.clamp(0, (self.lat_cells - 1).max(0)),
            alt: wrapped.alt.clamp(0, (self.alt_cells - 1).max(0)),
            ..wrapped
        }
    }

    // -----------------------------------------------------------------------
    // Cartesian helpers
    // -----------------------------------------------------------------------

    /// Planet-local cartesian position of a cell location.
    pub fn cell_loc_to_cartesian(&self, loc: CellLoc) -> DVec3 {
        let s = self.cell_loc_to_spherical(loc);
        DVec3::new(
            s.r * s.theta.sin() * s.phi.cos(),
            s.r * s.theta.sin() * s.phi.sin(),
            s.r * s.theta.cos(),
        )
    }

    /// Planet-local cartesian position of a cell.
    pub fn cell_index_to_cartesian(&self, cell: CellIndex) -> DVec3 {
        self.cell_loc_to_cartesian(cell.into())
    }

    /// Fractional cell location of a planet-local cartesian position.
    pub fn cartesian_to_cell_loc(&self, p: DVec3) -> CellLoc {
        let r = p.length();
        let theta = if r > 0.0 { (p.z / r).clamp(-1.0, 1.0).acos() } else { 0.0 };
        self.spherical_to_cell_loc(Spherical {
            r,
            theta,
            phi: p.y.atan2(p.x),
        })
    }

    // -----------------------------------------------------------------------
    // Chunk-local addressing
    // -----------------------------------------------------------------------

    /// Stored cell counts for the chunk at `index`.
    ///
    /// Every computation that maps a cell into a chunk's array goes through
    /// here so the sub-sampling rule lives in one place.
    pub fn resolution(&self, index: ChunkIndex) -> Resolution {
        let band_center_deg = (90.0 - LAT_MAX_DEG)
            + ((f64::from(index.lat) + 0.5) * f64::from(CHUNK_EDGE) / f64::from(self.lat_cells))
                * 2.0
                * LAT_MAX_DEG;
        // Measured in altitude cells from the bottom of the grid, not from
        // the planet center, so the band layout ignores `alt_min`.
        let mid_alt = (f64::from(index.alt) + 0.5) * f64::from(CHUNK_EDGE);
        Resolution::from_bands((band_center_deg - 90.0).abs(), mid_alt / self.radius)
    }

    /// Owning chunk of `cell` and the cell's slot in that chunk's array.
    ///
    /// `cell` must already have its longitude wrapped.
    pub fn locate(&self, cell: CellIndex) -> (ChunkIndex, LocalCell) {
        let chunk = cell.chunk();
        let res = self.resolution(chunk);
        let local = LocalCell {
            lon: cell.lon.rem_euclid(CHUNK_EDGE) / res.lon_width(),
            lat: cell.lat.rem_euclid(CHUNK_EDGE) / res.lat_width(),
            alt: cell.alt.rem_euclid(CHUNK_EDGE),
        };
        (chunk, local)
    }

    /// Cell location sampled by the stored slot `local` of chunk `index`.
    pub fn sample_loc(&self, index: ChunkIndex, local: LocalCell) -> CellLoc {
        let res = self.resolution(index);
        CellLoc {
            lon: f64::from(index.lon * CHUNK_EDGE + local.lon * res.lon_width()),
            lat: f64::from(index.lat * CHUNK_EDGE + local.lat * res.lat_width()),
            alt: f64::from(index.alt * CHUNK_EDGE + local.alt),
        }
    }
}
