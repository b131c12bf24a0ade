//! A scripted avatar for clients without input or rendering.
//!
//! The walker strolls east along a planet's equator, standing one cell
//! above the surface, and keeps the chunks around it loaded.

use std::sync::Arc;

use rand::Rng;
use sphaera_coords::{CellLoc, ChunkIndex, PlanetGrid};
use sphaera_voxel::{GEOMETRY_LAT_SAMPLES, GEOMETRY_LON_SAMPLES, PlayerState};
use sphaera_world::{LoadMode, Planet, WorldError};

/// Longitude cells walked per second.
pub const WALK_SPEED: f64 = 2.0;

/// A name for players who did not pick one.
pub fn random_name(rng: &mut impl Rng) -> String {
    format!("player-{:04}", rng.random_range(0..10_000))
}

/// Chunks within `radius` of `center` on every axis that exist on `grid`.
///
/// Longitude wraps around the planet; latitude and altitude are clipped.
pub fn chunks_around(grid: &PlanetGrid, center: ChunkIndex, radius: i32) -> Vec<ChunkIndex> {
    let counts = grid.chunk_counts();
    let mut out = Vec::new();
    for dlon in -radius..=radius {
        for dlat in -radius..=radius {
            for dalt in -radius..=radius {
                let index = ChunkIndex::new(
                    (center.lon + dlon).rem_euclid(counts.lon),
                    center.lat + dlat,
                    center.alt + dalt,
                );
                if grid.contains_chunk(index) {
                    out.push(index);
                }
            }
        }
    }
    out.sort();
    out.dedup();
    out
}

/// Avatar walking the equator of one planet.
pub struct Walker {
    planet: Arc<Planet>,
    name: String,
    lon: f64,
}

impl Walker {
    /// Start at longitude zero.
    pub fn new(planet: Arc<Planet>, name: impl Into<String>) -> Self {
        Self {
            planet,
            name: name.into(),
            lon: 0.0,
        }
    }

    /// Continue from a saved state's longitude.
    pub fn resume(planet: Arc<Planet>, state: &PlayerState) -> Self {
        let position = glam::Vec3::from_array(state.position).as_dvec3();
        let lon = planet.grid().cartesian_to_cell_loc(position).lon;
        Self {
            planet,
            name: state.name.clone(),
            lon,
        }
    }

    /// The planet being walked.
    pub fn planet(&self) -> &Arc<Planet> {
        &self.planet
    }

    /// Advance by `dt` seconds and return the new avatar state.
    ///
    /// Chunks around the new position are requested in the background, so
    /// on a mirrored planet this never waits on the network.
    pub fn step(&mut self, dt: f64) -> Result<PlayerState, WorldError> {
        let grid = self.planet.grid();
        let lon_cells = f64::from(grid.lon_cells());
        self.lon = (self.lon + WALK_SPEED * dt).rem_euclid(lon_cells);

        let here = CellLoc {
            lon: self.lon,
            lat: f64::from(grid.lat_cells()) / 2.0,
            alt: self.surface_alt()? + 1.0,
        };
        let ahead = CellLoc {
            lon: self.lon + 1.0,
            ..here
        };
        let position = grid.cell_loc_to_cartesian(here);
        let look_dir = (grid.cell_loc_to_cartesian(ahead) - position).normalize_or_zero();

        let (center, _) = grid.locate(grid.nearest_cell_center(here));
        for index in chunks_around(grid, center, 1) {
            self.planet.get_chunk(index, LoadMode::Background)?;
        }

        Ok(PlayerState {
            name: self.name.clone(),
            position: position.as_vec3().to_array(),
            look_dir: look_dir.as_vec3().to_array(),
        })
    }

    /// Surface altitude under the walker, or mid-height until the planet's
    /// geometry is available.
    fn surface_alt(&self) -> Result<f64, WorldError> {
        let grid = self.planet.grid();
        let fallback = f64::from(grid.alt_cells()) / 2.0;
        let Some(geometry) = self.planet.geometry(LoadMode::Background)? else {
            return Ok(fallback);
        };
        let sample = (self.lon / f64::from(grid.lon_cells()) * GEOMETRY_LON_SAMPLES as f64) as usize;
        Ok(geometry
            .surface(sample % GEOMETRY_LON_SAMPLES, GEOMETRY_LAT_SAMPLES / 2)
            .map_or(fallback, |(_, alt)| f64::from(alt)))
    }
}
