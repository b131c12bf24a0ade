//! Coarse surface map of a planet for distant viewing.

use serde::{Deserialize, Serialize};
use sphaera_coords::{CellLoc, PlanetGrid};

use crate::material::Material;

/// Longitude samples in a [`PlanetGeometry`].
pub const GEOMETRY_LON_SAMPLES: usize = 64;

/// Latitude samples in a [`PlanetGeometry`], pole to pole inclusive.
pub const GEOMETRY_LAT_SAMPLES: usize = 33;

/// Surface altitude and material on a coarse lon/lat grid.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanetGeometry {
    /// Surface material per sample, `[lon][lat]`.
    pub material: Vec<Vec<Material>>,
    /// Altitude cell of the surface per sample, `[lon][lat]`.
    pub altitude: Vec<Vec<i32>>,
}

impl PlanetGeometry {
    /// Scan each sampled column down from the top altitude until `sample`
    /// returns something other than air.
    pub fn scan(grid: &PlanetGrid, mut sample: impl FnMut(CellLoc) -> Material) -> Self {
        let lon_cells = f64::from(grid.lon_cells());
        let lat_cells = f64::from(grid.lat_cells());
        let top = f64::from(grid.alt_cells() - 1);
        let mut geom = Self {
            material: Vec::with_capacity(GEOMETRY_LON_SAMPLES),
            altitude: Vec::with_capacity(GEOMETRY_LON_SAMPLES),
        };
        for lon in 0..GEOMETRY_LON_SAMPLES {
            let mut materials = Vec::with_capacity(GEOMETRY_LAT_SAMPLES);
            let mut altitudes = Vec::with_capacity(GEOMETRY_LAT_SAMPLES);
            for lat in 0..GEOMETRY_LAT_SAMPLES {
                let mut loc = CellLoc {
                    lon: (lon_cells * lon as f64 / GEOMETRY_LON_SAMPLES as f64).floor(),
                    lat: (lat_cells * lat as f64 / (GEOMETRY_LAT_SAMPLES - 1) as f64).floor(),
                    alt: top,
                };
                let mut m = sample(loc);
                while m.is_air() && loc.alt > 0.0 {
                    loc.alt -= 1.0;
                    m = sample(loc);
                }
                materials.push(m);
                altitudes.push(loc.alt as i32);
            }
            geom.material.push(materials);
            geom.altitude.push(altitudes);
        }
        geom
    }

    /// Surface sample at `(lon, lat)`, if in range.
    pub fn surface(&self, lon: usize, lat: usize) -> Option<(Material, i32)> {
        let m = *self.material.get(lon)?.get(lat)?;
        let a = *self.altitude.get(lon)?.get(lat)?;
        Some((m, a))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_finds_flat_surface() {
        let grid = PlanetGrid::new(64.0, 64);
        let geom = PlanetGeometry::scan(&grid, |loc| {
            if loc.alt < 20.0 { Material::STONE } else { Material::AIR }
        });
        assert_eq!(geom.material.len(), GEOMETRY_LON_SAMPLES);
        assert_eq!(geom.altitude[0].len(), GEOMETRY_LAT_SAMPLES);
        assert_eq!(geom.surface(10, 16), Some((Material::STONE, 19)));
        assert_eq!(geom.surface(63, 32), Some((Material::STONE, 19)));
        assert_eq!(geom.surface(64, 0), None);
    }

    #[test]
    fn test_scan_of_empty_planet_bottoms_out() {
        let grid = PlanetGrid::new(64.0, 64);
        let geom = PlanetGeometry::scan(&grid, |_| Material::AIR);
        assert_eq!(geom.surface(5, 5), Some((Material::AIR, 0)));
    }

    #[test]
    fn test_latitude_samples_reach_both_poles() {
        let grid = PlanetGrid::new(64.0, 64);
        let mut lats = Vec::new();
        PlanetGeometry::scan(&grid, |loc| {
            lats.push(loc.lat);
            Material::STONE
        });
        assert_eq!(lats.first().copied(), Some(0.0));
        assert_eq!(lats.last().copied(), Some(f64::from(grid.lat_cells())));
    }
}
