//! Cell generators.
//!
//! A generator maps a cell location on a planet to a material. Generators are
//! pure functions of `(grid, loc)` plus a noise field seeded once from the
//! planet seed, so regenerating a chunk always yields the same cells.

use glam::DVec3;
use noise::{NoiseFn, Simplex};
use sphaera_coords::{CellLoc, PlanetGrid};
use sphaera_voxel::Material;

/// Evaluates the material of any cell location on a planet.
pub trait CellGenerator: Send + Sync {
    /// Registered name of this generator.
    fn name(&self) -> &'static str;

    /// Material at `loc`.
    fn material_at(&self, grid: &PlanetGrid, loc: CellLoc) -> Material;
}

/// Names accepted by [`generator_for`].
pub const GENERATOR_NAMES: [&str; 5] = ["sphere", "rings", "bumpy", "caves", "rocks"];

/// Build the generator registered as `name`, seeded from `seed`.
///
/// Unknown names fall back to [`Sphere`].
pub fn generator_for(name: &str, seed: i64) -> Box<dyn CellGenerator> {
    let noise = Simplex::new(noise_seed(seed));
    match name {
        "rings" => Box::new(Rings { noise }),
        "bumpy" => Box::new(Bumpy { noise }),
        "caves" => Box::new(Caves { noise }),
        "rocks" => Box::new(Rocks { noise }),
        _ => Box::new(Sphere),
    }
}

/// Fold a 64-bit planet seed into the 32 bits the noise field takes, so
/// seeds that differ only in their high half still diverge.
fn noise_seed(seed: i64) -> u32 {
    let bits = seed as u64;
    (bits ^ (bits >> 32)) as u32
}

fn fraction_of_height(grid: &PlanetGrid, loc: CellLoc) -> f64 {
    loc.alt / f64::from(grid.alt_cells())
}

/// Solid stone below half the altitude range, air above.
pub struct Sphere;

impl CellGenerator for Sphere {
    fn name(&self) -> &'static str {
        "sphere"
    }

    fn material_at(&self, grid: &PlanetGrid, loc: CellLoc) -> Material {
        if fraction_of_height(grid, loc) < 0.5 {
            Material::STONE
        } else {
            Material::AIR
        }
    }
}

/// A grassy ball with a noise-colored ring along the equator.
pub struct Rings {
    noise: Simplex,
}

impl CellGenerator for Rings {
    fn name(&self) -> &'static str {
        "rings"
    }

    fn material_at(&self, grid: &PlanetGrid, loc: CellLoc) -> Material {
        let h = fraction_of_height(grid, loc);
        if h < 0.5 {
            return Material::GRASS;
        }
        if h > 0.6 && loc.lat.floor() as i32 == grid.lat_cells() / 2 {
            if self.noise.get([loc.alt, 0.0]) > 0.1 {
                return Material::YELLOW_BLOCK;
            }
            return Material::RED_BLOCK;
        }
        Material::AIR
    }
}

/// Stone ball whose surface is displaced by 3-D noise.
pub struct Bumpy {
    noise: Simplex,
}

impl CellGenerator for Bumpy {
    fn name(&self) -> &'static str {
        "bumpy"
    }

    fn material_at(&self, grid: &PlanetGrid, loc: CellLoc) -> Material {
        let half = f64::from(grid.alt_cells()) / 2.0;
        let pos = grid.cell_loc_to_cartesian(loc).normalize_or_zero() * half;
        let p = pos * 0.1;
        let height = half + self.noise.get([p.x, p.y, p.z]) * 4.0;
        if loc.alt <= height {
            Material::STONE
        } else {
            Material::AIR
        }
    }
}

/// Noise-threshold interior with winding voids.
pub struct Caves {
    noise: Simplex,
}

impl CellGenerator for Caves {
    fn name(&self) -> &'static str {
        "caves"
    }

    fn material_at(&self, grid: &PlanetGrid, loc: CellLoc) -> Material {
        let half = f64::from(grid.alt_cells()) / 2.0;
        let p = grid.cell_loc_to_cartesian(loc) * 0.05;
        let height = (self.noise.get([p.x, p.y, p.z]) + 1.0) * half;
        if height > half {
            Material::STONE
        } else {
            Material::AIR
        }
    }
}

/// Scattered rock blobs where noise exceeds a threshold.
pub struct Rocks {
    noise: Simplex,
}

impl CellGenerator for Rocks {
    fn name(&self) -> &'static str {
        "rocks"
    }

    fn material_at(&self, grid: &PlanetGrid, loc: CellLoc) -> Material {
        let p: DVec3 = grid.cell_loc_to_cartesian(loc) * 0.05;
        if self.noise.get([p.x, p.y, p.z]) > 0.5 {
            Material::STONE
        } else {
            Material::AIR
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sphere_is_solid_below_half_height() {
        let grid = PlanetGrid::new(64.0, 64);
        let g = generator_for("sphere", 1);
        assert_eq!(g.material_at(&grid, CellLoc::new(3.0, 40.0, 20.0)), Material::STONE);
        assert_eq!(g.material_at(&grid, CellLoc::new(3.0, 40.0, 40.0)), Material::AIR);
    }

    #[test]
    fn test_unknown_generator_falls_back_to_sphere() {
        assert_eq!(generator_for("no-such-thing", 7).name(), "sphere");
        for name in GENERATOR_NAMES {
            assert_eq!(generator_for(name, 7).name(), name);
        }
    }

    #[test]
    fn test_rings_band_only_on_equator() {
        let grid = PlanetGrid::new(64.0, 64);
        let g = generator_for("rings", 1);
        let equator = f64::from(grid.lat_cells() / 2);
        assert_eq!(g.material_at(&grid, CellLoc::new(0.0, 10.0, 5.0)), Material::GRASS);
        assert_eq!(g.material_at(&grid, CellLoc::new(0.0, 10.0, 50.0)), Material::AIR);
        let band = g.material_at(&grid, CellLoc::new(0.0, equator, 50.0));
        assert!(band == Material::YELLOW_BLOCK || band == Material::RED_BLOCK);
    }

    #[test]
    fn test_bumpy_surface_near_half_height() {
        let grid = PlanetGrid::new(64.0, 64);
        let g = generator_for("bumpy", 3);
        for lon in (0..grid.lon_cells()).step_by(11) {
            let loc = |alt| CellLoc::new(f64::from(lon), 48.0, alt);
            assert_eq!(g.material_at(&grid, loc(27.0)), Material::STONE);
            assert_eq!(g.material_at(&grid, loc(37.0)), Material::AIR);
        }
    }

    #[test]
    fn test_same_seed_same_noise() {
        let grid = PlanetGrid::new(64.0, 64);
        let a = generator_for("rocks", 42);
        let b = generator_for("rocks", 42);
        for i in 0..200 {
            let loc = CellLoc::new(f64::from(i % 144), f64::from(i % 96), f64::from(i % 64));
            assert_eq!(a.material_at(&grid, loc), b.material_at(&grid, loc));
        }
    }

    #[test]
    fn test_high_seed_bits_change_terrain() {
        let low = 1_i64;
        let high = low | (1 << 32);
        assert_ne!(noise_seed(low), noise_seed(high));
        assert_ne!(noise_seed(-1), noise_seed(1));

        let grid = PlanetGrid::new(64.0, 64);
        let a = generator_for("caves", low);
        let b = generator_for("caves", high);
        let differs = (0..2000).any(|i| {
            let loc = CellLoc::new(f64::from(i % 144), f64::from(i % 96), f64::from(i % 64));
            a.material_at(&grid, loc) != b.material_at(&grid, loc)
        });
        assert!(differs);
    }
}
