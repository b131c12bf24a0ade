//! Chunk and geometry generation.

use sphaera_coords::{CHUNK_EDGE, ChunkIndex, PlanetGrid};
use sphaera_voxel::{Chunk, Material, PlanetGeometry};

use crate::generators::CellGenerator;

/// Altitude cells below this are always solid, whatever the generator says.
pub const SOLID_CORE_CELLS: i32 = 2;

/// Generate the chunk at `index`, honoring the chunk's resolution.
pub fn generate_chunk(grid: &PlanetGrid, generator: &dyn CellGenerator, index: ChunkIndex) -> Chunk {
    let resolution = grid.resolution(index);
    Chunk::from_fn(index, resolution, |local| {
        if index.alt * CHUNK_EDGE + local.alt < SOLID_CORE_CELLS {
            return Material::STONE;
        }
        generator.material_at(grid, grid.sample_loc(index, local))
    })
}

/// Build the coarse surface map straight from the generator.
pub fn generate_geometry(grid: &PlanetGrid, generator: &dyn CellGenerator) -> PlanetGeometry {
    PlanetGeometry::scan(grid, |loc| generator.material_at(grid, loc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::generator_for;
    use sphaera_coords::{CellIndex, LocalCell};

    #[test]
    fn test_regeneration_is_bit_identical() {
        let grid = PlanetGrid::new(64.0, 64);
        for name in ["bumpy", "caves", "rocks", "rings"] {
            let index = ChunkIndex::new(3, 2, 1);
            let a = generate_chunk(&grid, generator_for(name, 1).as_ref(), index);
            let b = generate_chunk(&grid, generator_for(name, 1).as_ref(), index);
            assert_eq!(a.to_data(), b.to_data(), "generator {name}");
        }
    }

    #[test]
    fn test_core_forced_solid() {
        let grid = PlanetGrid::new(64.0, 64);
        let chunk = generate_chunk(&grid, generator_for("rocks", 5).as_ref(), ChunkIndex::new(0, 3, 0));
        let res = chunk.resolution();
        for lon in 0..res.lon {
            for lat in 0..res.lat {
                assert_eq!(chunk.get(LocalCell::new(lon, lat, 0)), Material::STONE);
                assert_eq!(chunk.get(LocalCell::new(lon, lat, 1)), Material::STONE);
            }
        }
    }

    #[test]
    fn test_sub_sampled_chunk_has_reduced_volume() {
        let grid = PlanetGrid::new(64.0, 64);
        // Latitude band 0 lies 75° from the equator, altitude band 0 near the core.
        let chunk = generate_chunk(&grid, generator_for("sphere", 1).as_ref(), ChunkIndex::new(0, 0, 0));
        let res = chunk.resolution();
        assert_eq!((res.lon, res.lat, res.alt), (4, 8, 16));
        assert_eq!(chunk.to_data().materials.len(), 4 * 8 * 16);
    }

    #[test]
    fn test_sphere_chunk_cells() {
        let grid = PlanetGrid::new(64.0, 64);
        let generator = generator_for("sphere", 1);
        let (index, below) = grid.locate(CellIndex::new(10, 40, 20));
        let chunk = generate_chunk(&grid, generator.as_ref(), index);
        assert_eq!(chunk.get(below), Material::STONE);
        let (index, above) = grid.locate(CellIndex::new(10, 40, 40));
        let chunk = generate_chunk(&grid, generator.as_ref(), index);
        assert_eq!(chunk.get(above), Material::AIR);
    }

    #[test]
    fn test_geometry_of_sphere_sits_at_half_height() {
        let grid = PlanetGrid::new(64.0, 64);
        let geom = generate_geometry(&grid, generator_for("sphere", 1).as_ref());
        assert_eq!(geom.surface(0, 16), Some((Material::STONE, 31)));
    }
}
