//! Procedural planet content: cell generators, chunk generation, and
//! planetary-system presets.

mod generate;
mod generators;
mod presets;

pub use generate::{SOLID_CORE_CELLS, generate_chunk, generate_geometry};
pub use generators::{
    Bumpy, Caves, CellGenerator, GENERATOR_NAMES, Rings, Rocks, Sphere, generator_for,
};
pub use presets::{SYSTEM_PRESETS, system_preset};
