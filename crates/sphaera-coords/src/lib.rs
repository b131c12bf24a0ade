//! Coordinate spaces of a spherical voxel planet.
//!
//! Three spaces are in play:
//!
//! - **spherical**: `(r, θ, φ)` with θ the polar angle from +Z and φ the
//!   azimuth in the XY plane, both in radians;
//! - **cell location** ([`CellLoc`]): fractional `(lon, lat, alt)` cell
//!   coordinates used for positioning before snapping to a cell;
//! - **indices** ([`CellIndex`], [`ChunkIndex`]): integer cell and chunk
//!   coordinates in planet-wide index space.
//!
//! All conversions live on [`PlanetGrid`], an immutable value derived from a
//! planet's radius and altitude-cell count. Chunks near the poles and the core
//! store fewer cells than the nominal [`CHUNK_EDGE`]; [`PlanetGrid::resolution`]
//! is the single function that decides how many.

mod grid;
mod index;
mod resolution;

pub use grid::{PlanetGrid, Spherical};
pub use index::{CHUNK_EDGE, CellIndex, CellLoc, ChunkIndex, LocalCell};
pub use resolution::Resolution;
