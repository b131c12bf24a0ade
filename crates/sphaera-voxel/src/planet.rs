//! Persistent description of a planet.

use serde::{Deserialize, Serialize};
use sphaera_coords::PlanetGrid;

/// Numeric planet identifier, unique within a universe.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlanetId(pub u32);

impl std::fmt::Display for PlanetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Everything needed to recreate a planet.
///
/// Immutable once the planet is registered. Unknown fields are ignored and
/// missing ones take defaults, so older records keep loading.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanetState {
    /// Identifier, assigned on registration.
    pub id: PlanetId,
    /// Display name.
    pub name: String,
    /// Name of the cell generator.
    pub generator: String,
    /// Physical radius.
    pub radius: f64,
    /// Requested altitude cell count.
    pub alt_cells: i32,
    /// Seed for the noise field.
    pub seed: i64,
    /// Planet this one orbits. A planet orbiting itself is a root.
    #[serde(alias = "orbit_planet")]
    pub orbit_parent: PlanetId,
    /// Orbit radius.
    pub orbit_distance: f64,
    /// Seconds per orbit.
    pub orbit_seconds: f64,
    /// Seconds per rotation about the planet's own axis.
    pub rotation_seconds: f64,
}

impl Default for PlanetState {
    fn default() -> Self {
        Self {
            id: PlanetId(0),
            name: "Spawn".to_string(),
            generator: "sphere".to_string(),
            radius: 64.0,
            alt_cells: 64,
            seed: 1,
            orbit_parent: PlanetId(0),
            orbit_distance: 0.0,
            orbit_seconds: 0.0,
            rotation_seconds: 0.0,
        }
    }
}

impl PlanetState {
    /// Grid derived from this planet's radius and altitude cell count.
    pub fn grid(&self) -> PlanetGrid {
        PlanetGrid::new(self.radius, self.alt_cells)
    }

    /// Whether this planet sits at the root of its orbit tree.
    pub fn is_root(&self) -> bool {
        self.orbit_parent == self.id || self.orbit_seconds <= 0.0
    }
}
