//! Planetary-system presets used to seed a new world.

use sphaera_voxel::{PlanetId, PlanetState};

/// Names accepted by [`system_preset`].
pub const SYSTEM_PRESETS: [&str; 4] = ["default", "planet", "moon", "sun-moon"];

fn planet(
    id: u32,
    name: &str,
    generator: &str,
    radius: f64,
    seed: i64,
) -> PlanetState {
    PlanetState {
        id: PlanetId(id),
        name: name.to_string(),
        generator: generator.to_string(),
        radius,
        alt_cells: radius as i32,
        seed,
        orbit_parent: PlanetId(id),
        orbit_distance: 0.0,
        orbit_seconds: 0.0,
        rotation_seconds: 0.0,
    }
}

/// Planets of the named preset, with ids `0..n` in registration order.
///
/// Every planet takes `seed`; returns `None` for an unknown preset.
pub fn system_preset(name: &str, seed: i64) -> Option<Vec<PlanetState>> {
    let system = match name {
        "default" => vec![
            PlanetState {
                rotation_seconds: 300.0,
                ..planet(0, "Spawn", "bumpy", 128.0, seed)
            },
            PlanetState {
                orbit_parent: PlanetId(0),
                orbit_distance: 1000.0,
                orbit_seconds: 1000.0,
                rotation_seconds: 500.0,
                ..planet(1, "Moon", "sphere", 64.0, seed)
            },
        ],
        "planet" => vec![PlanetState {
            rotation_seconds: 10.0,
            ..planet(0, "Spawn", "bumpy", 64.0, seed)
        }],
        "moon" => vec![
            PlanetState {
                rotation_seconds: 10.0,
                ..planet(0, "Spawn", "bumpy", 64.0, seed)
            },
            PlanetState {
                orbit_parent: PlanetId(0),
                orbit_distance: 100.0,
                orbit_seconds: 5.0,
                ..planet(1, "Moon", "sphere", 32.0, seed)
            },
        ],
        "sun-moon" => vec![
            PlanetState {
                orbit_parent: PlanetId(2),
                orbit_distance: 300.0,
                orbit_seconds: 100.0,
                rotation_seconds: 10.0,
                ..planet(0, "Spawn", "bumpy", 64.0, seed)
            },
            PlanetState {
                orbit_parent: PlanetId(0),
                orbit_distance: 100.0,
                orbit_seconds: 5.0,
                ..planet(1, "Moon", "sphere", 32.0, seed)
            },
            planet(2, "Sun", "sphere", 128.0, seed),
        ],
        _ => return None,
    };
    Some(system)
}
