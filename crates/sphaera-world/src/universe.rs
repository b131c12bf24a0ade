//! Registry of planets and their orbital motion.

use std::collections::BTreeMap;
use std::f64::consts::TAU;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

use glam::DVec3;
use sphaera_voxel::{PlanetId, PlanetState};

use crate::WorldServices;
use crate::planet::Planet;

/// All planets of one world.
pub struct Universe {
    planets: RwLock<BTreeMap<PlanetId, Arc<Planet>>>,
    services: Arc<WorldServices>,
}

impl Universe {
    /// Create an empty universe whose planets share `services`.
    pub fn new(services: Arc<WorldServices>) -> Self {
        Self {
            planets: RwLock::new(BTreeMap::new()),
            services,
        }
    }

    /// Shared collaborators.
    pub fn services(&self) -> &Arc<WorldServices> {
        &self.services
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<PlanetId, Arc<Planet>>> {
        self.planets.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new planet under the next sequential id.
    pub fn add_planet(&self, mut state: PlanetState) -> Arc<Planet> {
        let mut planets = self.planets.write().unwrap_or_else(PoisonError::into_inner);
        let next = planets.keys().next_back().map_or(0, |id| id.0 + 1);
        state.id = PlanetId(next);
        let planet = Arc::new(Planet::new(state, Arc::clone(&self.services)));
        planets.insert(planet.id(), Arc::clone(&planet));
        tracing::info!("Registered planet {} '{}'", planet.id(), planet.state().name);
        planet
    }

    /// Register a planet under the id it already carries, replacing any
    /// planet with that id.
    pub fn insert_planet(&self, state: PlanetState) -> Arc<Planet> {
        let planet = Arc::new(Planet::new(state, Arc::clone(&self.services)));
        self.planets
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(planet.id(), Arc::clone(&planet));
        planet
    }

    /// Planet by id.
    pub fn planet(&self, id: PlanetId) -> Option<Arc<Planet>> {
        self.read().get(&id).cloned()
    }

    /// All planets in id order.
    pub fn planets(&self) -> Vec<Arc<Planet>> {
        self.read().values().cloned().collect()
    }

    /// States of all planets in id order.
    pub fn planet_states(&self) -> Vec<PlanetState> {
        self.read().values().map(|p| p.state().clone()).collect()
    }

    /// Position of a planet at `time` seconds.
    ///
    /// A root planet sits at the origin; any other planet sits on a circle
    /// of radius `orbit_distance` around its parent. Same `time`, same
    /// answer. A missing parent is treated as the origin, and an orbit cycle
    /// stops after visiting every planet once.
    pub fn location_at(&self, time: f64, id: PlanetId) -> Option<DVec3> {
        let planets = self.read();
        let mut current = planets.get(&id)?;
        let mut position = DVec3::ZERO;
        for _ in 0..planets.len() {
            let state = current.state();
            if state.is_root() {
                break;
            }
            let angle = TAU * time.rem_euclid(state.orbit_seconds) / state.orbit_seconds;
            position += DVec3::new(angle.cos(), angle.sin(), 0.0) * state.orbit_distance;
            match planets.get(&state.orbit_parent) {
                Some(parent) => current = parent,
                None => break,
            }
        }
        Some(position)
    }

    /// Spin angle of a planet about its own axis at `time` seconds, in radians.
    pub fn rotation_at(&self, time: f64, id: PlanetId) -> Option<f64> {
        let planet = self.planet(id)?;
        let period = planet.state().rotation_seconds;
        if period <= 0.0 {
            return Some(0.0);
        }
        Some(TAU * time.rem_euclid(period) / period)
    }
}
