//! Server side of the sync protocol.

use std::sync::Arc;
use std::time::{Duration, Instant};

use sphaera_coords::ChunkIndex;
use sphaera_net::{CellUpdate, ClientLink, ClientRequest, ConnectionId, Hit, PeerRoster, ServerApi};
use sphaera_storage::WorldStore;
use sphaera_terrain::system_preset;
use sphaera_voxel::{ChunkData, PlanetGeometry, PlanetId, PlanetState, PlayerState};
use sphaera_world::{LoadMode, PeerId, Planet, Propagation, Universe, WorldError, WorldServices};

use crate::error::SyncError;
use crate::remote::{RosterFanout, persist_players};

/// How long a request waits on a chunk another request is already loading.
const LOAD_WAIT: Duration = Duration::from_secs(30);
const LOAD_POLL: Duration = Duration::from_millis(2);

/// Preset created when the configured system name is not registered.
const FALLBACK_SYSTEM: &str = "planet";

/// Fill `universe` from the planets in `store`, or from the `system`
/// preset when the store has none. Preset planets are saved right away.
/// An unregistered `system` falls back to the single-planet preset.
pub fn bootstrap_universe(
    universe: &Universe,
    store: &dyn WorldStore,
    system: &str,
    seed: i64,
) -> Result<(), SyncError> {
    let stored = store.load_planets()?;
    if !stored.is_empty() {
        tracing::info!("Loaded {} planets from storage", stored.len());
        for state in stored {
            universe.insert_planet(state);
        }
        return Ok(());
    }

    let (system, preset) = match system_preset(system, seed) {
        Some(preset) => (system, preset),
        None => {
            tracing::warn!("Unknown planetary system '{system}', using '{FALLBACK_SYSTEM}'");
            (FALLBACK_SYSTEM, system_preset(FALLBACK_SYSTEM, seed).unwrap_or_default())
        }
    };
    tracing::info!("Creating '{system}' system with seed {seed}");
    for state in preset {
        store.save_planet(&state)?;
        universe.insert_planet(state);
    }
    Ok(())
}

/// Retry `attempt` while it reports "still loading".
///
/// Authoritative loads finish on the thread that started them, so another
/// request for the same chunk only has to wait for that thread.
fn wait_ready<T>(
    mut attempt: impl FnMut() -> Result<Option<T>, WorldError>,
) -> Result<T, String> {
    let deadline = Instant::now() + LOAD_WAIT;
    loop {
        match attempt() {
            Ok(Some(value)) => return Ok(value),
            Ok(None) if Instant::now() < deadline => std::thread::sleep(LOAD_POLL),
            Ok(None) => return Err("timed out waiting for load".into()),
            Err(e) => return Err(e.to_string()),
        }
    }
}

/// Answers client calls from an authoritative universe.
pub struct WorldService {
    universe: Arc<Universe>,
    store: Arc<dyn WorldStore>,
    roster: Arc<PeerRoster>,
}

impl WorldService {
    /// Build an authoritative universe over `store` whose edits fan out to
    /// every connected player.
    pub fn new(store: Arc<dyn WorldStore>, max_resident_chunks: Option<usize>) -> Self {
        let roster = Arc::new(PeerRoster::new());
        let services = WorldServices::authoritative(Arc::clone(&store))
            .with_max_resident_chunks(max_resident_chunks);
        let fanout = RosterFanout::new(
            Arc::clone(&roster),
            Arc::clone(&store),
            services.faults.clone(),
        );
        let services = services.with_fanout(Arc::new(fanout));
        Self {
            universe: Arc::new(Universe::new(Arc::new(services))),
            store,
            roster,
        }
    }

    /// The authoritative universe.
    pub fn universe(&self) -> &Arc<Universe> {
        &self.universe
    }

    /// Connected players.
    pub fn roster(&self) -> &Arc<PeerRoster> {
        &self.roster
    }

    /// Save every connected player's state, e.g. before shutting down.
    pub fn persist_connected_players(&self) {
        persist_players(
            self.store.as_ref(),
            &self.universe.services().faults,
            &self.roster.states(),
        );
    }

    fn planet(&self, id: PlanetId) -> Result<Arc<Planet>, String> {
        self.universe
            .planet(id)
            .ok_or_else(|| WorldError::UnknownPlanet(id).to_string())
    }

    fn broadcast(&self, request: ClientRequest, except: Option<ConnectionId>) {
        let pruned = self.roster.broadcast(request, except);
        persist_players(self.store.as_ref(), &self.universe.services().faults, &pruned);
    }
}

impl ServerApi for WorldService {
    fn get_planet_states(&self) -> Vec<PlanetState> {
        self.universe.planet_states()
    }

    fn get_chunk(&self, planet: PlanetId, index: ChunkIndex) -> Result<ChunkData, String> {
        let planet = self.planet(planet)?;
        if !planet.grid().contains_chunk(index) {
            return Err(format!("chunk {index:?} is outside planet {}", planet.id()));
        }
        let chunk = wait_ready(|| planet.get_chunk(index, LoadMode::Blocking))?;
        Ok(chunk.to_data())
    }

    fn get_planet_geometry(&self, planet: PlanetId) -> Result<PlanetGeometry, String> {
        let planet = self.planet(planet)?;
        let geometry = wait_ready(|| planet.geometry(LoadMode::Blocking))?;
        Ok(PlanetGeometry::clone(&geometry))
    }

    fn set_cell_material(&self, peer: ConnectionId, update: CellUpdate) -> Result<bool, String> {
        let planet = self.planet(update.planet)?;
        planet
            .set_cell_material(
                update.cell,
                update.material,
                Propagation::BroadcastExcept(PeerId(peer.0)),
            )
            .map_err(|e| e.to_string())
    }

    fn update_person_state(&self, peer: ConnectionId, state: PlayerState) {
        self.roster.update_state(peer, state.clone());
        self.broadcast(ClientRequest::UpdatePersonState(state), Some(peer));
    }

    fn send_text(&self, peer: ConnectionId, text: String) {
        tracing::info!("Chat from {peer:?}: {text}");
        self.broadcast(ClientRequest::SendText(text), Some(peer));
    }

    fn hit_player(&self, peer: ConnectionId, hit: Hit) {
        tracing::debug!("'{}' hit '{}' for {}", hit.from, hit.target, hit.amount);
        self.broadcast(ClientRequest::HitPlayer(hit), Some(peer));
    }

    fn peer_connected(&self, peer: ConnectionId, state: PlayerState, link: ClientLink) {
        // Introduce everyone already here to the newcomer, then the reverse.
        for other in self.roster.states() {
            if link.notify(ClientRequest::UpdatePersonState(other)).is_err() {
                return;
            }
        }
        self.roster.register(peer, state.clone(), link);
        self.broadcast(ClientRequest::UpdatePersonState(state), Some(peer));
    }

    fn peer_disconnected(&self, peer: ConnectionId) {
        let Some(state) = self.roster.remove(peer) else {
            return;
        };
        tracing::info!("Player '{}' left", state.name);
        let name = state.name.clone();
        persist_players(
            self.store.as_ref(),
            &self.universe.services().faults,
            &[state],
        );
        self.broadcast(ClientRequest::PersonDisconnected(name), None);
    }
}
