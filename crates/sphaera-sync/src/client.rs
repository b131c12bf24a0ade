//! Client side of the sync protocol.

use std::collections::{BTreeMap, VecDeque};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use sphaera_net::{CellUpdate, ClientApi, Hit, MuxConfig, ServerRequest, ServerResponse, SyncClient};
use sphaera_voxel::PlayerState;
use sphaera_world::{Propagation, Universe, WorldServices};
use tokio::runtime::Handle;

use crate::error::SyncError;
use crate::remote::LinkRemote;

/// Health of a freshly spawned player.
pub const MAX_HEALTH: i32 = 10;

/// Chat lines kept by a session.
pub const MAX_CHAT_LINES: usize = 64;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// What one client knows about itself and everyone else.
///
/// Answers the server's calls. The mirrored universe is attached once the
/// planet list has arrived; edits pushed before that are dropped, since the
/// chunks they touch will be fetched with the edit already applied.
pub struct ClientSession {
    me: Mutex<PlayerState>,
    universe: OnceLock<Arc<Universe>>,
    peers: Mutex<BTreeMap<String, PlayerState>>,
    chat: Mutex<VecDeque<String>>,
    health: AtomicI32,
}

impl ClientSession {
    /// Session for the player described by `me`.
    pub fn new(me: PlayerState) -> Self {
        Self {
            me: Mutex::new(me),
            universe: OnceLock::new(),
            peers: Mutex::new(BTreeMap::new()),
            chat: Mutex::new(VecDeque::new()),
            health: AtomicI32::new(MAX_HEALTH),
        }
    }

    /// Attach the mirrored universe. Returns `false` if one was attached
    /// already.
    pub fn attach_universe(&self, universe: Arc<Universe>) -> bool {
        self.universe.set(universe).is_ok()
    }

    /// The mirrored universe, once attached.
    pub fn universe(&self) -> Option<&Arc<Universe>> {
        self.universe.get()
    }

    /// This player's name.
    pub fn name(&self) -> String {
        lock(&self.me).name.clone()
    }

    /// This player's current state.
    pub fn person_state(&self) -> PlayerState {
        lock(&self.me).clone()
    }

    /// Move this player. The name is kept.
    pub fn set_person_state(&self, state: PlayerState) {
        let mut me = lock(&self.me);
        me.position = state.position;
        me.look_dir = state.look_dir;
    }

    /// Latest state of every other player, ordered by name.
    pub fn peers(&self) -> Vec<PlayerState> {
        lock(&self.peers).values().cloned().collect()
    }

    /// Chat lines, oldest first.
    pub fn chat_log(&self) -> Vec<String> {
        lock(&self.chat).iter().cloned().collect()
    }

    /// Remaining health.
    pub fn health(&self) -> i32 {
        self.health.load(Ordering::Relaxed)
    }

    fn push_chat(&self, line: String) {
        let mut chat = lock(&self.chat);
        if chat.len() == MAX_CHAT_LINES {
            chat.pop_front();
        }
        chat.push_back(line);
    }

    /// Apply a hit. Health never exceeds [`MAX_HEALTH`], and dropping to
    /// zero respawns at full health.
    fn take_hit(&self, amount: i32) {
        let _ = self
            .health
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |health| {
                let next = health - amount;
                Some(if next <= 0 { MAX_HEALTH } else { next.min(MAX_HEALTH) })
            });
    }
}

impl ClientApi for ClientSession {
    fn get_person_state(&self) -> PlayerState {
        self.person_state()
    }

    fn set_cell_material(&self, update: CellUpdate) {
        let Some(planet) = self.universe().and_then(|u| u.planet(update.planet)) else {
            return;
        };
        if let Err(e) = planet.set_cell_material(update.cell, update.material, Propagation::Silent) {
            tracing::warn!("Applying pushed edit of {:?} failed: {e}", update.cell);
        }
    }

    fn update_person_state(&self, state: PlayerState) {
        if state.name == lock(&self.me).name {
            return;
        }
        lock(&self.peers).insert(state.name.clone(), state);
    }

    fn person_disconnected(&self, name: String) {
        if lock(&self.peers).remove(&name).is_some() {
            tracing::info!("'{name}' left");
        }
    }

    fn send_text(&self, text: String) {
        tracing::info!("{text}");
        self.push_chat(text);
    }

    fn hit_player(&self, hit: Hit) {
        if hit.target == lock(&self.me).name {
            self.take_hit(hit.amount);
        }
    }
}

/// A client connected to a server with its mirrored universe.
pub struct ClientWorld {
    /// Connection to the server.
    pub client: SyncClient,
    /// Answers the server's calls.
    pub session: Arc<ClientSession>,
    /// Mirror of the server's universe.
    pub universe: Arc<Universe>,
}

/// Connect to `addr` as `player` and mirror the server's planets.
pub async fn join(
    addr: SocketAddr,
    player: PlayerState,
    config: MuxConfig,
    max_resident_chunks: Option<usize>,
) -> Result<ClientWorld, SyncError> {
    let session = Arc::new(ClientSession::new(player));
    let client = SyncClient::connect(addr, session.clone(), config).await?;

    let remote = LinkRemote::new(client.link().clone(), Handle::current());
    let services =
        WorldServices::remote(Arc::new(remote)).with_max_resident_chunks(max_resident_chunks);
    let universe = Arc::new(Universe::new(Arc::new(services)));

    let states = match client.link().call(ServerRequest::GetPlanetStates).await? {
        ServerResponse::PlanetStates(states) => states,
        other => return Err(SyncError::UnexpectedReply(format!("{other:?}"))),
    };
    for state in states {
        universe.insert_planet(state);
    }
    session.attach_universe(Arc::clone(&universe));
    tracing::info!(
        "Joined {addr} as '{}' with {} planets",
        session.name(),
        universe.planets().len()
    );

    Ok(ClientWorld {
        client,
        session,
        universe,
    })
}

impl ClientWorld {
    /// Move this player and tell the server.
    pub fn publish_state(&self, state: PlayerState) -> Result<(), SyncError> {
        self.session.set_person_state(state);
        self.client
            .link()
            .notify(ServerRequest::UpdatePersonState(self.session.person_state()))?;
        Ok(())
    }

    /// Say something to everyone else.
    pub fn say(&self, text: &str) -> Result<(), SyncError> {
        let line = format!("{}: {text}", self.session.name());
        self.session.push_chat(line.clone());
        self.client.link().notify(ServerRequest::SendText(line))?;
        Ok(())
    }

    /// Hit another player.
    pub fn hit(&self, target: &str, amount: i32) -> Result<(), SyncError> {
        let hit = Hit {
            from: self.session.name(),
            target: target.to_string(),
            amount,
        };
        self.client.link().notify(ServerRequest::HitPlayer(hit))?;
        Ok(())
    }

    /// Close the connection.
    pub fn leave(&self) {
        self.client.disconnect();
    }
}
