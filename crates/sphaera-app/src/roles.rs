//! The three ways to run a world.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use sphaera_config::{Config, NetworkConfig};
use sphaera_net::{ConnectionState, FrameConfig, MuxConfig, ServerApi, ServerConfig, SyncServer};
use sphaera_storage::{FileStore, StorageError, WorldStore};
use sphaera_sync::{ClientWorld, SyncError, WorldService, bootstrap_universe, join};
use sphaera_voxel::PlayerState;
use sphaera_world::{FaultSignal, Planet, Universe, WorldError, WorldServices};
use tokio::sync::watch;

use crate::walker::Walker;

/// Reasons a role stops with a failure.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    World(#[from] WorldError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The server address did not resolve.
    #[error("cannot resolve '{0}'")]
    Resolve(String),

    /// The world has no planet to stand on.
    #[error("world has no planets")]
    NoPlanets,

    /// A load or persistence step failed in the background.
    #[error("world fault: {0}")]
    Fault(String),

    /// The server closed the connection.
    #[error("disconnected from server")]
    Disconnected,
}

fn mux_config(network: &NetworkConfig) -> MuxConfig {
    MuxConfig {
        frame: FrameConfig {
            max_payload_size: network.max_frame_bytes,
        },
        ..MuxConfig::default()
    }
}

fn update_period(hz: u32) -> Duration {
    Duration::from_secs_f64(1.0 / f64::from(hz.max(1)))
}

async fn resolve(network: &NetworkConfig) -> Result<SocketAddr, AppError> {
    let host = network.server_address.as_str();
    tokio::net::lookup_host((host, network.server_port))
        .await?
        .next()
        .ok_or_else(|| AppError::Resolve(host.to_string()))
}

fn open_store(config: &Config) -> Result<Arc<dyn WorldStore>, AppError> {
    let dir = config.world.world_dir();
    tracing::info!("World '{}' at {}", config.world.name, dir.display());
    Ok(Arc::new(FileStore::open(dir)?))
}

fn spawn_planet(universe: &Universe) -> Result<Arc<Planet>, AppError> {
    universe.planets().into_iter().next().ok_or(AppError::NoPlanets)
}

/// Resolves once a fault has been raised, with its reason.
async fn wait_for_fault(faults: &FaultSignal) -> String {
    let mut rx = faults.subscribe();
    loop {
        let current = rx.borrow_and_update().clone();
        if let Some(reason) = current {
            return reason;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

async fn until_disconnected(rx: &mut watch::Receiver<ConnectionState>) {
    let _ = rx
        .wait_for(|state| *state == ConnectionState::Disconnected)
        .await;
}

/// Host the authoritative world until interrupted or faulted.
pub async fn run_server(config: &Config) -> Result<(), AppError> {
    let store = open_store(config)?;
    let service = Arc::new(WorldService::new(
        Arc::clone(&store),
        config.world.max_resident_chunks,
    ));
    bootstrap_universe(
        service.universe(),
        store.as_ref(),
        &config.world.system,
        config.world.seed,
    )?;

    let network = &config.network;
    let server_config = ServerConfig {
        bind_addr: resolve(network).await?,
        max_connections: network.max_players as usize,
        handshake_timeout: Duration::from_secs(u64::from(network.handshake_timeout_seconds)),
        mux: mux_config(network),
    };
    let api: Arc<dyn ServerApi> = Arc::clone(&service) as Arc<dyn ServerApi>;
    let server = SyncServer::new(server_config, api);
    let faults = service.universe().services().faults.clone();

    let outcome = tokio::select! {
        result = server.run() => result.map_err(AppError::from),
        reason = wait_for_fault(&faults) => Err(AppError::Fault(reason)),
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted, shutting down");
            Ok(())
        }
    };

    server.shutdown();
    service.persist_connected_players();
    tracing::info!("Saved {} connected players", service.roster().len());
    outcome
}

fn client_tick(world: &ClientWorld, walker: &mut Walker, dt: f64) -> Result<(), AppError> {
    let state = walker.step(dt)?;
    world.publish_state(state)?;
    Ok(())
}

/// Join a server and walk its spawn planet until interrupted.
pub async fn run_client(config: &Config) -> Result<(), AppError> {
    let addr = resolve(&config.network).await?;
    let world = join(
        addr,
        PlayerState::named(&config.player.name),
        mux_config(&config.network),
        config.world.max_resident_chunks,
    )
    .await?;

    let mut walker = Walker::new(spawn_planet(&world.universe)?, world.session.name());
    let faults = world.universe.services().faults.clone();
    let mut connection = world.client.state().subscribe();
    let period = update_period(config.network.person_update_hz);
    let mut ticker = tokio::time::interval(period);
    let mut health = world.session.health();

    let outcome = loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = client_tick(&world, &mut walker, period.as_secs_f64()) {
                    break Err(e);
                }
                let now = world.session.health();
                if now != health {
                    tracing::info!("Health {health} -> {now}");
                    health = now;
                }
            }
            reason = wait_for_fault(&faults) => break Err(AppError::Fault(reason)),
            () = until_disconnected(&mut connection) => break Err(AppError::Disconnected),
            _ = tokio::signal::ctrl_c() => break Ok(()),
        }
    };

    world.leave();
    outcome
}

/// Own a local world with no network until interrupted or faulted.
pub async fn run_standalone(config: &Config) -> Result<(), AppError> {
    let store = open_store(config)?;
    let services = WorldServices::authoritative(Arc::clone(&store))
        .with_max_resident_chunks(config.world.max_resident_chunks);
    let universe = Universe::new(Arc::new(services));
    bootstrap_universe(
        &universe,
        store.as_ref(),
        &config.world.system,
        config.world.seed,
    )?;

    let name = config.player.name.as_str();
    let saved = store.load_player(name)?;
    let planet = spawn_planet(&universe)?;
    let mut walker = match &saved {
        Some(state) => Walker::resume(planet, state),
        None => Walker::new(planet, name),
    };
    let mut player = saved.unwrap_or_else(|| PlayerState::named(name));

    let faults = universe.services().faults.clone();
    let period = update_period(config.network.person_update_hz);
    let mut ticker = tokio::time::interval(period);

    let outcome = loop {
        tokio::select! {
            _ = ticker.tick() => {
                // Authoritative loads run on this thread.
                match tokio::task::block_in_place(|| walker.step(period.as_secs_f64())) {
                    Ok(state) => player = state,
                    Err(e) => break Err(AppError::from(e)),
                }
            }
            reason = wait_for_fault(&faults) => break Err(AppError::Fault(reason)),
            _ = tokio::signal::ctrl_c() => break Ok(()),
        }
    };

    store.save_player(&player)?;
    tracing::info!(
        "Saved '{}' with {} chunks resident on planet {}",
        player.name,
        walker.planet().resident_chunks(),
        walker.planet().id()
    );
    outcome
}
