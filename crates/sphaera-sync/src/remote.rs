//! Adapters from the world's transport seams onto `sphaera-net`.

use std::sync::Arc;

use sphaera_coords::{CellIndex, ChunkIndex};
use sphaera_net::{
    CellUpdate, ClientRequest, ConnectionId, PeerRoster, RpcError, ServerLink, ServerRequest,
    ServerResponse,
};
use sphaera_storage::WorldStore;
use sphaera_voxel::{ChunkData, Material, PlanetGeometry, PlanetId, PlayerState};
use sphaera_world::{Completion, FaultSignal, PeerFanout, PeerId, RemoteError, RemoteWorld};
use tokio::runtime::Handle;

fn remote_error(err: RpcError) -> RemoteError {
    match err {
        RpcError::Shutdown => RemoteError::Shutdown,
        other => RemoteError::Call(other.to_string()),
    }
}

fn expect_chunk(reply: ServerResponse) -> Result<ChunkData, RemoteError> {
    match reply {
        ServerResponse::Chunk(data) => Ok(data),
        ServerResponse::Error(e) => Err(RemoteError::Call(e)),
        other => Err(RemoteError::Call(format!("unexpected reply {other:?}"))),
    }
}

fn expect_geometry(reply: ServerResponse) -> Result<PlanetGeometry, RemoteError> {
    match reply {
        ServerResponse::Geometry(geometry) => Ok(geometry),
        ServerResponse::Error(e) => Err(RemoteError::Call(e)),
        other => Err(RemoteError::Call(format!("unexpected reply {other:?}"))),
    }
}

/// The server, reached through the client's connection.
pub struct LinkRemote {
    link: ServerLink,
    runtime: Handle,
}

impl LinkRemote {
    /// Wrap `link`; background completions run on `runtime`.
    pub fn new(link: ServerLink, runtime: Handle) -> Self {
        Self { link, runtime }
    }

    fn start<T, F>(&self, request: ServerRequest, done: Completion<T>, decode: F)
    where
        T: 'static,
        F: FnOnce(ServerResponse) -> Result<T, RemoteError> + Send + 'static,
    {
        match self.link.start(request) {
            Ok(reply) => {
                self.runtime.spawn(async move {
                    done(match reply.await {
                        Ok(response) => decode(response),
                        Err(_) => Err(RemoteError::Shutdown),
                    });
                });
            }
            Err(e) => done(Err(remote_error(e))),
        }
    }
}

impl RemoteWorld for LinkRemote {
    fn fetch_chunk(&self, planet: PlanetId, index: ChunkIndex) -> Result<ChunkData, RemoteError> {
        let reply = self
            .link
            .call_blocking(ServerRequest::GetChunk { planet, index })
            .map_err(remote_error)?;
        expect_chunk(reply)
    }

    fn fetch_chunk_async(&self, planet: PlanetId, index: ChunkIndex, done: Completion<ChunkData>) {
        self.start(ServerRequest::GetChunk { planet, index }, done, expect_chunk);
    }

    fn fetch_geometry(&self, planet: PlanetId) -> Result<PlanetGeometry, RemoteError> {
        let reply = self
            .link
            .call_blocking(ServerRequest::GetPlanetGeometry { planet })
            .map_err(remote_error)?;
        expect_geometry(reply)
    }

    fn fetch_geometry_async(&self, planet: PlanetId, done: Completion<PlanetGeometry>) {
        self.start(ServerRequest::GetPlanetGeometry { planet }, done, expect_geometry);
    }

    fn send_cell_material(&self, planet: PlanetId, cell: CellIndex, material: Material) {
        let update = CellUpdate {
            planet,
            cell,
            material,
        };
        if let Err(e) = self.link.notify(ServerRequest::SetCellMaterial(update)) {
            tracing::warn!("Dropping edit of {cell:?} on planet {planet}: {e}");
        }
    }
}

/// Saves players that left, raising a fault if the store refuses.
pub(crate) fn persist_players(store: &dyn WorldStore, faults: &FaultSignal, players: &[PlayerState]) {
    for player in players {
        match store.save_player(player) {
            Ok(()) => tracing::trace!("Saved player '{}'", player.name),
            Err(e) => faults.raise(format_args!("saving player '{}': {e}", player.name)),
        }
    }
}

/// Fans cell edits out to every connected client.
pub struct RosterFanout {
    roster: Arc<PeerRoster>,
    store: Arc<dyn WorldStore>,
    faults: FaultSignal,
}

impl RosterFanout {
    /// Fan out through `roster`; players pruned along the way are saved to
    /// `store`.
    pub fn new(roster: Arc<PeerRoster>, store: Arc<dyn WorldStore>, faults: FaultSignal) -> Self {
        Self {
            roster,
            store,
            faults,
        }
    }
}

impl PeerFanout for RosterFanout {
    fn cell_changed(
        &self,
        planet: PlanetId,
        cell: CellIndex,
        material: Material,
        except: Option<PeerId>,
    ) {
        let update = CellUpdate {
            planet,
            cell,
            material,
        };
        let pruned = self.roster.broadcast(
            ClientRequest::SetCellMaterial(update),
            except.map(|peer| ConnectionId(peer.0)),
        );
        persist_players(self.store.as_ref(), &self.faults, &pruned);
    }
}
