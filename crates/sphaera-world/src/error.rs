use sphaera_storage::StorageError;
use sphaera_voxel::{ChunkDataError, PlanetId};

/// Failure reported by a [`RemoteWorld`](crate::RemoteWorld).
#[derive(Debug, Clone, thiserror::Error)]
pub enum RemoteError {
    /// The connection to the peer is gone.
    #[error("connection is shut down")]
    Shutdown,
    /// The peer answered with an error.
    #[error("remote call failed: {0}")]
    Call(String),
}

/// Errors surfaced by world operations. All of them are fatal to the
/// requesting process.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// Storage read or write failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A remote fetch failed.
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// A chunk snapshot did not fit its index.
    #[error(transparent)]
    ChunkData(#[from] ChunkDataError),

    /// No planet with this id is registered.
    #[error("unknown planet {0}")]
    UnknownPlanet(PlanetId),
}
