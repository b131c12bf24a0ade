use sphaera_net::RpcError;
use sphaera_storage::StorageError;
use sphaera_world::WorldError;

/// Errors raised while bringing up or running a synchronized world.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Socket setup failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The store could not be read or written.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A world operation failed.
    #[error(transparent)]
    World(#[from] WorldError),

    /// A call to the server failed.
    #[error(transparent)]
    Rpc(#[from] RpcError),

    /// The server answered with the wrong message.
    #[error("unexpected reply: {0}")]
    UnexpectedReply(String),
}
