//! Live world state: planets with lazily loaded chunks, cell mutation, and
//! the universe of orbiting planets.
//!
//! A [`Planet`] resolves a missing chunk through its [`ChunkSource`]: when
//! authoritative it reads storage, then falls back to generation and persists
//! the result; otherwise it asks a [`RemoteWorld`]. While a chunk is being
//! resolved the map holds a placeholder, so concurrent requests for the same
//! index never start a second load.
//!
//! Transport lives elsewhere. This crate only sees the [`RemoteWorld`] and
//! [`PeerFanout`] seams, injected through [`WorldServices`].

mod error;
mod fault;
mod planet;
mod remote;
mod universe;

pub use error::{RemoteError, WorldError};
pub use fault::FaultSignal;
pub use planet::{LoadMode, Planet};
pub use remote::{Completion, PeerFanout, PeerId, Propagation, RemoteWorld};
pub use universe::Universe;

use std::sync::Arc;

use sphaera_storage::WorldStore;

/// Where missing chunks come from.
#[derive(Clone)]
pub enum ChunkSource {
    /// This process owns the world: storage first, then generation.
    Authoritative(Arc<dyn WorldStore>),
    /// Chunks are fetched from the authoritative peer.
    Remote(Arc<dyn RemoteWorld>),
}

/// Collaborators shared by every planet of a universe.
pub struct WorldServices {
    /// Chunk source for all planets.
    pub source: ChunkSource,
    /// Receives cell changes that must reach other peers.
    pub fanout: Option<Arc<dyn PeerFanout>>,
    /// Raised when a load or persistence step fails.
    pub faults: FaultSignal,
    /// Per-planet cap on resident chunks. `None` keeps every loaded chunk.
    pub max_resident_chunks: Option<usize>,
}

impl WorldServices {
    /// Services for an authoritative world backed by `store`.
    pub fn authoritative(store: Arc<dyn WorldStore>) -> Self {
        Self::with_source(ChunkSource::Authoritative(store))
    }

    /// Services for a world mirrored from `remote`.
    pub fn remote(remote: Arc<dyn RemoteWorld>) -> Self {
        Self::with_source(ChunkSource::Remote(remote))
    }

    fn with_source(source: ChunkSource) -> Self {
        Self {
            source,
            fanout: None,
            faults: FaultSignal::new(),
            max_resident_chunks: None,
        }
    }

    /// Route propagated cell changes to `fanout`.
    pub fn with_fanout(mut self, fanout: Arc<dyn PeerFanout>) -> Self {
        self.fanout = Some(fanout);
        self
    }

    /// Bound resident chunks per planet.
    pub fn with_max_resident_chunks(mut self, max: Option<usize>) -> Self {
        self.max_resident_chunks = max;
        self
    }

    /// Whether this world resolves chunks itself.
    pub fn is_authoritative(&self) -> bool {
        matches!(self.source, ChunkSource::Authoritative(_))
    }
}
