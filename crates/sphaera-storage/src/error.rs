use std::path::PathBuf;

use sphaera_voxel::RecordError;

/// Errors raised by a [`WorldStore`](crate::WorldStore).
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Filesystem access failed.
    #[error("storage I/O on {path}: {source}")]
    Io {
        /// File or directory being accessed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A stored record could not be encoded or decoded.
    #[error("malformed record: {0}")]
    Record(#[from] RecordError),
}
