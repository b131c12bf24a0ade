//! Directory-backed store.
//!
//! Layout under the world directory:
//!
//! ```text
//! planets/<id>.rec
//! chunks/<planet>/<lon>_<lat>_<alt>.rec
//! players/<escaped name>.rec
//! ```
//!
//! Each write lands in a temporary file that is then renamed over the
//! target, so readers never observe a half-written record.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use sphaera_coords::ChunkIndex;
use sphaera_voxel::{
    ChunkData, PlanetId, PlanetState, PlayerState, RecordKind, decode_record, encode_record,
};

use crate::{StorageError, WorldStore};

const EXTENSION: &str = "rec";

/// A [`WorldStore`] that keeps one file per record.
pub struct FileStore {
    root: PathBuf,
    /// Serializes writers so concurrent saves of one key cannot interleave
    /// their temporary files.
    write_lock: Mutex<()>,
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> StorageError + '_ {
    move |source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Escape a player name into a portable file stem.
fn escape_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for b in name.bytes() {
        if b.is_ascii_alphanumeric() || b == b'-' || b == b'_' {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        for dir in ["planets", "chunks", "players"] {
            let path = root.join(dir);
            std::fs::create_dir_all(&path).map_err(io_err(&path))?;
        }
        tracing::info!("Opened world store at {}", root.display());
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    /// Directory this store writes into.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn chunk_path(&self, planet: PlanetId, index: ChunkIndex) -> PathBuf {
        self.root.join("chunks").join(planet.to_string()).join(format!(
            "{}_{}_{}.{EXTENSION}",
            index.lon, index.lat, index.alt
        ))
    }

    fn planet_path(&self, planet: PlanetId) -> PathBuf {
        self.root.join("planets").join(format!("{planet}.{EXTENSION}"))
    }

    fn player_path(&self, name: &str) -> PathBuf {
        self.root
            .join("players")
            .join(format!("{}.{EXTENSION}", escape_name(name)))
    }

    fn read(&self, path: &Path) -> Result<Option<Vec<u8>>, StorageError> {
        match std::fs::read(path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_err(path)(e)),
        }
    }

    fn write(&self, path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err(parent))?;
        }
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, bytes).map_err(io_err(&tmp))?;
        std::fs::rename(&tmp, path).map_err(io_err(path))?;
        tracing::trace!("Wrote {} bytes to {}", bytes.len(), path.display());
        Ok(())
    }
}

impl WorldStore for FileStore {
    fn load_chunk(
        &self,
        planet: PlanetId,
        index: ChunkIndex,
    ) -> Result<Option<ChunkData>, StorageError> {
        let Some(bytes) = self.read(&self.chunk_path(planet, index))? else {
            return Ok(None);
        };
        Ok(Some(decode_record(RecordKind::Chunk, &bytes)?))
    }

    fn save_chunk(
        &self,
        planet: PlanetId,
        index: ChunkIndex,
        data: &ChunkData,
    ) -> Result<(), StorageError> {
        let bytes = encode_record(RecordKind::Chunk, data)?;
        self.write(&self.chunk_path(planet, index), &bytes)
    }

    fn load_planets(&self) -> Result<Vec<PlanetState>, StorageError> {
        let dir = self.root.join("planets");
        let entries = std::fs::read_dir(&dir).map_err(io_err(&dir))?;
        let mut planets = Vec::new();
        for entry in entries {
            let path = entry.map_err(io_err(&dir))?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            if let Some(bytes) = self.read(&path)? {
                planets.push(decode_record::<PlanetState>(RecordKind::Planet, &bytes)?);
            }
        }
        planets.sort_by_key(|p| p.id);
        Ok(planets)
    }

    fn save_planet(&self, state: &PlanetState) -> Result<(), StorageError> {
        let bytes = encode_record(RecordKind::Planet, state)?;
        self.write(&self.planet_path(state.id), &bytes)
    }

    fn load_player(&self, name: &str) -> Result<Option<PlayerState>, StorageError> {
        let Some(bytes) = self.read(&self.player_path(name))? else {
            return Ok(None);
        };
        Ok(Some(decode_record(RecordKind::Player, &bytes)?))
    }

    fn save_player(&self, state: &PlayerState) -> Result<(), StorageError> {
        let bytes = encode_record(RecordKind::Player, state)?;
        self.write(&self.player_path(&state.name), &bytes)
    }
}
