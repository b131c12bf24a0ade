//! World data model: materials, chunks, planets, players, and the
//! self-describing record format they are persisted in.

mod chunk;
mod geometry;
mod material;
mod planet;
mod player;
mod record;

pub use chunk::{Chunk, ChunkData, ChunkDataError};
pub use geometry::{GEOMETRY_LAT_SAMPLES, GEOMETRY_LON_SAMPLES, PlanetGeometry};
pub use material::{MATERIALS, Material, MaterialDef};
pub use planet::{PlanetId, PlanetState};
pub use player::PlayerState;
pub use record::{RecordError, RecordKind, decode_record, encode_record};
