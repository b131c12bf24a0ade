//! Persisted record format.
//!
//! ## Layout
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0 | 4 | Magic bytes `"SPHR"` |
//! | 4 | 1 | Format version (`u8`, currently 1) |
//! | 5 | 1 | Record kind (`u8`, see [`RecordKind`]) |
//! | 6 | N | LZ4 block (size-prepended) of a JSON document |
//!
//! The body is JSON so that records stay readable after fields are added or
//! renamed; the structs opt into that with `#[serde(default)]` and
//! `#[serde(alias)]`.

use lz4_flex::{compress_prepend_size, decompress_size_prepended};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Magic bytes identifying a record.
const MAGIC: [u8; 4] = *b"SPHR";

/// Current format version.
const FORMAT_VERSION: u8 = 1;

const HEADER_LEN: usize = 6;

/// Largest JSON body a record may declare.
const MAX_BODY_LEN: usize = 4 * 1024 * 1024;

/// An LZ4 block never expands by more than this factor.
const LZ4_MAX_RATIO: usize = 255;

/// What a record holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordKind {
    /// A [`ChunkData`](crate::ChunkData).
    Chunk = 1,
    /// A [`PlanetState`](crate::PlanetState).
    Planet = 2,
    /// A [`PlayerState`](crate::PlayerState).
    Player = 3,
}

/// Errors that can occur while encoding or decoding a record.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    /// The data does not start with the expected magic bytes.
    #[error("invalid magic bytes")]
    InvalidMagic,
    /// The format version is not supported by this build.
    #[error("unsupported record version: {0}")]
    UnsupportedVersion(u8),
    /// The record holds a different kind than requested.
    #[error("expected {expected:?} record, found kind {found}")]
    WrongKind {
        /// Kind the caller asked for.
        expected: RecordKind,
        /// Kind byte found in the header.
        found: u8,
    },
    /// The body's size prefix is larger than the block can hold.
    #[error("record body declares {declared} bytes, limit is {limit}")]
    BodyTooLarge {
        /// Size read from the prefix.
        declared: usize,
        /// Largest size this block may expand to.
        limit: usize,
    },
    /// The LZ4 block is corrupt.
    #[error("record body decompression failed: {0}")]
    Decompress(#[from] lz4_flex::block::DecompressError),
    /// The JSON body could not be encoded or decoded.
    #[error("record body: {0}")]
    Json(#[from] serde_json::Error),
}

/// Encode `value` as a record of the given kind.
pub fn encode_record<T: Serialize>(kind: RecordKind, value: &T) -> Result<Vec<u8>, RecordError> {
    let json = serde_json::to_vec(value)?;
    let body = compress_prepend_size(&json);
    let mut out = Vec::with_capacity(HEADER_LEN + body.len());
    out.extend_from_slice(&MAGIC);
    out.push(FORMAT_VERSION);
    out.push(kind as u8);
    out.extend_from_slice(&body);
    Ok(out)
}

/// Decode a record of the given kind.
pub fn decode_record<T: DeserializeOwned>(
    kind: RecordKind,
    data: &[u8],
) -> Result<T, RecordError> {
    if data.len() < 4 || data[0..4] != MAGIC {
        return Err(RecordError::InvalidMagic);
    }
    let version = data.get(4).copied().ok_or(RecordError::InvalidMagic)?;
    if version != FORMAT_VERSION {
        return Err(RecordError::UnsupportedVersion(version));
    }
    let found = data.get(5).copied().ok_or(RecordError::InvalidMagic)?;
    if found != kind as u8 {
        return Err(RecordError::WrongKind {
            expected: kind,
            found,
        });
    }
    let block = &data[HEADER_LEN..];
    if let Some((prefix, rest)) = block.split_first_chunk::<4>() {
        let declared = u32::from_le_bytes(*prefix) as usize;
        let limit = MAX_BODY_LEN.min(rest.len().saturating_mul(LZ4_MAX_RATIO));
        if declared > limit {
            return Err(RecordError::BodyTooLarge { declared, limit });
        }
    }
    let json = decompress_size_prepended(block)?;
    Ok(serde_json::from_slice(&json)?)
}
