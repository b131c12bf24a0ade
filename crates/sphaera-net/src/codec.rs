//! Payload codec: version byte, compression flag, and a postcard envelope.
//!
//! ```text
//! +---------+------+-------------------------------------------+
//! | version | flag | postcard(Envelope { call_id, body })      |
//! | u8      | u8   | LZ4 with prepended size when flag == 0x01 |
//! +---------+------+-------------------------------------------+
//! ```
//!
//! Bodies at or above the compression threshold (chunk and geometry
//! replies, in practice) are LZ4-compressed.

use lz4_flex::{compress_prepend_size, decompress_size_prepended};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Current protocol version. Bumped on breaking message layout changes.
pub const PROTOCOL_VERSION: u8 = 1;

/// Compression flag: body is uncompressed.
pub const COMPRESSION_FLAG_NONE: u8 = 0x00;

/// Compression flag: body is LZ4-compressed.
pub const COMPRESSION_FLAG_LZ4: u8 = 0x01;

/// Controls when bodies are compressed.
#[derive(Debug, Clone)]
pub struct CompressionConfig {
    /// Minimum serialized size (bytes) before compression is applied. Default: 256.
    pub threshold: usize,
    /// Whether compression is enabled at all. Default: true.
    pub enabled: bool,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            threshold: 256,
            enabled: true,
        }
    }
}

/// Largest envelope a compressed payload may expand to.
pub const MAX_DECOMPRESSED_LEN: usize = 64 * 1024 * 1024;

/// An LZ4 block never expands by more than this factor.
const LZ4_MAX_RATIO: usize = 255;

/// Correlates a response with the request that caused it.
#[derive(Serialize, Deserialize)]
struct Envelope<T> {
    call_id: u64,
    body: T,
}

/// Errors raised while encoding or decoding a payload.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The payload is too short to hold the version and flag bytes.
    #[error("payload too short")]
    Truncated,

    /// The peer speaks another protocol version.
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    /// An unknown compression flag byte was encountered.
    #[error("unknown compression flag: 0x{0:02X}")]
    UnknownCompression(u8),

    /// The size prefix of an LZ4 block exceeds what its length can hold.
    #[error("declared body of {declared} bytes exceeds limit of {limit}")]
    Oversized { declared: usize, limit: usize },

    /// LZ4 decompression failed.
    #[error("LZ4 decompression failed: {0}")]
    Decompress(#[from] lz4_flex::block::DecompressError),

    /// Postcard (de)serialization failed.
    #[error("postcard error: {0}")]
    Postcard(#[from] postcard::Error),
}

/// Encode `body` under `call_id` into a frame payload.
pub fn encode_payload<T: Serialize>(
    call_id: u64,
    body: &T,
    config: &CompressionConfig,
) -> Result<Vec<u8>, CodecError> {
    let raw = postcard::to_allocvec(&Envelope { call_id, body })?;

    let (flag, data) = if config.enabled && raw.len() >= config.threshold {
        (COMPRESSION_FLAG_LZ4, compress_prepend_size(&raw))
    } else {
        (COMPRESSION_FLAG_NONE, raw)
    };

    let mut out = Vec::with_capacity(2 + data.len());
    out.push(PROTOCOL_VERSION);
    out.push(flag);
    out.extend_from_slice(&data);
    Ok(out)
}

/// Decode a frame payload into its call id and body.
pub fn decode_payload<T: DeserializeOwned>(payload: &[u8]) -> Result<(u64, T), CodecError> {
    let [version, flag, data @ ..] = payload else {
        return Err(CodecError::Truncated);
    };
    if *version != PROTOCOL_VERSION {
        return Err(CodecError::UnsupportedVersion(*version));
    }

    let envelope: Envelope<T> = match *flag {
        COMPRESSION_FLAG_NONE => postcard::from_bytes(data)?,
        COMPRESSION_FLAG_LZ4 => {
            check_declared_len(data)?;
            postcard::from_bytes(&decompress_size_prepended(data)?)?
        }
        other => return Err(CodecError::UnknownCompression(other)),
    };
    Ok((envelope.call_id, envelope.body))
}

/// Reject a size prefix larger than the block could decompress to, before
/// it becomes an allocation.
fn check_declared_len(block: &[u8]) -> Result<(), CodecError> {
    let Some((prefix, rest)) = block.split_first_chunk::<4>() else {
        return Err(CodecError::Truncated);
    };
    let declared = u32::from_le_bytes(*prefix) as usize;
    let limit = MAX_DECOMPRESSED_LEN.min(rest.len().saturating_mul(LZ4_MAX_RATIO));
    if declared > limit {
        return Err(CodecError::Oversized { declared, limit });
    }
    Ok(())
}
