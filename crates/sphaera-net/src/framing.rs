//! Multiplexed length-prefixed framing for TCP streams.
//!
//! One socket carries two logical channels, one per call direction. Every
//! frame names its channel and whether it is a request or a response:
//!
//! ```text
//! +-----------+---------+-------------------+--------------------+
//! | channel   | kind    | length (4 bytes)  |   payload          |
//! | u8        | u8      | u32 little-endian |   (length bytes)   |
//! +-----------+---------+-------------------+--------------------+
//! ```
//!
//! The length does **not** include the 6 header bytes.

use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Size of the frame header in bytes.
pub const HEADER_LEN: usize = 6;

/// Logical channel, named by call direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Channel {
    /// Calls made by the client into the server.
    ClientToServer = 0,
    /// Calls made by the server into the client.
    ServerToClient = 1,
}

impl Channel {
    fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(Self::ClientToServer),
            1 => Some(Self::ServerToClient),
            _ => None,
        }
    }
}

/// Whether a frame starts a call or answers one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameKind {
    /// A call from the channel's caller.
    Request = 0,
    /// The callee's answer.
    Response = 1,
}

impl FrameKind {
    fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(Self::Request),
            1 => Some(Self::Response),
            _ => None,
        }
    }
}

/// One frame on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Logical channel.
    pub channel: Channel,
    /// Request or response.
    pub kind: FrameKind,
    /// Encoded message.
    pub payload: Vec<u8>,
}

impl Frame {
    /// A request frame on `channel`.
    pub fn request(channel: Channel, payload: Vec<u8>) -> Self {
        Self {
            channel,
            kind: FrameKind::Request,
            payload,
        }
    }

    /// A response frame on `channel`.
    pub fn response(channel: Channel, payload: Vec<u8>) -> Self {
        Self {
            channel,
            kind: FrameKind::Response,
            payload,
        }
    }
}

/// Configuration for the framing layer.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum allowed payload size in bytes. Default: 16 MiB.
    pub max_payload_size: u32,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: 16 * 1024 * 1024,
        }
    }
}

/// Errors that can occur during framing operations.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The payload size exceeds the configured maximum.
    #[error("payload size {size} exceeds maximum {max}")]
    PayloadTooLarge {
        /// The actual payload size.
        size: u32,
        /// The configured maximum.
        max: u32,
    },

    /// The header names an unknown channel or frame kind.
    #[error("invalid frame header: channel {channel}, kind {kind}")]
    InvalidHeader {
        /// Channel byte.
        channel: u8,
        /// Kind byte.
        kind: u8,
    },

    /// The connection was closed before a complete frame was received.
    #[error("connection closed")]
    ConnectionClosed,

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn eof_as_closed(e: std::io::Error) -> FrameError {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        FrameError::ConnectionClosed
    } else {
        FrameError::Io(e)
    }
}

/// Read a single frame from the stream.
///
/// Returns [`FrameError::ConnectionClosed`] if the peer closes the connection
/// before the frame is complete.
pub async fn read_frame<R: AsyncReadExt + Unpin>(
    reader: &mut R,
    config: &FrameConfig,
) -> Result<Frame, FrameError> {
    let mut header = [0u8; HEADER_LEN];
    reader.read_exact(&mut header).await.map_err(eof_as_closed)?;

    let (Some(channel), Some(kind)) = (Channel::from_byte(header[0]), FrameKind::from_byte(header[1]))
    else {
        return Err(FrameError::InvalidHeader {
            channel: header[0],
            kind: header[1],
        });
    };
    let payload_len = u32::from_le_bytes([header[2], header[3], header[4], header[5]]);

    if payload_len > config.max_payload_size {
        return Err(FrameError::PayloadTooLarge {
            size: payload_len,
            max: config.max_payload_size,
        });
    }

    let mut payload = vec![0u8; payload_len as usize];
    if payload_len > 0 {
        reader.read_exact(&mut payload).await.map_err(eof_as_closed)?;
    }

    Ok(Frame {
        channel,
        kind,
        payload,
    })
}

/// Write a single frame to the stream.
pub async fn write_frame<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    frame: &Frame,
    config: &FrameConfig,
) -> Result<(), FrameError> {
    let len = u32::try_from(frame.payload.len()).unwrap_or(u32::MAX);
    if len > config.max_payload_size {
        return Err(FrameError::PayloadTooLarge {
            size: len,
            max: config.max_payload_size,
        });
    }

    let mut header = [0u8; HEADER_LEN];
    header[0] = frame.channel as u8;
    header[1] = frame.kind as u8;
    header[2..].copy_from_slice(&len.to_le_bytes());
    writer.write_all(&header).await?;
    if !frame.payload.is_empty() {
        writer.write_all(&frame.payload).await?;
    }
    writer.flush().await?;

    Ok(())
}
