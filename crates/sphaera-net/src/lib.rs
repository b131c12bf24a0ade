//! Networking for Sphaera: two-channel RPC over a single TCP connection.
//!
//! Clients call the server on one logical channel and the server calls
//! clients on the other. Both are multiplexed onto one socket by
//! [`spawn_connection`], using length-prefixed frames ([`framing`]) that
//! carry versioned, optionally LZ4-compressed postcard payloads ([`codec`]).

pub mod codec;
pub mod framing;
mod messages;
mod mux;
mod roster;
mod service;
mod tcp_client;
mod tcp_server;

pub use codec::{CodecError, CompressionConfig, PROTOCOL_VERSION};
pub use framing::{Channel, Frame, FrameConfig, FrameError, FrameKind, read_frame, write_frame};
pub use messages::{
    CellUpdate, ClientProtocol, ClientRequest, ClientResponse, Hit, Protocol, ServerProtocol,
    ServerRequest, ServerResponse,
};
pub use mux::{MuxConfig, RpcClient, RpcError, spawn_connection};
pub use roster::{ClientLink, PeerRoster};
pub use service::{ClientApi, ClientDispatch, Handler, ServerApi, ServerDispatch};
pub use tcp_client::{ConnectionState, ConnectionStateWatch, ServerLink, SyncClient};
pub use tcp_server::{
    ConnectionId, ConnectionLimitReached, ConnectionMap, IdGenerator, ServerConfig, SyncServer,
};
