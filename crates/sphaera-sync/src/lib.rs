//! Keeps worlds in step across the network.
//!
//! The server side is [`WorldService`], which answers client calls from an
//! authoritative [`Universe`](sphaera_world::Universe) and fans edits out
//! through the connected-player roster. The client side is
//! [`ClientSession`], which mirrors the server's universe through a
//! [`LinkRemote`] and applies what the server pushes.

mod client;
mod error;
mod remote;
mod server;

pub use client::{ClientSession, ClientWorld, MAX_CHAT_LINES, MAX_HEALTH, join};
pub use error::SyncError;
pub use remote::{LinkRemote, RosterFanout};
pub use server::{WorldService, bootstrap_universe};

#[cfg(test)]
#[path = "sync_tests.rs"]
mod tests;
