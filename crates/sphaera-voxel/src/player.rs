//! Player state shared between peers and stored per world.

use serde::{Deserialize, Serialize};

/// Broadcast state of one player.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerState {
    /// Player name, unique per session.
    pub name: String,
    /// World position.
    pub position: [f32; 3],
    /// Look direction.
    pub look_dir: [f32; 3],
}

impl PlayerState {
    /// A player at the origin looking down +X.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            position: [0.0; 3],
            look_dir: [1.0, 0.0, 0.0],
        }
    }
}
