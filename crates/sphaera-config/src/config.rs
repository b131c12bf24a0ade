//! Configuration structs with sensible defaults and RON persistence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// World settings.
    pub world: WorldConfig,
    /// Network/multiplayer settings.
    pub network: NetworkConfig,
    /// Local player settings.
    pub player: PlayerConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// World configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorldConfig {
    /// World name; also the directory its data lives in.
    pub name: String,
    /// Seed for newly created planets.
    pub seed: i64,
    /// Planetary system preset used when the world has no planets yet.
    /// Unregistered names fall back to "planet".
    pub system: String,
    /// Root directory for world data. `None` uses the platform data dir.
    pub data_dir: Option<PathBuf>,
    /// Per-planet cap on resident chunks. `None` keeps every loaded chunk.
    pub max_resident_chunks: Option<usize>,
}

/// Network/multiplayer configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NetworkConfig {
    /// Server address for clients; bind address for servers.
    pub server_address: String,
    /// Server port.
    pub server_port: u16,
    /// Maximum number of connected players (server only).
    pub max_players: u32,
    /// How often a client publishes its player state (Hz).
    pub person_update_hz: u32,
    /// Largest accepted frame payload in bytes.
    pub max_frame_bytes: u32,
    /// Seconds a new client may take to answer the handshake.
    pub handshake_timeout_seconds: u32,
}

/// Local player configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlayerConfig {
    /// Display name. Empty picks a random name at startup.
    pub name: String,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
}

// --- Default implementations ---

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            name: "world".to_string(),
            seed: 1,
            system: "default".to_string(),
            data_dir: None,
            max_resident_chunks: None,
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            server_address: "127.0.0.1".to_string(),
            server_port: 5555,
            max_players: 32,
            person_update_hz: 20,
            max_frame_bytes: 16 * 1024 * 1024,
            handshake_timeout_seconds: 10,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Platform config directory for Sphaera, e.g. `~/.config/sphaera`.
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sphaera")
}

impl WorldConfig {
    /// Directory this world's data lives in.
    pub fn world_dir(&self) -> PathBuf {
        let root = self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("sphaera")
        });
        root.join(&self.name)
    }
}

// --- Load / Save ---

impl Config {
    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join("config.ron");

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path).map_err(|source| {
                ConfigError::Read { path: config_path.clone(), source }
            })?;
            let config: Config = ron::from_str(&contents).map_err(|source| {
                ConfigError::Parse { path: config_path.clone(), source }
            })?;
            config.validate()?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(|source| ConfigError::Write {
            path: config_dir.to_path_buf(),
            source,
        })?;

        let config_path = config_dir.join("config.ron");
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);

        let serialized = ron::ser::to_string_pretty(self, pretty)?;

        std::fs::write(&config_path, serialized)
            .map_err(|source| ConfigError::Write { path: config_path, source })?;
        Ok(())
    }

    /// Reject settings that parse but would break the world directory or
    /// the wire codec.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let name = self.world.name.as_str();
        if name.is_empty() || name == "." || name == ".." {
            return Err(ConfigError::Invalid { field: "world.name", reason: "must name a directory" });
        }
        if name.contains(['/', '\\']) {
            return Err(ConfigError::Invalid {
                field: "world.name",
                reason: "must not contain path separators",
            });
        }
        if self.network.max_frame_bytes == 0 {
            return Err(ConfigError::Invalid { field: "network.max_frame_bytes", reason: "must be positive" });
        }
        Ok(())
    }
}
