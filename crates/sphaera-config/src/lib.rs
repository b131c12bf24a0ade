//! Configuration for Sphaera.
//!
//! Settings persist to disk as `config.ron` and can be overridden from the
//! command line. Every section is `#[serde(default)]`, so older and newer
//! files keep loading.

mod cli;
mod config;
mod error;

pub use cli::{CliArgs, Role};
pub use config::{Config, DebugConfig, NetworkConfig, PlayerConfig, WorldConfig, default_config_dir};
pub use error::ConfigError;
