//! Command-line argument parsing for Sphaera.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::Config;

/// What this process does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Role {
    /// Host the authoritative world for remote clients.
    Server,
    /// Connect to a server and mirror its world without rendering.
    Client,
    /// Own a local world with no network.
    #[default]
    Standalone,
}

/// Sphaera command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "sphaera", about = "Spherical voxel world server and client")]
pub struct CliArgs {
    /// Process role.
    #[arg(long, value_enum)]
    pub role: Option<Role>,

    /// World name.
    #[arg(long)]
    pub world: Option<String>,

    /// Seed for newly created planets.
    #[arg(long, allow_hyphen_values = true)]
    pub seed: Option<i64>,

    /// Planetary system preset for a new world.
    #[arg(long)]
    pub system: Option<String>,

    /// Root directory for world data.
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Server address.
    #[arg(long)]
    pub host: Option<String>,

    /// Server port.
    #[arg(long)]
    pub port: Option<u16>,

    /// Player name.
    #[arg(long)]
    pub name: Option<String>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(ref world) = args.world {
            self.world.name = world.clone();
        }
        if let Some(seed) = args.seed {
            self.world.seed = seed;
        }
        if let Some(ref system) = args.system {
            self.world.system = system.clone();
        }
        if let Some(ref dir) = args.data_dir {
            self.world.data_dir = Some(dir.clone());
        }
        if let Some(ref host) = args.host {
            self.network.server_address = host.clone();
        }
        if let Some(port) = args.port {
            self.network.server_port = port;
        }
        if let Some(ref name) = args.name {
            self.player.name = name.clone();
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}
