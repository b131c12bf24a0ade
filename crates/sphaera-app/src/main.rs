//! `sphaera`: host, join, or explore a spherical voxel world.

mod roles;
mod walker;

use std::process::ExitCode;

use clap::Parser;
use sphaera_config::{CliArgs, Config, Role, default_config_dir};

fn main() -> ExitCode {
    let args = CliArgs::parse();

    let config_dir = args.config.clone().unwrap_or_else(default_config_dir);
    let mut config = Config::load_or_create(&config_dir).unwrap_or_else(|e| {
        eprintln!("Config error: {e}, using defaults");
        Config::default()
    });
    config.apply_cli_overrides(&args);
    if let Err(e) = config.validate() {
        eprintln!("Config error: {e}");
        return ExitCode::FAILURE;
    }
    if config.player.name.is_empty() {
        config.player.name = walker::random_name(&mut rand::rng());
    }

    let log_dir = config_dir.join("logs");
    sphaera_log::init_logging(Some(&log_dir), cfg!(debug_assertions), Some(&config));

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("sphaera-worker")
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!("Failed to start runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let role = args.role.unwrap_or_default();
    tracing::info!("Starting {role:?} as '{}'", config.player.name);
    let result = runtime.block_on(async {
        match role {
            Role::Server => roles::run_server(&config).await,
            Role::Client => roles::run_client(&config).await,
            Role::Standalone => roles::run_standalone(&config).await,
        }
    });
    // Drops blocked remote fetches instead of waiting on them.
    runtime.shutdown_timeout(std::time::Duration::from_secs(1));

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
