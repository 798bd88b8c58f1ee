// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::error::Error;
use std::path::Path;
use std::sync::Arc;

use clap::{crate_version, Parser, Subcommand};
use polysound::config::{self, EngineKind, Player};
use polysound::controller::{keyboard, Controller};
use polysound::engine::{mock, silent, AudioEngine, EventReceiver};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A polyphonic sound player."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Loads every configured sound and plays them from keyboard commands.
    Start {
        /// The path to the player config.
        config_path: String,
    },
    /// Loads and verifies every configured sound.
    Assets {
        /// The path to the player config.
        config_path: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Log filtering comes from RUST_LOG.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Start { config_path } => {
            let config_path = Path::new(&config_path);
            let player = config::load_player(config_path)?;
            match player.engine() {
                EngineKind::Mock => {
                    let (engine, events) = mock::Engine::new("mock");
                    start(engine, events, &player, config_path).await?;
                }
                EngineKind::Silent => {
                    let (engine, events) = silent::Engine::new();
                    start(engine, events, &player, config_path).await?;
                }
            }
        }
        Commands::Assets { config_path } => {
            let config_path = Path::new(&config_path);
            let player = config::load_player(config_path)?;
            // Decoding is the same for every engine, so the silent engine is enough here.
            let (engine, events) = silent::Engine::new();
            assets(engine, events, &player, config_path).await?;
        }
    }

    Ok(())
}

/// Loads the configured sounds and hands the manager to the keyboard controller.
async fn start<E: AudioEngine>(
    engine: E,
    events: EventReceiver,
    player: &Player,
    config_path: &Path,
) -> Result<(), Box<dyn Error>> {
    let mut manager = config::init_manager(engine, events, player, config::base_path(config_path))?;
    let report = manager.load_all(player.assets()).await;
    for (id, error) in &report.failed {
        println!("Unable to load {}: {}", id, error);
    }

    let controller = Controller::new(manager, Arc::new(keyboard::Driver::new()));
    controller.join().await?;
    Ok(())
}

/// Prints a report of every configured sound.
async fn assets<E: AudioEngine>(
    engine: E,
    events: EventReceiver,
    player: &Player,
    config_path: &Path,
) -> Result<(), Box<dyn Error>> {
    let mut manager = config::init_manager(engine, events, player, config::base_path(config_path))?;
    let report = manager.load_all(player.assets()).await;

    if report.loaded.is_empty() && report.failed.is_empty() {
        println!("No sounds configured.");
        return Ok(());
    }

    println!("Sounds ({}):", report.loaded.len());
    for id in &report.loaded {
        if let Some(buffer) = manager.get(id) {
            println!(
                "- {} (channels: {}, sample rate: {}, duration: {:.2}s)",
                id,
                buffer.channel_count(),
                buffer.sample_rate(),
                buffer.duration()
            );
        }
    }

    if !report.failed.is_empty() {
        println!("Failed ({}):", report.failed.len());
        for (id, error) in &report.failed {
            println!("- {}: {}", id, error);
        }
        return Err(format!("{} sounds failed to load", report.failed.len()).into());
    }
    Ok(())
}
