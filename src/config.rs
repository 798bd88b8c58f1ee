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

//! Player configuration.

use std::path::Path;

use config::{Config, Environment, File, FileFormat};
use tracing::info;

use crate::engine::{AudioEngine, EventReceiver};
use crate::sound::SoundManager;
use crate::transport::FileTransport;

mod error;
mod player;

pub use error::ConfigError;
pub use player::{EngineKind, Player};

/// Prefix of the environment variables that override the configuration file.
const ENV_PREFIX: &str = "POLYSOUND";

/// Loads the player configuration from a YAML file. Values can be overridden from
/// the environment, e.g. `POLYSOUND_SEEK_STEP=2s`.
pub fn load_player(path: &Path) -> Result<Player, ConfigError> {
    load_player_with_env(path, None)
}

fn load_player_with_env(
    path: &Path,
    env: Option<config::Map<String, String>>,
) -> Result<Player, ConfigError> {
    let player = Config::builder()
        .add_source(File::from(path).format(FileFormat::Yaml))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .try_parsing(true)
                .source(env),
        )
        .build()?
        .try_deserialize::<Player>()?;
    player.validate()?;
    Ok(player)
}

/// Creates a sound manager for the player configuration. Relative asset locators
/// resolve against `base_path`, normally the directory holding the configuration.
/// Assets aren't loaded until [`SoundManager::load_all`] is called with
/// [`Player::assets`].
pub fn init_manager<E: AudioEngine>(
    engine: E,
    events: EventReceiver,
    player: &Player,
    base_path: &Path,
) -> Result<SoundManager<E, FileTransport>, ConfigError> {
    let seek_step = player.seek_step()?;
    let max_assets = player.max_assets()?;
    info!(
        engine = ?player.engine(),
        seek_step = ?seek_step,
        max_assets = ?max_assets,
        base_path = ?base_path,
        "Initializing sound manager"
    );

    Ok(
        SoundManager::new(engine, events, FileTransport::new(base_path))
            .with_max_assets(max_assets)
            .with_seek_step(seek_step.as_secs_f64()),
    )
}

/// Returns the directory relative locators in a configuration file resolve against.
pub fn base_path(config_path: &Path) -> &Path {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

#[cfg(test)]
mod test {
    use std::{error::Error, fs, num::NonZeroUsize, time::Duration};

    use super::*;
    use crate::engine::mock;

    #[test]
    fn test_load_player() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("polysound.yaml");
        fs::write(
            &path,
            "engine: mock\nseek_step: 2s\nassets:\n  click: click.wav\n",
        )?;

        let player = load_player(&path)?;
        assert_eq!(player.engine(), EngineKind::Mock);
        assert_eq!(player.seek_step()?, Duration::from_secs(2));
        assert_eq!(player.assets().collect::<Vec<_>>(), vec![("click", "click.wav")]);
        Ok(())
    }

    #[test]
    fn test_environment_overrides() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("polysound.yaml");
        fs::write(&path, "engine: mock\nseek_step: 2s\n")?;

        let mut env = config::Map::new();
        env.insert("POLYSOUND_SEEK_STEP".to_string(), "10s".to_string());
        env.insert("POLYSOUND_MAX_ASSETS".to_string(), "3".to_string());
        let player = load_player_with_env(&path, Some(env))?;
        assert_eq!(player.seek_step()?, Duration::from_secs(10));
        assert_eq!(player.max_assets()?, NonZeroUsize::new(3));
        Ok(())
    }

    #[test]
    fn test_load_player_errors() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        assert!(matches!(
            load_player(&dir.path().join("missing.yaml")),
            Err(ConfigError::Load(_))
        ));

        let path = dir.path().join("polysound.yaml");
        fs::write(&path, "engine: loud\n")?;
        assert!(matches!(load_player(&path), Err(ConfigError::Load(_))));

        fs::write(&path, "max_assets: 0\n")?;
        assert!(matches!(load_player(&path), Err(ConfigError::ZeroCapacity)));
        Ok(())
    }

    #[test]
    fn test_base_path() {
        assert_eq!(base_path(Path::new("polysound.yaml")), Path::new("."));
        assert_eq!(
            base_path(Path::new("/etc/polysound/polysound.yaml")),
            Path::new("/etc/polysound")
        );
    }

    #[tokio::test]
    async fn test_init_manager_loads_relative_assets() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        fs::create_dir(dir.path().join("sounds"))?;
        fs::write(dir.path().join("sounds").join("click.txt"), "1.5")?;
        let path = dir.path().join("polysound.yaml");
        fs::write(
            &path,
            "engine: mock\nseek_step: 500ms\nmax_assets: 4\nassets:\n  click: sounds/click.txt\n  missing: sounds/missing.txt\n",
        )?;

        let player = load_player(&path)?;
        let (engine, events) = mock::Engine::new("mock");
        let mut manager = init_manager(engine, events, &player, base_path(&path))?;
        assert_eq!(manager.seek_step(), 0.5);

        let report = manager.load_all(player.assets()).await;
        assert_eq!(report.loaded, vec!["click".to_string()]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(manager.get("click").map(|b| b.duration()), Some(1.5));
        Ok(())
    }
}
