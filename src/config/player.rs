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
use std::{collections::BTreeMap, num::NonZeroUsize, time::Duration};

use duration_string::DurationString;
use serde::Deserialize;

use super::error::ConfigError;
use crate::sound::DEFAULT_SEEK_SECONDS;

/// The audio engine to play sounds through.
#[derive(Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// Records calls without producing sound. Time stands still.
    Mock,
    /// Tracks voices against the wall clock without producing sound.
    #[default]
    Silent,
}

/// The configuration for the sound player.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Player {
    /// The engine to use.
    #[serde(default)]
    engine: EngineKind,

    /// How far forward and backward move when no distance is given (default: 5s).
    seek_step: Option<String>,

    /// Maximum number of sounds kept in memory. Unbounded when unset.
    max_assets: Option<usize>,

    /// Sounds to load at startup, by id.
    #[serde(default)]
    assets: BTreeMap<String, String>,
}

impl Player {
    /// Returns the engine kind.
    pub fn engine(&self) -> EngineKind {
        self.engine
    }

    /// Returns the seek step from the configuration.
    pub fn seek_step(&self) -> Result<Duration, ConfigError> {
        let step = match &self.seek_step {
            Some(seek_step) => DurationString::from_string(seek_step.clone())
                .map_err(|e| ConfigError::InvalidDuration {
                    value: seek_step.clone(),
                    reason: e.to_string(),
                })?
                .into(),
            None => Duration::from_secs_f64(DEFAULT_SEEK_SECONDS),
        };
        if step.is_zero() {
            return Err(ConfigError::InvalidSeekStep(step));
        }
        Ok(step)
    }

    /// Returns the library capacity.
    pub fn max_assets(&self) -> Result<Option<NonZeroUsize>, ConfigError> {
        self.max_assets
            .map(|max| NonZeroUsize::new(max).ok_or(ConfigError::ZeroCapacity))
            .transpose()
    }

    /// Returns the configured (id, locator) pairs in id order.
    pub fn assets(&self) -> impl Iterator<Item = (&str, &str)> {
        self.assets
            .iter()
            .map(|(id, locator)| (id.as_str(), locator.as_str()))
    }

    /// Checks every value that can't be checked while deserializing.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.seek_step()?;
        self.max_assets()?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use config::{Config, File, FileFormat};

    use super::*;

    fn parse(yaml: &str) -> Player {
        Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize::<Player>()
            .unwrap()
    }

    #[test]
    fn test_defaults() {
        let player = parse("assets: {}");
        assert_eq!(player.engine(), EngineKind::Silent);
        assert_eq!(player.seek_step().unwrap(), Duration::from_secs(5));
        assert_eq!(player.max_assets().unwrap(), None);
        assert_eq!(player.assets().count(), 0);
    }

    #[test]
    fn test_full() {
        let player = parse(
            r#"
            engine: mock
            seek_step: 2500ms
            max_assets: 8
            assets:
              click: sounds/click.wav
              bgm: /srv/sounds/bgm.flac
            "#,
        );
        assert_eq!(player.engine(), EngineKind::Mock);
        assert_eq!(player.seek_step().unwrap(), Duration::from_millis(2500));
        assert_eq!(player.max_assets().unwrap(), NonZeroUsize::new(8));
        assert_eq!(
            player.assets().collect::<Vec<_>>(),
            vec![("bgm", "/srv/sounds/bgm.flac"), ("click", "sounds/click.wav")]
        );
    }

    #[test]
    fn test_invalid_values() {
        let player = parse("seek_step: soon");
        match player.seek_step() {
            Err(ConfigError::InvalidDuration { value, reason }) => {
                assert_eq!(value, "soon");
                assert!(!reason.is_empty());
            }
            other => panic!("expected an invalid duration, got {:?}", other),
        }

        let player = parse("seek_step: 0s");
        assert!(matches!(
            player.seek_step(),
            Err(ConfigError::InvalidSeekStep(_))
        ));

        let player = parse("max_assets: 0");
        assert!(matches!(player.max_assets(), Err(ConfigError::ZeroCapacity)));
        assert!(matches!(player.validate(), Err(ConfigError::ZeroCapacity)));
    }
}
