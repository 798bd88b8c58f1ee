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

//! Polyphonic sound playback.
//!
//! This module provides:
//! - An in-memory library of decoded sounds, keyed by id
//! - A registry of the voices playing for each id, any number at a time
//! - Play, pause, stop and seeking across every voice of a sound

mod error;
mod library;
mod manager;
mod voice;

pub use error::SoundError;
pub use library::AssetLibrary;
pub use manager::{LoadReport, SoundManager, DEFAULT_SEEK_SECONDS};
pub use voice::{Voice, VoiceId, VoiceInfo, VoiceRegistry};
