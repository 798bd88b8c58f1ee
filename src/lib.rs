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

//! A polyphonic sound manager.
//!
//! Sounds are fetched through a [`transport::Transport`], decoded once by an
//! [`engine::AudioEngine`] and kept in memory by id. Any number of voices can play
//! the same sound at once; pause, stop and seeking apply to all of them.

pub mod config;
pub mod controller;
pub mod engine;
pub mod sound;
pub mod transport;

#[cfg(test)]
mod testutil;

pub use sound::{SoundError, SoundManager, VoiceId, VoiceInfo};
