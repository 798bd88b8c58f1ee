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

use super::{GainHandle, VoiceHandle};

/// Errors produced while turning encoded bytes into a sample buffer.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("No audio track found")]
    NoTrack,

    #[error("Sample rate not specified")]
    MissingSampleRate,

    #[error("Invalid sample layout: {0}")]
    InvalidLayout(String),

    #[error("Malformed audio: {0}")]
    Malformed(String),

    #[error("Audio codec error: {0}")]
    Codec(#[from] symphonia::core::errors::Error),

    #[error("Decode task failed: {0}")]
    Task(String),
}

/// Errors produced by voice and output graph operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Unknown voice {0}")]
    UnknownVoice(VoiceHandle),

    #[error("Unknown gain node {0}")]
    UnknownGain(GainHandle),

    #[error("Voice {0} has already been started")]
    AlreadyStarted(VoiceHandle),

    #[error("Voice {0} has not been started")]
    NotStarted(VoiceHandle),

    #[error("Offset {offset}s is outside of the buffer ({duration}s)")]
    InvalidOffset { offset: f64, duration: f64 },

    #[error("No async runtime available to schedule {0}")]
    NoRuntime(VoiceHandle),

    #[error("Engine failure: {0}")]
    Failed(String),
}
