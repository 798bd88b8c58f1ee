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

use crate::engine::{DecodeError, EngineError};
use crate::transport::TransportError;

/// Errors reported by the sound manager. None of them leave the manager unusable.
#[derive(Debug, thiserror::Error)]
pub enum SoundError {
    #[error("Sound not found: {0}")]
    AssetNotFound(String),

    #[error("Failed to fetch sound {id}: {source}")]
    Transport {
        id: String,
        #[source]
        source: TransportError,
    },

    #[error("Failed to decode sound {id}: {source}")]
    Decode {
        id: String,
        #[source]
        source: DecodeError,
    },

    #[error("Invalid seek of {0} seconds")]
    InvalidSeek(f64),

    #[error("Audio engine error: {0}")]
    Engine(#[from] EngineError),
}
