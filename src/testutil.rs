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

use std::{error::Error, io::Cursor};

use hound::{SampleFormat, WavSpec, WavWriter};

use crate::engine::mock;
use crate::sound::SoundManager;
use crate::transport::MemoryTransport;

/// Encodes the given channels as a 32 bit float WAV file held in memory.
pub fn wav_bytes(channels: &[Vec<f32>], sample_rate: u32) -> Result<Vec<u8>, Box<dyn Error>> {
    let num_channels = channels.len();
    assert!(num_channels <= u16::MAX.into(), "Too many channels!");
    let frames = channels.first().map_or(0, Vec::len);
    if channels.iter().any(|channel| channel.len() != frames) {
        return Err("Channels must all be the same length".into());
    }

    let mut bytes = Vec::new();
    let mut writer = WavWriter::new(
        Cursor::new(&mut bytes),
        WavSpec {
            channels: num_channels as u16,
            sample_rate,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        },
    )?;
    for frame in 0..frames {
        for channel in channels {
            writer.write_sample(channel[frame])?;
        }
    }
    writer.finalize()?;

    Ok(bytes)
}

/// Creates a sound manager backed by the mock engine with the given (id, duration)
/// pairs already loaded. Locators are the ids themselves.
pub async fn mock_manager(
    sounds: &[(&str, &str)],
) -> (SoundManager<mock::Engine, MemoryTransport>, mock::Engine) {
    let (engine, events) = mock::Engine::new("mock");
    let transport = MemoryTransport::new();
    for (id, duration) in sounds {
        transport.insert(id, duration.as_bytes().to_vec());
    }

    let mut manager = SoundManager::new(engine.clone(), events, transport);
    let report = manager.load_all(sounds.iter().map(|(id, _)| (*id, *id))).await;
    assert!(report.failed.is_empty(), "failed to load {:?}", report.failed);
    (manager, engine)
}
