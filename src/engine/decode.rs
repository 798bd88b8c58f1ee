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

//! Decodes encoded audio held in memory into a [`SampleBuffer`] using symphonia.

use std::io::Cursor;

use symphonia::core::audio::SampleBuffer as PcmBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};
use tracing::{debug, warn};

use super::{DecodeError, SampleBuffer};

/// Decodes a complete encoded audio file (WAV, MP3, FLAC, OGG, ...) into memory.
pub fn decode_bytes(bytes: Vec<u8>) -> Result<SampleBuffer, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::Malformed("empty input".to_string()));
    }

    let byte_count = bytes.len();
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let meta_opts: MetadataOptions = Default::default();
    let fmt_opts: FormatOptions = Default::default();
    let probed = get_probe().format(&Hint::new(), mss, &fmt_opts, &meta_opts)?;
    let mut format_reader = probed.format;

    let track = format_reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(DecodeError::NoTrack)?;
    let track_id = track.id;
    let params = track.codec_params.clone();

    let sample_rate = params.sample_rate.ok_or(DecodeError::MissingSampleRate)?;
    let mut channel_count = params.channels.map(|c| c.count() as u16).unwrap_or(0);

    let decoder_opts: DecoderOptions = Default::default();
    let mut decoder = get_codecs().make(&params, &decoder_opts)?;

    let mut samples: Vec<f32> = Vec::new();
    loop {
        let packet = match format_reader.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(e) => return Err(e.into()),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                // A single corrupt packet shouldn't throw away the rest of the sound.
                warn!(error = e, "Skipping undecodable packet");
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let spec = *decoded.spec();
        if channel_count == 0 {
            channel_count = spec.channels.count() as u16;
        }
        let mut pcm = PcmBuffer::<f32>::new(decoded.capacity() as u64, spec);
        pcm.copy_interleaved_ref(decoded);
        samples.extend_from_slice(pcm.samples());
    }

    if channel_count == 0 {
        return Err(DecodeError::InvalidLayout(
            "unable to determine channel count".to_string(),
        ));
    }

    let buffer = SampleBuffer::new(samples, channel_count, sample_rate)?;
    debug!(
        bytes = byte_count,
        channels = channel_count,
        sample_rate,
        duration = buffer.duration(),
        "Decoded audio"
    );
    Ok(buffer)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testutil::wav_bytes;

    #[test]
    fn test_decode_wav() {
        let left: Vec<f32> = (0..4410).map(|i| (i as f32 / 4410.0).sin()).collect();
        let right: Vec<f32> = left.iter().map(|s| -s).collect();
        let bytes = wav_bytes(&[left, right], 44100).unwrap();

        let buffer = decode_bytes(bytes).unwrap();
        assert_eq!(buffer.channel_count(), 2);
        assert_eq!(buffer.sample_rate(), 44100);
        assert_eq!(buffer.frames(), 4410);
        assert!((buffer.duration() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_decode_empty() {
        assert!(matches!(
            decode_bytes(Vec::new()),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn test_decode_garbage() {
        let garbage = b"this is definitely not an audio file".to_vec();
        assert!(decode_bytes(garbage).is_err());
    }
}
