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

//! The audio engine boundary.
//!
//! Decoding, mixing and device output all live behind [`AudioEngine`]. The sound
//! manager only creates, starts and stops voices through it, and learns about voices
//! that have finished through an [`EngineEvent`] channel.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

mod decode;
mod error;
pub mod mock;
pub mod silent;

pub use decode::decode_bytes;
pub use error::{DecodeError, EngineError};

/// Global handle counter shared by voices and gain nodes.
static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

fn next_handle_id() -> u64 {
    NEXT_HANDLE_ID.fetch_add(1, Ordering::SeqCst)
}

/// Engine-side identity of a single playing voice.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VoiceHandle(u64);

impl VoiceHandle {
    pub(crate) fn next() -> VoiceHandle {
        VoiceHandle(next_handle_id())
    }
}

impl fmt::Display for VoiceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "voice#{}", self.0)
    }
}

/// A gain node in the engine's output graph. Every gain node is routed to the
/// output destination when it is created.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GainHandle(u64);

impl GainHandle {
    pub(crate) fn next() -> GainHandle {
        GainHandle(next_handle_id())
    }
}

impl fmt::Display for GainHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gain#{}", self.0)
    }
}

/// Notifications the engine delivers to the session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineEvent {
    /// The voice is no longer producing sound, either because it reached the end of
    /// its buffer or because it was stopped.
    Ended(VoiceHandle),
}

pub type EventSender = mpsc::UnboundedSender<EngineEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<EngineEvent>;

/// Creates the channel an engine uses to report voice events.
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Decoded audio, ready to be played by any number of voices.
/// The sample data is stored in an Arc so voices share it without copying.
#[derive(Clone)]
pub struct SampleBuffer {
    /// Interleaved f32 samples.
    data: Arc<Vec<f32>>,
    channel_count: u16,
    sample_rate: u32,
}

impl SampleBuffer {
    /// Creates a new buffer from interleaved samples.
    pub fn new(
        samples: Vec<f32>,
        channel_count: u16,
        sample_rate: u32,
    ) -> Result<SampleBuffer, DecodeError> {
        if channel_count == 0 {
            return Err(DecodeError::InvalidLayout("zero channels".to_string()));
        }
        if sample_rate == 0 {
            return Err(DecodeError::MissingSampleRate);
        }
        if samples.len() % channel_count as usize != 0 {
            return Err(DecodeError::InvalidLayout(format!(
                "{} samples do not divide into {} channels",
                samples.len(),
                channel_count
            )));
        }

        Ok(SampleBuffer {
            data: Arc::new(samples),
            channel_count,
            sample_rate,
        })
    }

    /// Returns the interleaved samples.
    pub fn samples(&self) -> &[f32] {
        &self.data
    }

    /// Returns the number of channels.
    pub fn channel_count(&self) -> u16 {
        self.channel_count
    }

    /// Returns the sample rate.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Returns the number of frames (samples per channel).
    pub fn frames(&self) -> usize {
        self.data.len() / self.channel_count as usize
    }

    /// Returns the playback length in seconds.
    pub fn duration(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Returns the memory size in bytes.
    pub fn memory_size(&self) -> usize {
        self.data.len() * std::mem::size_of::<f32>()
    }

    /// Returns true if both buffers share the same sample data.
    pub fn ptr_eq(&self, other: &SampleBuffer) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }
}

impl fmt::Debug for SampleBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SampleBuffer")
            .field("channel_count", &self.channel_count)
            .field("sample_rate", &self.sample_rate)
            .field("duration", &self.duration())
            .finish()
    }
}

/// The capabilities the sound manager needs from an audio backend.
///
/// All voice operations are fire-and-forget: they return as soon as the engine has
/// accepted the request. Times are in seconds on the engine's monotonic clock.
pub trait AudioEngine: Send + Sync + 'static {
    /// Decodes raw encoded audio into a sample buffer.
    fn decode(
        &self,
        bytes: Vec<u8>,
    ) -> impl Future<Output = Result<SampleBuffer, DecodeError>> + Send;

    /// Resumes the output context if it is suspended. Calling this while the context
    /// is already running is a no-op.
    fn resume_context(&self) -> impl Future<Output = Result<(), EngineError>> + Send;

    /// The engine's current time.
    fn current_time(&self) -> f64;

    /// Allocates a new gain node connected to the output destination.
    fn create_gain(&self) -> Result<GainHandle, EngineError>;

    /// Creates a voice that will play the given buffer.
    fn create_voice(&self, buffer: &SampleBuffer, looping: bool)
        -> Result<VoiceHandle, EngineError>;

    /// Releases a gain node. Voices still routed through it keep playing until stopped.
    fn release_gain(&self, gain: GainHandle) -> Result<(), EngineError>;

    /// Routes a voice through a gain node.
    fn connect(&self, voice: VoiceHandle, gain: GainHandle) -> Result<(), EngineError>;

    /// Releases a voice that was created but never started. Started voices are
    /// released by stopping them or letting them end.
    fn discard_voice(&self, voice: VoiceHandle) -> Result<(), EngineError>;

    /// Starts a voice at the given buffer offset. A voice can only be started once.
    fn start(&self, voice: VoiceHandle, offset: f64) -> Result<(), EngineError>;

    /// Stops a voice at engine time `when`. Any time at or before the current time
    /// stops it immediately.
    fn stop(&self, voice: VoiceHandle, when: f64) -> Result<(), EngineError>;

    /// Seconds the voice has been playing since it was started.
    fn elapsed(&self, voice: VoiceHandle) -> Result<f64, EngineError>;
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_buffer_duration() {
        let buffer = SampleBuffer::new(vec![0.0; 4410 * 2], 2, 44100).unwrap();
        assert_eq!(buffer.frames(), 4410);
        assert!((buffer.duration() - 0.1).abs() < f64::EPSILON);
        assert_eq!(buffer.memory_size(), 4410 * 2 * 4);
    }

    #[test]
    fn test_buffer_rejects_bad_layout() {
        assert!(matches!(
            SampleBuffer::new(vec![0.0; 3], 2, 44100),
            Err(DecodeError::InvalidLayout(_))
        ));
        assert!(matches!(
            SampleBuffer::new(vec![0.0; 4], 0, 44100),
            Err(DecodeError::InvalidLayout(_))
        ));
        assert!(matches!(
            SampleBuffer::new(vec![0.0; 4], 1, 0),
            Err(DecodeError::MissingSampleRate)
        ));
    }

    #[test]
    fn test_buffer_sharing() {
        let buffer = SampleBuffer::new(vec![0.0; 10], 1, 10).unwrap();
        let shared = buffer.clone();
        let other = SampleBuffer::new(vec![0.0; 10], 1, 10).unwrap();
        assert!(buffer.ptr_eq(&shared));
        assert!(!buffer.ptr_eq(&other));
    }

    #[test]
    fn test_handles_are_unique() {
        let first = VoiceHandle::next();
        let second = VoiceHandle::next();
        assert_ne!(first, second);
        assert_ne!(GainHandle::next(), GainHandle::next());
        assert!(first.to_string().starts_with("voice#"));
    }
}
