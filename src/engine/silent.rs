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

//! An engine that decodes real audio but renders nothing.
//!
//! Voices run against a monotonic clock and report their end through timers, so the
//! sound manager can be driven end to end without an output device.

use std::{
    collections::{HashMap, HashSet},
    fmt,
    sync::Arc,
    time::{Duration, Instant},
};

use parking_lot::Mutex;
use tokio::{runtime::Handle, task::JoinHandle};
use tracing::{debug, info};

use super::{
    decode_bytes, event_channel, AudioEngine, DecodeError, EngineError, EngineEvent,
    EventReceiver, EventSender, GainHandle, SampleBuffer, VoiceHandle,
};

struct Playback {
    started_at: Instant,
    /// Fires the end of the voice, either at the end of the buffer or at a scheduled stop.
    timer: Option<JoinHandle<()>>,
}

struct SilentVoice {
    duration: f64,
    looping: bool,
    gain: Option<GainHandle>,
    playback: Option<Playback>,
}

struct State {
    voices: HashMap<VoiceHandle, SilentVoice>,
    gains: HashSet<GainHandle>,
    suspended: bool,
}

/// A silent engine. The output context starts suspended, like a browser audio
/// context waiting for a user gesture.
#[derive(Clone)]
pub struct Engine {
    origin: Instant,
    state: Arc<Mutex<State>>,
    events_tx: EventSender,
}

impl Engine {
    /// Creates a new silent engine and the receiver for its events.
    pub fn new() -> (Engine, EventReceiver) {
        let (events_tx, events_rx) = event_channel();
        let engine = Engine {
            origin: Instant::now(),
            state: Arc::new(Mutex::new(State {
                voices: HashMap::new(),
                gains: HashSet::new(),
                suspended: true,
            })),
            events_tx,
        };
        (engine, events_rx)
    }

    /// Returns true if the output context is suspended.
    pub fn is_suspended(&self) -> bool {
        self.state.lock().suspended
    }

    /// Returns the number of voices that have been created and not yet ended.
    pub fn live_voices(&self) -> usize {
        self.state.lock().voices.len()
    }

    /// Returns the number of gain nodes that haven't been released.
    pub fn gain_count(&self) -> usize {
        self.state.lock().gains.len()
    }

    /// Schedules the end of a voice after `delay`.
    fn schedule_end(
        &self,
        runtime: &Handle,
        voice: VoiceHandle,
        delay: Duration,
    ) -> JoinHandle<()> {
        let state = self.state.clone();
        let events_tx = self.events_tx.clone();
        runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            Self::end_voice(&state, &events_tx, voice);
        })
    }

    /// Removes a voice and reports its end. Does nothing if it already ended.
    fn end_voice(state: &Mutex<State>, events_tx: &EventSender, voice: VoiceHandle) {
        if state.lock().voices.remove(&voice).is_some() {
            debug!(%voice, "Voice ended");
            let _ = events_tx.send(EngineEvent::Ended(voice));
        }
    }
}

impl AudioEngine for Engine {
    async fn decode(&self, bytes: Vec<u8>) -> Result<SampleBuffer, DecodeError> {
        tokio::task::spawn_blocking(move || decode_bytes(bytes))
            .await
            .map_err(|e| DecodeError::Task(e.to_string()))?
    }

    async fn resume_context(&self) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        if state.suspended {
            info!("Resuming output context.");
            state.suspended = false;
        }
        Ok(())
    }

    fn current_time(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }

    fn create_gain(&self) -> Result<GainHandle, EngineError> {
        let gain = GainHandle::next();
        self.state.lock().gains.insert(gain);
        Ok(gain)
    }

    fn release_gain(&self, gain: GainHandle) -> Result<(), EngineError> {
        if !self.state.lock().gains.remove(&gain) {
            return Err(EngineError::UnknownGain(gain));
        }
        Ok(())
    }

    fn create_voice(
        &self,
        buffer: &SampleBuffer,
        looping: bool,
    ) -> Result<VoiceHandle, EngineError> {
        let voice = VoiceHandle::next();
        self.state.lock().voices.insert(
            voice,
            SilentVoice {
                duration: buffer.duration(),
                looping,
                gain: None,
                playback: None,
            },
        );
        Ok(voice)
    }

    fn connect(&self, voice: VoiceHandle, gain: GainHandle) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        if !state.gains.contains(&gain) {
            return Err(EngineError::UnknownGain(gain));
        }
        let v = state
            .voices
            .get_mut(&voice)
            .ok_or(EngineError::UnknownVoice(voice))?;
        v.gain = Some(gain);
        Ok(())
    }

    fn discard_voice(&self, voice: VoiceHandle) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        let started = state
            .voices
            .get(&voice)
            .ok_or(EngineError::UnknownVoice(voice))?
            .playback
            .is_some();
        if started {
            return Err(EngineError::AlreadyStarted(voice));
        }
        state.voices.remove(&voice);
        Ok(())
    }

    fn start(&self, voice: VoiceHandle, offset: f64) -> Result<(), EngineError> {
        let runtime = Handle::try_current().map_err(|_| EngineError::NoRuntime(voice))?;

        let mut state = self.state.lock();
        let v = state
            .voices
            .get_mut(&voice)
            .ok_or(EngineError::UnknownVoice(voice))?;
        if v.playback.is_some() {
            return Err(EngineError::AlreadyStarted(voice));
        }
        if !offset.is_finite() || offset < 0.0 || offset > v.duration {
            return Err(EngineError::InvalidOffset {
                offset,
                duration: v.duration,
            });
        }

        // Looping voices only end when they are stopped.
        let timer = if v.looping {
            None
        } else {
            let remaining = Duration::from_secs_f64(v.duration - offset);
            Some(self.schedule_end(&runtime, voice, remaining))
        };
        v.playback = Some(Playback {
            started_at: Instant::now(),
            timer,
        });
        debug!(%voice, offset, gain = ?v.gain, "Voice started");
        Ok(())
    }

    fn stop(&self, voice: VoiceHandle, when: f64) -> Result<(), EngineError> {
        let delay = when - self.current_time();
        if delay > 0.0 {
            let runtime = Handle::try_current().map_err(|_| EngineError::NoRuntime(voice))?;
            let mut state = self.state.lock();
            let v = state
                .voices
                .get_mut(&voice)
                .ok_or(EngineError::UnknownVoice(voice))?;
            let playback = v.playback.as_mut().ok_or(EngineError::NotStarted(voice))?;
            if let Some(timer) = playback.timer.take() {
                timer.abort();
            }
            playback.timer = Some(self.schedule_end(
                &runtime,
                voice,
                Duration::from_secs_f64(delay),
            ));
            return Ok(());
        }

        let removed = {
            let mut state = self.state.lock();
            let started = state
                .voices
                .get(&voice)
                .ok_or(EngineError::UnknownVoice(voice))?
                .playback
                .is_some();
            if !started {
                return Err(EngineError::NotStarted(voice));
            }
            state.voices.remove(&voice)
        };
        if let Some(timer) = removed.and_then(|v| v.playback).and_then(|p| p.timer) {
            timer.abort();
        }
        debug!(%voice, "Voice stopped");
        let _ = self.events_tx.send(EngineEvent::Ended(voice));
        Ok(())
    }

    fn elapsed(&self, voice: VoiceHandle) -> Result<f64, EngineError> {
        let state = self.state.lock();
        let v = state
            .voices
            .get(&voice)
            .ok_or(EngineError::UnknownVoice(voice))?;
        Ok(v
            .playback
            .as_ref()
            .map(|p| p.started_at.elapsed().as_secs_f64())
            .unwrap_or(0.0))
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "silent")
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::*;
    use crate::testutil::wav_bytes;

    fn short_sound() -> Vec<u8> {
        // 50ms of mono silence.
        wav_bytes(&[vec![0.0; 2205]], 44100).unwrap()
    }

    #[tokio::test]
    async fn test_voice_ends_naturally() {
        let (engine, mut events) = Engine::new();
        let buffer = engine.decode(short_sound()).await.unwrap();
        assert!((buffer.duration() - 0.05).abs() < 1e-9);

        engine.resume_context().await.unwrap();
        assert!(!engine.is_suspended());

        let gain = engine.create_gain().unwrap();
        let voice = engine.create_voice(&buffer, false).unwrap();
        engine.connect(voice, gain).unwrap();
        engine.start(voice, 0.0).unwrap();

        let event = tokio::time::timeout(Duration::from_secs(3), events.recv())
            .await
            .expect("voice never ended");
        assert_eq!(event, Some(EngineEvent::Ended(voice)));
        assert_eq!(engine.live_voices(), 0);
        assert!(matches!(
            engine.elapsed(voice),
            Err(EngineError::UnknownVoice(_))
        ));
    }

    #[tokio::test]
    async fn test_stop_immediately() {
        let (engine, mut events) = Engine::new();
        let buffer = engine.decode(short_sound()).await.unwrap();
        let voice = engine.create_voice(&buffer, true).unwrap();
        engine.start(voice, 0.0).unwrap();
        assert!(engine.elapsed(voice).unwrap() >= 0.0);

        engine.stop(voice, 0.0).unwrap();
        assert_eq!(events.recv().await, Some(EngineEvent::Ended(voice)));
        assert!(matches!(
            engine.stop(voice, 0.0),
            Err(EngineError::UnknownVoice(_))
        ));
    }

    #[tokio::test]
    async fn test_scheduled_stop() {
        let (engine, mut events) = Engine::new();
        let buffer = engine.decode(short_sound()).await.unwrap();
        let voice = engine.create_voice(&buffer, true).unwrap();
        engine.start(voice, 0.0).unwrap();

        engine.stop(voice, engine.current_time() + 0.02).unwrap();
        assert_eq!(engine.live_voices(), 1);

        let event = tokio::time::timeout(Duration::from_secs(3), events.recv())
            .await
            .expect("voice never stopped");
        assert_eq!(event, Some(EngineEvent::Ended(voice)));
    }

    #[tokio::test]
    async fn test_invalid_start() {
        let (engine, _events) = Engine::new();
        let buffer = engine.decode(short_sound()).await.unwrap();
        let voice = engine.create_voice(&buffer, false).unwrap();
        assert!(matches!(
            engine.start(voice, 1.0),
            Err(EngineError::InvalidOffset { .. })
        ));
        assert!(matches!(
            engine.stop(voice, 0.0),
            Err(EngineError::NotStarted(_))
        ));
        engine.start(voice, 0.0).unwrap();
        assert!(matches!(
            engine.start(voice, 0.0),
            Err(EngineError::AlreadyStarted(_))
        ));
    }

    #[tokio::test]
    async fn test_release() {
        let (engine, _events) = Engine::new();
        let buffer = engine.decode(short_sound()).await.unwrap();
        let gain = engine.create_gain().unwrap();
        let voice = engine.create_voice(&buffer, false).unwrap();
        engine.connect(voice, gain).unwrap();
        assert!(matches!(
            engine.start(voice, 1.0),
            Err(EngineError::InvalidOffset { .. })
        ));

        engine.discard_voice(voice).unwrap();
        engine.release_gain(gain).unwrap();
        assert_eq!(engine.live_voices(), 0);
        assert_eq!(engine.gain_count(), 0);
        assert!(matches!(
            engine.release_gain(gain),
            Err(EngineError::UnknownGain(_))
        ));
    }

    #[test]
    fn test_start_without_runtime() {
        let (engine, _events) = Engine::new();
        let buffer = SampleBuffer::new(vec![0.0; 100], 1, 100).unwrap();
        let voice = engine.create_voice(&buffer, false).unwrap();
        assert!(matches!(
            engine.start(voice, 0.0),
            Err(EngineError::NoRuntime(_))
        ));
    }
}
