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

//! A scriptable engine for tests.
//!
//! Every call is recorded, the clock only moves when advanced, and failures can be
//! injected into the next start or stop.

use std::{
    collections::{HashMap, HashSet},
    fmt,
    sync::Arc,
};

use parking_lot::Mutex;
use tracing::{debug, info};

use super::{
    event_channel, AudioEngine, DecodeError, EngineError, EngineEvent, EventReceiver,
    EventSender, GainHandle, SampleBuffer, VoiceHandle,
};

/// Sample rate of the silent buffers produced by [`Engine::decode`].
pub const MOCK_SAMPLE_RATE: u32 = 100;

/// A call made against the mock engine.
#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    ResumeContext,
    CreateGain(GainHandle),
    ReleaseGain(GainHandle),
    CreateVoice { voice: VoiceHandle, looping: bool },
    Connect { voice: VoiceHandle, gain: GainHandle },
    DiscardVoice(VoiceHandle),
    Start { voice: VoiceHandle, offset: f64 },
    Stop { voice: VoiceHandle, when: f64 },
}

struct MockVoice {
    duration: f64,
    gain: Option<GainHandle>,
    started: bool,
    stopped: bool,
    elapsed: f64,
}

struct State {
    voices: HashMap<VoiceHandle, MockVoice>,
    gains: HashSet<GainHandle>,
    calls: Vec<Call>,
    time: f64,
    suspended: bool,
    fail_next_start: Option<String>,
    fail_next_stop: Option<String>,
}

/// A mock engine. Doesn't actually play anything; time only moves when told to.
///
/// Decoding treats the input as UTF-8 text holding a duration in seconds and
/// produces a silent mono buffer of that length.
#[derive(Clone)]
pub struct Engine {
    name: String,
    state: Arc<Mutex<State>>,
    events_tx: EventSender,
}

impl Engine {
    /// Creates a new mock engine and the receiver for its events.
    pub fn new(name: &str) -> (Engine, EventReceiver) {
        let (events_tx, events_rx) = event_channel();
        let engine = Engine {
            name: name.to_string(),
            state: Arc::new(Mutex::new(State {
                voices: HashMap::new(),
                gains: HashSet::new(),
                calls: Vec::new(),
                time: 0.0,
                suspended: true,
                fail_next_start: None,
                fail_next_stop: None,
            })),
            events_tx,
        };
        (engine, events_rx)
    }

    /// Returns every call made so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    /// Returns the stop calls made so far.
    pub fn stops(&self) -> Vec<(VoiceHandle, f64)> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                Call::Stop { voice, when } => Some((*voice, *when)),
                _ => None,
            })
            .collect()
    }

    /// Returns the start calls made so far.
    pub fn starts(&self) -> Vec<(VoiceHandle, f64)> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                Call::Start { voice, offset } => Some((*voice, *offset)),
                _ => None,
            })
            .collect()
    }

    /// Returns true if the output context is suspended.
    pub fn is_suspended(&self) -> bool {
        self.state.lock().suspended
    }

    /// Returns true if the given voice has been stopped or has finished.
    pub fn is_stopped(&self, voice: VoiceHandle) -> bool {
        self.state
            .lock()
            .voices
            .get(&voice)
            .is_some_and(|v| v.stopped)
    }

    /// Returns true if the engine still knows the voice.
    pub fn has_voice(&self, voice: VoiceHandle) -> bool {
        self.state.lock().voices.contains_key(&voice)
    }

    /// Returns the number of gain nodes that haven't been released.
    pub fn gain_count(&self) -> usize {
        self.state.lock().gains.len()
    }

    /// Returns the gain node a voice is routed through.
    pub fn gain_of(&self, voice: VoiceHandle) -> Option<GainHandle> {
        self.state.lock().voices.get(&voice).and_then(|v| v.gain)
    }

    /// Sets how long the given voice reports it has been playing.
    pub fn set_elapsed(&self, voice: VoiceHandle, elapsed: f64) {
        if let Some(v) = self.state.lock().voices.get_mut(&voice) {
            v.elapsed = elapsed;
        }
    }

    /// Moves the engine clock forward, advancing every playing voice with it.
    pub fn advance(&self, seconds: f64) {
        let mut state = self.state.lock();
        state.time += seconds;
        for voice in state.voices.values_mut() {
            if voice.started && !voice.stopped {
                voice.elapsed += seconds;
            }
        }
    }

    /// Makes the next call to start fail.
    pub fn fail_next_start(&self, reason: &str) {
        self.state.lock().fail_next_start = Some(reason.to_string());
    }

    /// Makes the next call to stop fail.
    pub fn fail_next_stop(&self, reason: &str) {
        self.state.lock().fail_next_stop = Some(reason.to_string());
    }

    /// Simulates a voice reaching the end of its buffer. The engine forgets the voice
    /// right away; the end event is delivered like any other.
    pub fn finish(&self, voice: VoiceHandle) {
        if self.state.lock().voices.remove(&voice).is_some() {
            let _ = self.events_tx.send(EngineEvent::Ended(voice));
        }
    }

    fn record(state: &mut State, call: Call) {
        debug!(call = ?call, "Mock engine call");
        state.calls.push(call);
    }
}

impl AudioEngine for Engine {
    async fn decode(&self, bytes: Vec<u8>) -> Result<SampleBuffer, DecodeError> {
        let text = std::str::from_utf8(&bytes)
            .map_err(|e| DecodeError::Malformed(format!("not a mock sound: {}", e)))?;
        let seconds: f64 = text
            .trim()
            .parse()
            .map_err(|e| DecodeError::Malformed(format!("not a mock sound: {}", e)))?;
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(DecodeError::Malformed(format!(
                "invalid mock duration {}",
                seconds
            )));
        }

        let frames = (seconds * MOCK_SAMPLE_RATE as f64).round() as usize;
        SampleBuffer::new(vec![0.0; frames], 1, MOCK_SAMPLE_RATE)
    }

    async fn resume_context(&self) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        if state.suspended {
            info!(engine = self.name, "Resuming output context.");
            state.suspended = false;
        }
        Self::record(&mut state, Call::ResumeContext);
        Ok(())
    }

    fn current_time(&self) -> f64 {
        self.state.lock().time
    }

    fn create_gain(&self) -> Result<GainHandle, EngineError> {
        let gain = GainHandle::next();
        let mut state = self.state.lock();
        state.gains.insert(gain);
        Self::record(&mut state, Call::CreateGain(gain));
        Ok(gain)
    }

    fn release_gain(&self, gain: GainHandle) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        if !state.gains.remove(&gain) {
            return Err(EngineError::UnknownGain(gain));
        }
        Self::record(&mut state, Call::ReleaseGain(gain));
        Ok(())
    }

    fn create_voice(
        &self,
        buffer: &SampleBuffer,
        looping: bool,
    ) -> Result<VoiceHandle, EngineError> {
        let voice = VoiceHandle::next();
        let mut state = self.state.lock();
        state.voices.insert(
            voice,
            MockVoice {
                duration: buffer.duration(),
                gain: None,
                started: false,
                stopped: false,
                elapsed: 0.0,
            },
        );
        Self::record(&mut state, Call::CreateVoice { voice, looping });
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
        Self::record(&mut state, Call::Connect { voice, gain });
        Ok(())
    }

    fn discard_voice(&self, voice: VoiceHandle) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        let v = state
            .voices
            .get(&voice)
            .ok_or(EngineError::UnknownVoice(voice))?;
        if v.started {
            return Err(EngineError::AlreadyStarted(voice));
        }
        state.voices.remove(&voice);
        Self::record(&mut state, Call::DiscardVoice(voice));
        Ok(())
    }

    fn start(&self, voice: VoiceHandle, offset: f64) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        if let Some(reason) = state.fail_next_start.take() {
            return Err(EngineError::Failed(reason));
        }
        let v = state
            .voices
            .get_mut(&voice)
            .ok_or(EngineError::UnknownVoice(voice))?;
        if v.started {
            return Err(EngineError::AlreadyStarted(voice));
        }
        if offset < 0.0 || offset > v.duration {
            return Err(EngineError::InvalidOffset {
                offset,
                duration: v.duration,
            });
        }
        v.started = true;
        Self::record(&mut state, Call::Start { voice, offset });
        Ok(())
    }

    fn stop(&self, voice: VoiceHandle, when: f64) -> Result<(), EngineError> {
        {
            let mut state = self.state.lock();
            if let Some(reason) = state.fail_next_stop.take() {
                return Err(EngineError::Failed(reason));
            }
            let v = state
                .voices
                .get_mut(&voice)
                .ok_or(EngineError::UnknownVoice(voice))?;
            if !v.started {
                return Err(EngineError::NotStarted(voice));
            }
            v.stopped = true;
            Self::record(&mut state, Call::Stop { voice, when });
        }
        // Stopped voices report their end just like finished ones.
        let _ = self.events_tx.send(EngineEvent::Ended(voice));
        Ok(())
    }

    fn elapsed(&self, voice: VoiceHandle) -> Result<f64, EngineError> {
        self.state
            .lock()
            .voices
            .get(&voice)
            .map(|v| v.elapsed)
            .ok_or(EngineError::UnknownVoice(voice))
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name)
    }
}
