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

//! The sound manager session: loading, voice playback and seeking.

use std::num::NonZeroUsize;

use tracing::{debug, error, info, warn};

use super::library::AssetLibrary;
use super::voice::{Voice, VoiceId, VoiceInfo, VoiceRegistry};
use super::SoundError;
use crate::engine::{
    AudioEngine, EngineError, EngineEvent, EventReceiver, GainHandle, SampleBuffer,
};
use crate::transport::Transport;

/// Default distance, in seconds, moved by forward and backward.
pub const DEFAULT_SEEK_SECONDS: f64 = 5.0;

/// The outcome of loading a batch of sounds.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub loaded: Vec<String>,
    pub failed: Vec<(String, SoundError)>,
}

/// Owns the audio engine, the loaded sounds and every active voice.
///
/// All methods take `&mut self`, so control calls and engine events are applied
/// one at a time on whichever task owns the manager.
pub struct SoundManager<E: AudioEngine, T: Transport> {
    engine: E,
    /// Receives end-of-voice notifications from the engine.
    events: EventReceiver,
    transport: T,
    library: AssetLibrary,
    registry: VoiceRegistry,
    seek_step: f64,
}

impl<E: AudioEngine, T: Transport> SoundManager<E, T> {
    /// Creates a new sound manager.
    pub fn new(engine: E, events: EventReceiver, transport: T) -> Self {
        Self {
            engine,
            events,
            transport,
            library: AssetLibrary::new(None),
            registry: VoiceRegistry::new(),
            seek_step: DEFAULT_SEEK_SECONDS,
        }
    }

    /// Limits the number of sounds kept in memory.
    pub fn with_max_assets(mut self, max_assets: Option<NonZeroUsize>) -> Self {
        self.library = AssetLibrary::new(max_assets);
        self
    }

    /// Sets the default distance used by forward and backward.
    pub fn with_seek_step(mut self, seconds: f64) -> Self {
        self.seek_step = seconds;
        self
    }

    /// Fetches and decodes a sound, storing it under `id`. A failure leaves any
    /// previously loaded sound for `id` in place.
    pub async fn load(&mut self, id: &str, locator: &str) -> Result<SampleBuffer, SoundError> {
        info!(id, locator, "Loading sound");

        let bytes = self
            .transport
            .fetch(locator)
            .await
            .map_err(|source| SoundError::Transport {
                id: id.to_string(),
                source,
            })
            .inspect_err(|e| error!(id, error = %e, "Failed to load sound"))?;

        let buffer = self
            .engine
            .decode(bytes)
            .await
            .map_err(|source| SoundError::Decode {
                id: id.to_string(),
                source,
            })
            .inspect_err(|e| error!(id, error = %e, "Failed to load sound"))?;

        if let Some(evicted) = self.library.insert(id, buffer.clone()) {
            info!(id = %evicted, "Evicted sound to make room");
        }

        info!(
            id,
            channels = buffer.channel_count(),
            sample_rate = buffer.sample_rate(),
            duration_ms = (buffer.duration() * 1000.0) as u64,
            "Sound loaded"
        );
        Ok(buffer)
    }

    /// Loads every (id, locator) pair. A failure is recorded and loading continues.
    pub async fn load_all<'a, I>(&mut self, assets: I) -> LoadReport
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut report = LoadReport::default();
        for (id, locator) in assets {
            match self.load(id, locator).await {
                Ok(_) => report.loaded.push(id.to_string()),
                Err(e) => report.failed.push((id.to_string(), e)),
            }
        }

        info!(
            loaded = report.loaded.len(),
            failed = report.failed.len(),
            memory_kb = self.library.total_memory_usage() / 1024,
            "Sounds loaded"
        );
        report
    }

    /// Starts a new voice for the sound from the beginning. Voices already playing
    /// for the same id keep playing.
    pub async fn play(&mut self, id: &str, looping: bool) -> Result<VoiceId, SoundError> {
        let buffer = match self.library.get(id) {
            Some(buffer) => buffer.clone(),
            None => {
                warn!(id, "Sound not found");
                return Err(SoundError::AssetNotFound(id.to_string()));
            }
        };

        self.engine.resume_context().await?;

        let gain = self.engine.create_gain()?;
        let voice = match self.start_voice(id, buffer, gain, looping, 0.0) {
            Ok(voice) => voice,
            Err(e) => {
                error!(id, error = %e, "Failed to start voice");
                self.release_gain(gain);
                return Err(e.into());
            }
        };
        let handle = voice.handle();
        let voice_id = self.registry.insert(voice);

        debug!(
            id,
            %handle,
            looping,
            voices = self.registry.count(id),
            "Sound playing"
        );
        Ok(voice_id)
    }

    /// Stops every voice for the sound at the engine's current time.
    /// There's no resume; the next play starts from the beginning.
    pub fn pause(&mut self, id: &str) -> Result<usize, SoundError> {
        let now = self.engine.current_time();
        self.halt(id, now, "paused")
    }

    /// Stops every voice for the sound immediately.
    pub fn stop(&mut self, id: &str) -> Result<usize, SoundError> {
        self.halt(id, 0.0, "stopped")
    }

    /// Moves every voice for the sound ahead by `seconds`, wrapping past the end.
    pub fn forward(&mut self, id: &str, seconds: f64) -> Result<usize, SoundError> {
        self.seek(id, seconds, |position, duration| {
            (duration + position + seconds).rem_euclid(duration)
        })
    }

    /// Moves every voice for the sound back by `seconds`, stopping at the start.
    pub fn backward(&mut self, id: &str, seconds: f64) -> Result<usize, SoundError> {
        self.seek(id, seconds, |position, duration| {
            (position - seconds).clamp(0.0, duration)
        })
    }

    /// Stops every voice for every sound. Voices the engine refuses to stop stay tracked.
    pub fn stop_all(&mut self) -> usize {
        let mut stopped = 0;
        for voice_id in self.registry.all_ids() {
            match self.stop_voice(voice_id, 0.0) {
                Ok(true) => stopped += 1,
                Ok(false) => {}
                Err(e) => warn!(error = %e, "Failed to stop voice"),
            }
        }

        if stopped > 0 {
            info!(stopped, "All sounds stopped");
        }
        stopped
    }

    /// Applies an engine event.
    pub fn handle_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::Ended(handle) => match self.registry.remove_by_handle(handle) {
                Some((voice_id, voice)) => {
                    debug!(id = voice.asset_id(), voice = ?voice_id, "Voice finished");
                    self.release_gain(voice.gain());
                }
                // Voices that were stopped or replaced are already gone.
                None => debug!(%handle, "Ignoring end of untracked voice"),
            },
        }
    }

    /// Applies every engine event that has already arrived. Returns how many there were.
    pub fn process_pending_events(&mut self) -> usize {
        let mut processed = 0;
        while let Ok(event) = self.events.try_recv() {
            self.handle_event(event);
            processed += 1;
        }
        processed
    }

    /// Waits for the next engine event.
    pub async fn next_event(&mut self) -> Option<EngineEvent> {
        self.events.recv().await
    }

    /// Returns the voices currently playing for a sound, in start order.
    pub fn voices(&self, id: &str) -> Vec<VoiceInfo> {
        self.registry
            .voices(id)
            .map(|(voice_id, voice)| VoiceInfo {
                id: voice_id,
                handle: voice.handle(),
                gain: voice.gain(),
                looping: voice.looping(),
                started_at_offset: voice.started_at_offset(),
                engine_start_time: voice.engine_start_time(),
            })
            .collect()
    }

    /// Returns the number of voices across all sounds.
    pub fn active_voice_count(&self) -> usize {
        self.registry.len()
    }

    /// Returns true if a sound has been loaded under the id.
    pub fn is_loaded(&self, id: &str) -> bool {
        self.library.contains(id)
    }

    /// Returns the loaded sound for an id.
    pub fn get(&self, id: &str) -> Option<&SampleBuffer> {
        self.library.get(id)
    }

    pub fn library(&self) -> &AssetLibrary {
        &self.library
    }

    pub fn seek_step(&self) -> f64 {
        self.seek_step
    }

    /// Returns true if the id names a loaded sound or one with tracked voices.
    fn is_known(&self, id: &str) -> bool {
        self.library.contains(id) || self.registry.has_slot(id)
    }

    /// Creates, routes and starts a voice.
    fn start_voice(
        &self,
        id: &str,
        buffer: SampleBuffer,
        gain: GainHandle,
        looping: bool,
        offset: f64,
    ) -> Result<Voice, EngineError> {
        let handle = self.engine.create_voice(&buffer, looping)?;
        if let Err(e) = self
            .engine
            .connect(handle, gain)
            .and_then(|()| self.engine.start(handle, offset))
        {
            if let Err(discard) = self.engine.discard_voice(handle) {
                debug!(id, %handle, error = %discard, "Failed to discard voice");
            }
            return Err(e);
        }
        let engine_start_time = self.engine.current_time();
        Ok(Voice::new(
            id,
            buffer,
            handle,
            gain,
            looping,
            offset,
            engine_start_time,
        ))
    }

    /// Stops a voice and stops tracking it. Returns false if the voice isn't tracked.
    /// A voice the engine refuses to stop stays tracked so it can be stopped later.
    fn stop_voice(&mut self, voice_id: VoiceId, when: f64) -> Result<bool, EngineError> {
        let Some(voice) = self.registry.get(voice_id) else {
            return Ok(false);
        };
        let handle = voice.handle();
        match self.engine.stop(handle, when) {
            Ok(()) => {}
            // The voice ended on its own and its event hasn't been processed yet.
            Err(EngineError::UnknownVoice(_)) => {
                debug!(id = voice.asset_id(), %handle, "Voice already ended");
            }
            Err(e) => return Err(e),
        }
        self.forget(voice_id);
        Ok(true)
    }

    /// Unregisters a voice and releases its gain node.
    fn forget(&mut self, voice_id: VoiceId) {
        if let Some(voice) = self.registry.remove(voice_id) {
            self.release_gain(voice.gain());
        }
    }

    fn release_gain(&self, gain: GainHandle) {
        if let Err(e) = self.engine.release_gain(gain) {
            debug!(%gain, error = %e, "Failed to release gain node");
        }
    }

    /// Stops and unregisters every voice for an id.
    fn halt(&mut self, id: &str, when: f64, action: &str) -> Result<usize, SoundError> {
        if !self.is_known(id) {
            warn!(id, "Sound not found");
            return Err(SoundError::AssetNotFound(id.to_string()));
        }

        let mut stopped = 0;
        let mut first_error = None;
        for voice_id in self.registry.ids(id) {
            match self.stop_voice(voice_id, when) {
                Ok(true) => stopped += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!(id, error = %e, "Failed to stop voice");
                    first_error.get_or_insert(e);
                }
            }
        }

        if stopped > 0 {
            info!(id, stopped, action, "Sound halted");
        }
        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(stopped),
        }
    }

    /// Replaces every voice for an id with one starting at a new offset. The new
    /// offset is computed from the voice's current position and buffer duration.
    fn seek<F>(&mut self, id: &str, seconds: f64, new_offset: F) -> Result<usize, SoundError>
    where
        F: Fn(f64, f64) -> f64,
    {
        if !seconds.is_finite() {
            return Err(SoundError::InvalidSeek(seconds));
        }
        if !self.is_known(id) {
            warn!(id, "Sound not found");
            return Err(SoundError::AssetNotFound(id.to_string()));
        }

        let mut replaced = 0;
        let mut first_error = None;
        for voice_id in self.registry.ids(id) {
            let Some(voice) = self.registry.get(voice_id) else {
                continue;
            };
            let handle = voice.handle();
            let gain = voice.gain();
            let looping = voice.looping();
            let buffer = voice.buffer().clone();

            let position = match self.engine.elapsed(handle) {
                Ok(elapsed) => voice.position(elapsed),
                // The voice ended on its own and its event hasn't been processed yet.
                Err(EngineError::UnknownVoice(_)) => {
                    debug!(id, %handle, "Dropping voice that already ended");
                    self.forget(voice_id);
                    continue;
                }
                Err(e) => {
                    warn!(id, %handle, error = %e, "Failed to read voice position");
                    first_error.get_or_insert(e);
                    continue;
                }
            };
            let duration = buffer.duration();
            let offset = if duration > 0.0 {
                new_offset(position, duration)
            } else {
                0.0
            };

            match self.engine.stop(handle, 0.0) {
                Ok(()) => {}
                Err(EngineError::UnknownVoice(_)) => {
                    debug!(id, %handle, "Dropping voice that already ended");
                    self.forget(voice_id);
                    continue;
                }
                // The voice is still playing, so it stays tracked and isn't replaced.
                Err(e) => {
                    warn!(id, %handle, error = %e, "Failed to stop voice");
                    first_error.get_or_insert(e);
                    continue;
                }
            }

            match self.start_voice(id, buffer, gain, looping, offset) {
                Ok(replacement) => {
                    let new_handle = replacement.handle();
                    self.registry.replace(voice_id, replacement);
                    debug!(id, from = position, to = offset, %new_handle, "Voice moved");
                    replaced += 1;
                }
                Err(e) => {
                    error!(id, error = %e, "Failed to restart voice");
                    self.forget(voice_id);
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(replaced),
        }
    }
}

impl<E: AudioEngine, T: Transport> std::fmt::Debug for SoundManager<E, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoundManager")
            .field("library", &self.library)
            .field("registry", &self.registry)
            .field("seek_step", &self.seek_step)
            .finish()
    }
}
