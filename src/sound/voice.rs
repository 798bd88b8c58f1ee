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

//! Voice tracking for polyphonic playback.
//!
//! Voices live in an arena keyed by [`VoiceId`]. Each asset id keeps the order its
//! voices were started in, and the engine handle of every voice maps back to its
//! id so end-of-voice events remove exactly the voice that ended.

use std::collections::HashMap;

use slotmap::{new_key_type, SlotMap};

use crate::engine::{GainHandle, SampleBuffer, VoiceHandle};

new_key_type! {
    /// Identity of a voice tracked by the registry.
    pub struct VoiceId;
}

/// Represents an active voice playing a sound.
pub struct Voice {
    /// The asset id the voice was started for.
    asset_id: String,
    /// The buffer being played.
    buffer: SampleBuffer,
    /// The engine's handle for this voice.
    handle: VoiceHandle,
    /// The gain node this voice is routed through. Kept across seeks.
    gain: GainHandle,
    looping: bool,
    /// Buffer position (seconds) playback began from.
    started_at_offset: f64,
    /// Engine time when the voice began.
    engine_start_time: f64,
}

impl Voice {
    /// Creates a new voice.
    pub fn new(
        asset_id: &str,
        buffer: SampleBuffer,
        handle: VoiceHandle,
        gain: GainHandle,
        looping: bool,
        started_at_offset: f64,
        engine_start_time: f64,
    ) -> Voice {
        Voice {
            asset_id: asset_id.to_string(),
            buffer,
            handle,
            gain,
            looping,
            started_at_offset,
            engine_start_time,
        }
    }

    pub fn asset_id(&self) -> &str {
        &self.asset_id
    }

    pub fn buffer(&self) -> &SampleBuffer {
        &self.buffer
    }

    pub fn handle(&self) -> VoiceHandle {
        self.handle
    }

    pub fn gain(&self) -> GainHandle {
        self.gain
    }

    pub fn looping(&self) -> bool {
        self.looping
    }

    pub fn started_at_offset(&self) -> f64 {
        self.started_at_offset
    }

    pub fn engine_start_time(&self) -> f64 {
        self.engine_start_time
    }

    /// Returns the buffer position reached after `elapsed` seconds of playback.
    /// Looping voices wrap around the end of the buffer; others stop at it.
    pub fn position(&self, elapsed: f64) -> f64 {
        let duration = self.buffer.duration();
        if duration <= 0.0 {
            return 0.0;
        }

        let position = self.started_at_offset + elapsed.max(0.0);
        if self.looping {
            position.rem_euclid(duration)
        } else {
            position.min(duration)
        }
    }
}

/// A read-only snapshot of a registered voice.
#[derive(Clone, Debug, PartialEq)]
pub struct VoiceInfo {
    pub id: VoiceId,
    pub handle: VoiceHandle,
    pub gain: GainHandle,
    pub looping: bool,
    pub started_at_offset: f64,
    pub engine_start_time: f64,
}

/// Tracks the active voices for every asset id.
#[derive(Default)]
pub struct VoiceRegistry {
    voices: SlotMap<VoiceId, Voice>,
    /// Voices per asset id, in the order they were started.
    slots: HashMap<String, Vec<VoiceId>>,
    by_handle: HashMap<VoiceHandle, VoiceId>,
}

impl VoiceRegistry {
    pub fn new() -> VoiceRegistry {
        VoiceRegistry::default()
    }

    /// Appends a voice to the slot for its asset id.
    pub fn insert(&mut self, voice: Voice) -> VoiceId {
        let handle = voice.handle;
        let asset_id = voice.asset_id.clone();
        let id = self.voices.insert(voice);
        self.by_handle.insert(handle, id);
        self.slots.entry(asset_id).or_default().push(id);
        id
    }

    /// Replaces a voice with another for the same asset id, keeping its place in the
    /// slot. Returns the id of the replacement, or `None` if `id` isn't registered.
    pub fn replace(&mut self, id: VoiceId, mut replacement: Voice) -> Option<VoiceId> {
        let old = self.voices.remove(id)?;
        self.by_handle.remove(&old.handle);

        // A voice never moves to another asset id.
        replacement.asset_id = old.asset_id;
        let handle = replacement.handle;
        let asset_id = replacement.asset_id.clone();
        let new_id = self.voices.insert(replacement);
        self.by_handle.insert(handle, new_id);

        let slot = self.slots.entry(asset_id).or_default();
        match slot.iter().position(|v| *v == id) {
            Some(index) => slot[index] = new_id,
            None => slot.push(new_id),
        }
        Some(new_id)
    }

    /// Removes a single voice.
    pub fn remove(&mut self, id: VoiceId) -> Option<Voice> {
        let voice = self.voices.remove(id)?;
        self.by_handle.remove(&voice.handle);
        if let Some(slot) = self.slots.get_mut(&voice.asset_id) {
            slot.retain(|v| *v != id);
        }
        Some(voice)
    }

    /// Removes the voice with the given engine handle, if it's still tracked.
    pub fn remove_by_handle(&mut self, handle: VoiceHandle) -> Option<(VoiceId, Voice)> {
        let id = *self.by_handle.get(&handle)?;
        self.remove(id).map(|voice| (id, voice))
    }

    /// Returns the ids of every voice, across all asset ids.
    pub fn all_ids(&self) -> Vec<VoiceId> {
        self.voices.keys().collect()
    }

    pub fn get(&self, id: VoiceId) -> Option<&Voice> {
        self.voices.get(id)
    }

    /// Returns the ids of the voices for an asset id, in order.
    pub fn ids(&self, asset_id: &str) -> Vec<VoiceId> {
        self.slots.get(asset_id).cloned().unwrap_or_default()
    }

    /// Returns the voices for an asset id, in order.
    pub fn voices<'a>(&'a self, asset_id: &str) -> impl Iterator<Item = (VoiceId, &'a Voice)> {
        self.slots
            .get(asset_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.voices.get(*id).map(|voice| (*id, voice)))
    }

    /// Returns true if the asset id has ever had a voice registered.
    pub fn has_slot(&self, asset_id: &str) -> bool {
        self.slots.contains_key(asset_id)
    }

    /// Returns the number of voices for an asset id.
    pub fn count(&self, asset_id: &str) -> usize {
        self.slots.get(asset_id).map_or(0, Vec::len)
    }

    /// Returns the number of voices across all asset ids.
    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }
}

impl std::fmt::Debug for VoiceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoiceRegistry")
            .field("active_voices", &self.voices.len())
            .field("slots", &self.slots.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_voice(asset_id: &str, looping: bool, offset: f64) -> Voice {
        // Ten seconds of mono audio at 100Hz.
        let buffer = SampleBuffer::new(vec![0.0; 1000], 1, 100).unwrap();
        Voice::new(
            asset_id,
            buffer,
            VoiceHandle::next(),
            GainHandle::next(),
            looping,
            offset,
            0.0,
        )
    }

    #[test]
    fn test_voice_position() {
        let voice = make_voice("bgm", false, 2.0);
        assert_eq!(voice.position(3.0), 5.0);
        assert_eq!(voice.position(30.0), 10.0);
        assert_eq!(voice.position(-1.0), 2.0);

        let looping = make_voice("bgm", true, 2.0);
        assert_eq!(looping.position(3.0), 5.0);
        assert_eq!(looping.position(9.0), 1.0);
    }

    #[test]
    fn test_overlapping_voices() {
        let mut registry = VoiceRegistry::new();
        let first = registry.insert(make_voice("click", false, 0.0));
        let second = registry.insert(make_voice("click", false, 0.0));
        registry.insert(make_voice("bgm", true, 0.0));

        assert_eq!(registry.ids("click"), vec![first, second]);
        assert_eq!(registry.count("bgm"), 1);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_remove_by_handle_is_identity_based() {
        let mut registry = VoiceRegistry::new();
        let first = registry.insert(make_voice("click", false, 0.0));
        let second = registry.insert(make_voice("click", false, 0.0));
        let third = registry.insert(make_voice("click", false, 0.0));

        let handle = registry.get(second).unwrap().handle();
        let (removed, voice) = registry.remove_by_handle(handle).unwrap();
        assert_eq!(removed, second);
        assert_eq!(voice.asset_id(), "click");
        assert_eq!(registry.ids("click"), vec![first, third]);

        // The same end event arriving twice is harmless.
        assert!(registry.remove_by_handle(handle).is_none());
        assert_eq!(registry.ids("click"), vec![first, third]);
    }

    #[test]
    fn test_replace_keeps_order() {
        let mut registry = VoiceRegistry::new();
        let first = registry.insert(make_voice("bgm", false, 0.0));
        let second = registry.insert(make_voice("bgm", false, 0.0));
        let old_handle = registry.get(first).unwrap().handle();

        let replacement = make_voice("other", false, 4.0);
        let new_handle = replacement.handle();
        let replaced = registry.replace(first, replacement).unwrap();

        assert_eq!(registry.ids("bgm"), vec![replaced, second]);
        assert_eq!(registry.count("other"), 0);
        assert_eq!(registry.get(replaced).unwrap().asset_id(), "bgm");
        assert_eq!(registry.get(replaced).unwrap().started_at_offset(), 4.0);
        assert!(registry.get(first).is_none());

        // The replaced voice's handle no longer resolves; the new one does.
        assert!(registry.remove_by_handle(old_handle).is_none());
        assert!(registry.remove_by_handle(new_handle).is_some());
        assert_eq!(registry.ids("bgm"), vec![second]);
    }

    #[test]
    fn test_replace_unknown() {
        let mut registry = VoiceRegistry::new();
        let id = registry.insert(make_voice("bgm", false, 0.0));
        registry.remove(id);
        assert!(registry.replace(id, make_voice("bgm", false, 0.0)).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_removing_every_voice_keeps_slot() {
        let mut registry = VoiceRegistry::new();
        registry.insert(make_voice("click", false, 0.0));
        registry.insert(make_voice("click", false, 0.0));
        let bgm = registry.insert(make_voice("bgm", true, 0.0));

        let handles: Vec<_> = registry
            .voices("click")
            .map(|(_, voice)| voice.handle())
            .collect();
        for id in registry.ids("click") {
            assert!(registry.remove(id).is_some());
        }
        assert_eq!(registry.count("click"), 0);
        assert!(registry.has_slot("click"));
        assert_eq!(registry.ids("bgm"), vec![bgm]);

        for handle in handles {
            assert!(registry.remove_by_handle(handle).is_none());
        }
        assert!(!registry.has_slot("never"));
    }

    #[test]
    fn test_all_ids() {
        let mut registry = VoiceRegistry::new();
        let click = registry.insert(make_voice("click", false, 0.0));
        let bgm = registry.insert(make_voice("bgm", true, 0.0));

        let mut ids = registry.all_ids();
        ids.sort();
        let mut expected = vec![click, bgm];
        expected.sort();
        assert_eq!(ids, expected);

        for id in registry.all_ids() {
            registry.remove(id);
        }
        assert!(registry.is_empty());
        assert_eq!(registry.count("click"), 0);
        assert_eq!(registry.count("bgm"), 0);
    }
}
