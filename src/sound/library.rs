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

//! Decoded sounds held in memory by id.
//!
//! Sounds stay loaded for the lifetime of the library unless a capacity is set, in
//! which case the oldest sound is evicted to make room for a new one.

use std::collections::{HashMap, VecDeque};
use std::num::NonZeroUsize;

use tracing::debug;

use crate::engine::SampleBuffer;

/// Maps asset ids (caller-chosen strings) to decoded sample buffers.
#[derive(Default)]
pub struct AssetLibrary {
    assets: HashMap<String, SampleBuffer>,
    /// Asset ids in insertion order, oldest first.
    order: VecDeque<String>,
    /// Maximum number of assets kept in memory.
    max_assets: Option<NonZeroUsize>,
}

impl AssetLibrary {
    /// Creates a new library. `None` means no capacity limit.
    pub fn new(max_assets: Option<NonZeroUsize>) -> AssetLibrary {
        AssetLibrary {
            assets: HashMap::new(),
            order: VecDeque::new(),
            max_assets,
        }
    }

    /// Inserts a buffer, replacing any previous buffer for the id.
    /// Returns the id of the asset evicted to make room, if any.
    pub fn insert(&mut self, id: &str, buffer: SampleBuffer) -> Option<String> {
        if let Some(existing) = self.assets.get_mut(id) {
            *existing = buffer;
            debug!(id, "Replaced sound");
            return None;
        }

        let evicted = match self.max_assets {
            Some(max) if self.assets.len() >= max.get() => self.order.pop_front().inspect(|oldest| {
                self.assets.remove(oldest);
            }),
            _ => None,
        };

        self.assets.insert(id.to_string(), buffer);
        self.order.push_back(id.to_string());
        evicted
    }

    /// Looks up the buffer for an id.
    pub fn get(&self, id: &str) -> Option<&SampleBuffer> {
        self.assets.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.assets.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    /// Returns the loaded ids, oldest first.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Returns the total memory used by loaded buffers.
    pub fn total_memory_usage(&self) -> usize {
        self.assets.values().map(|b| b.memory_size()).sum()
    }
}

impl std::fmt::Debug for AssetLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetLibrary")
            .field("assets", &self.assets.len())
            .field("max_assets", &self.max_assets)
            .field("total_memory_kb", &(self.total_memory_usage() / 1024))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(frames: usize) -> SampleBuffer {
        SampleBuffer::new(vec![0.0; frames], 1, 100).unwrap()
    }

    #[test]
    fn test_insert_and_get() {
        let mut library = AssetLibrary::new(None);
        assert!(library.get("click").is_none());

        assert_eq!(library.insert("click", buffer(10)), None);
        assert!(library.contains("click"));
        assert_eq!(library.get("click").unwrap().frames(), 10);
        assert_eq!(library.total_memory_usage(), 40);
    }

    #[test]
    fn test_insert_overwrites() {
        let mut library = AssetLibrary::new(None);
        library.insert("click", buffer(10));
        library.insert("click", buffer(20));

        assert_eq!(library.len(), 1);
        assert_eq!(library.get("click").unwrap().frames(), 20);
        assert_eq!(library.ids().collect::<Vec<_>>(), vec!["click"]);
    }

    #[test]
    fn test_unbounded_by_default() {
        let mut library = AssetLibrary::new(None);
        for i in 0..100 {
            assert_eq!(library.insert(&format!("sound{}", i), buffer(1)), None);
        }
        assert_eq!(library.len(), 100);
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut library = AssetLibrary::new(NonZeroUsize::new(2));
        library.insert("click", buffer(1));
        library.insert("correct", buffer(1));

        // Replacing an existing sound never evicts.
        assert_eq!(library.insert("click", buffer(2)), None);

        assert_eq!(
            library.insert("incorrect", buffer(1)),
            Some("click".to_string())
        );
        assert!(!library.contains("click"));
        assert_eq!(
            library.ids().collect::<Vec<_>>(),
            vec!["correct", "incorrect"]
        );
    }
}
