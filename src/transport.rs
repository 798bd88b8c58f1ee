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

//! Fetching of encoded sound bytes.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use tracing::debug;

/// Error types for fetching sound data.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No such resource: {0}")]
    NotFound(String),
}

/// Retrieves raw bytes for a locator.
pub trait Transport: Send + Sync + 'static {
    fn fetch(&self, locator: &str) -> impl Future<Output = Result<Vec<u8>, TransportError>> + Send;
}

/// Reads sounds from the local filesystem.
#[derive(Clone, Debug)]
pub struct FileTransport {
    /// Base path for resolving relative locators.
    base_path: PathBuf,
}

impl FileTransport {
    /// Creates a new file transport rooted at the given directory.
    pub fn new(base_path: &Path) -> FileTransport {
        FileTransport {
            base_path: base_path.to_path_buf(),
        }
    }

    /// Resolves a locator to a path on disk.
    pub fn resolve(&self, locator: &str) -> PathBuf {
        if Path::new(locator).is_absolute() {
            PathBuf::from(locator)
        } else {
            self.base_path.join(locator)
        }
    }
}

impl Transport for FileTransport {
    async fn fetch(&self, locator: &str) -> Result<Vec<u8>, TransportError> {
        let path = self.resolve(locator);
        debug!(path = ?path, "Reading sound file");
        tokio::fs::read(&path)
            .await
            .map_err(|source| TransportError::Io { path, source })
    }
}

/// Serves sounds from memory.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryTransport {
    pub fn new() -> MemoryTransport {
        MemoryTransport::default()
    }

    /// Makes the given bytes available under the locator, replacing any previous entry.
    pub fn insert(&self, locator: &str, bytes: Vec<u8>) {
        self.entries.write().insert(locator.to_string(), bytes);
    }
}

impl Transport for MemoryTransport {
    async fn fetch(&self, locator: &str) -> Result<Vec<u8>, TransportError> {
        self.entries
            .read()
            .get(locator)
            .cloned()
            .ok_or_else(|| TransportError::NotFound(locator.to_string()))
    }
}
