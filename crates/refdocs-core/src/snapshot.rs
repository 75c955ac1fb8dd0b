//! Durable copy of the corpus and index.
//!
//! The snapshot file is a JSON object `{"docs": [...], "index": {...}}`
//! rewritten in full after each successful cycle. It is a warm-start cache:
//! a missing file is normal and a corrupt file is discarded.

use crate::{Document, Error, Result, SearchIndex, SerializedIndex};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Corpus plus serialized index, as written to disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Documents sorted by key.
    pub docs: Vec<Document>,
    /// Serialized search index.
    pub index: SerializedIndex,
}

impl Snapshot {
    /// Capture a corpus and the index built over it.
    pub fn new(mut docs: Vec<Document>, index: &SearchIndex) -> Self {
        docs.sort_by(|a, b| a.key.cmp(&b.key));
        Self {
            docs,
            index: index.serialize(),
        }
    }

    /// Rebuild the index and hand back the corpus.
    pub fn into_parts(self) -> Result<(Vec<Document>, SearchIndex)> {
        let index = SearchIndex::from_serialized(self.index)?;
        Ok((self.docs, index))
    }
}

/// Reads and writes the snapshot file.
#[derive(Debug, Clone)]
pub struct SnapshotStorage {
    path: PathBuf,
}

impl SnapshotStorage {
    /// Storage backed by the file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the snapshot file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Overwrite the snapshot file.
    ///
    /// Data goes to a sibling temporary file first and is renamed into place,
    /// so a crash mid-write leaves the previous snapshot intact.
    pub fn save(&self, snapshot: &Snapshot) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                Error::Storage(format!("Failed to create snapshot directory: {e}"))
            })?;
        }

        let json = serde_json::to_string_pretty(snapshot)
            .map_err(|e| Error::Storage(format!("Failed to serialize snapshot: {e}")))?;

        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, json)
            .map_err(|e| Error::Storage(format!("Failed to write snapshot: {e}")))?;

        #[cfg(target_os = "windows")]
        if self.path.exists() {
            fs::remove_file(&self.path).map_err(|e| {
                Error::Storage(format!("Failed to remove existing snapshot: {e}"))
            })?;
        }
        fs::rename(&tmp_path, &self.path)
            .map_err(|e| Error::Storage(format!("Failed to commit snapshot: {e}")))?;

        debug!(path = %self.path.display(), documents = snapshot.docs.len(), "Saved snapshot");
        Ok(())
    }

    /// Write the snapshot on the blocking pool.
    pub async fn persist(&self, snapshot: Snapshot) -> Result<()> {
        let storage = self.clone();
        tokio::task::spawn_blocking(move || storage.save(&snapshot))
            .await
            .map_err(|e| Error::Storage(format!("Snapshot task failed: {e}")))?
    }

    /// Read the snapshot file; `Ok(None)` when it does not exist.
    pub fn load(&self) -> Result<Option<Snapshot>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&self.path)
            .map_err(|e| Error::Storage(format!("Failed to read snapshot: {e}")))?;
        let snapshot = serde_json::from_str(&json)
            .map_err(|e| Error::Storage(format!("Failed to parse snapshot: {e}")))?;
        Ok(Some(snapshot))
    }

    /// Load and rebuild the snapshot, discarding it when unreadable.
    pub fn restore(&self) -> Option<(Vec<Document>, SearchIndex)> {
        let snapshot = match self.load() {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                debug!(path = %self.path.display(), "No snapshot to restore");
                return None;
            },
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Ignoring unreadable snapshot");
                return None;
            },
        };

        match snapshot.into_parts() {
            Ok((docs, index)) => {
                info!(documents = docs.len(), "Restored snapshot");
                Some((docs, index))
            },
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Ignoring snapshot with invalid index");
                None
            },
        }
    }
}
