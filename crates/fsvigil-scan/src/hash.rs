//! Baseline content hashes and integrity checks.

use std::path::{Path, PathBuf};

use blake3::Hasher;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::{debug, warn};

use fsvigil_core::{ContentHash, IntegrityResult};

/// Concurrent map from path to its first-observed content hash.
///
/// Entries are only added by [`check_integrity`](Self::check_integrity) and
/// are never replaced or evicted unless a collaborator calls
/// [`rebaseline`](Self::rebaseline) or [`forget`](Self::forget). Deleting a
/// file leaves its baseline in place.
#[derive(Debug, Default)]
pub struct HashStore {
    baselines: DashMap<PathBuf, ContentHash>,
}

impl HashStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            baselines: DashMap::new(),
        }
    }

    /// Compute the BLAKE3 hash of a file's full content.
    ///
    /// Returns `None` if the file cannot be opened or read.
    pub fn compute_hash(path: &Path) -> Option<ContentHash> {
        let mut hasher = Hasher::new();
        // Large files are memory-mapped and hashed in parallel, small ones read.
        if let Err(err) = hasher.update_mmap_rayon(path) {
            debug!(path = %path.display(), error = %err, "cannot hash file");
            return None;
        }
        Some(ContentHash::new(*hasher.finalize().as_bytes()))
    }

    /// Compare a file's current content against its baseline.
    ///
    /// The first check for a path records the baseline. A mismatch does not
    /// update the baseline, so every later check of the changed file keeps
    /// reporting the violation.
    pub fn check_integrity(&self, path: &Path) -> IntegrityResult {
        let current = Self::compute_hash(path);

        match self.baselines.entry(path.to_path_buf()) {
            Entry::Occupied(baseline) => match current {
                Some(hash) if hash == *baseline.get() => IntegrityResult::matched(),
                Some(hash) => {
                    warn!(
                        path = %path.display(),
                        baseline = %baseline.get(),
                        current = %hash,
                        "integrity violation"
                    );
                    IntegrityResult::violation()
                }
                None => IntegrityResult::skipped(),
            },
            Entry::Vacant(slot) => {
                if let Some(hash) = current {
                    slot.insert(hash);
                }
                IntegrityResult::baselined()
            }
        }
    }

    /// Get the recorded baseline for a path.
    pub fn baseline(&self, path: &Path) -> Option<ContentHash> {
        self.baselines.get(path).map(|entry| *entry.value())
    }

    /// Replace the baseline with the file's current hash.
    ///
    /// If the file cannot be hashed the old baseline is dropped. Returns the
    /// new baseline.
    pub fn rebaseline(&self, path: &Path) -> Option<ContentHash> {
        match Self::compute_hash(path) {
            Some(hash) => {
                self.baselines.insert(path.to_path_buf(), hash);
                Some(hash)
            }
            None => {
                self.baselines.remove(path);
                None
            }
        }
    }

    /// Drop the baseline for a path, returning it if one existed.
    pub fn forget(&self, path: &Path) -> Option<ContentHash> {
        self.baselines.remove(path).map(|(_, hash)| hash)
    }

    /// Number of paths with a baseline.
    pub fn len(&self) -> usize {
        self.baselines.len()
    }

    /// Check if no baselines are recorded.
    pub fn is_empty(&self) -> bool {
        self.baselines.is_empty()
    }
}
