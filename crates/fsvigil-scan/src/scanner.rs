//! JWalk-based snapshot scanner.

use std::path::{Path, PathBuf};
use std::time::Instant;

use globset::GlobSet;
use jwalk::{Parallelism, WalkDir};
use tracing::{debug, warn};

use fsvigil_core::{ConfigError, FileRecord, ScanConfig, ScanError, Snapshot};

/// Builds complete snapshots of a set of directory trees.
#[derive(Debug, Clone)]
pub struct SnapshotScanner {
    config: ScanConfig,
    ignore: GlobSet,
}

impl SnapshotScanner {
    /// Create a scanner, compiling the configured ignore patterns.
    pub fn new(config: ScanConfig) -> Result<Self, ConfigError> {
        let ignore = config.ignore_matcher()?;
        Ok(Self { config, ignore })
    }

    /// Get the scanner configuration.
    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Walk every root and return the combined snapshot.
    ///
    /// Roots that are missing, are not directories or cannot be listed are
    /// skipped so the remaining roots are still scanned. Files that cannot
    /// be stat'ed are left out of the snapshot.
    pub fn scan<P: AsRef<Path>>(&self, roots: &[P]) -> Result<Snapshot, ScanError> {
        let start = Instant::now();
        let mut snapshot = Snapshot::new();

        for root in roots {
            self.scan_root(root.as_ref(), &mut snapshot)?;
        }

        debug!(
            files = snapshot.len(),
            roots = roots.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "snapshot complete"
        );
        Ok(snapshot)
    }

    /// Walk a single root, adding its files to `snapshot`.
    ///
    /// Returns whether the root was walked. An unreachable root is not an
    /// error; only failing to resolve the path itself is.
    pub fn scan_root(&self, root: &Path, snapshot: &mut Snapshot) -> Result<bool, ScanError> {
        let root = absolute_path(root)?;

        let metadata = match std::fs::metadata(&root) {
            Ok(m) => m,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(root = %root.display(), "skipping missing root");
                return Ok(false);
            }
            Err(err) => {
                warn!(root = %root.display(), error = %err, "skipping unreachable root");
                return Ok(false);
            }
        };
        if !metadata.is_dir() {
            debug!(root = %root.display(), "skipping non-directory root");
            return Ok(false);
        }

        // jwalk reports an unreadable root as a per-entry error, so check it up front.
        if let Err(err) = std::fs::read_dir(&root) {
            warn!(root = %root.display(), error = %err, "skipping unlistable root");
            return Ok(false);
        }

        let parallelism = match self.config.threads {
            0 => Parallelism::RayonDefaultPool {
                busy_timeout: std::time::Duration::from_millis(100),
            },
            n => Parallelism::RayonNewPool(n),
        };

        let ignore = self.ignore.clone();
        let walker = WalkDir::new(&root)
            .parallelism(parallelism)
            .sort(true)
            .skip_hidden(!self.config.include_hidden)
            .follow_links(false)
            .min_depth(1)
            .max_depth(
                self.config
                    .max_depth
                    .map(|d| d as usize)
                    .unwrap_or(usize::MAX),
            )
            .process_read_dir(move |_depth, _path, _state, children| {
                // Pruning here keeps ignored directories from being descended.
                children.retain(|child| {
                    child
                        .as_ref()
                        .map(|entry| !ignore.is_match(entry.file_name()))
                        .unwrap_or(true)
                });
            });

        for entry_result in walker {
            let entry = match entry_result {
                Ok(e) => e,
                Err(err) => {
                    debug!(error = %err, "skipping unreadable entry");
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            match entry.metadata() {
                Ok(metadata) => snapshot.insert(FileRecord::from_metadata(path, &metadata)),
                Err(err) => {
                    debug!(path = %path.display(), error = %err, "skipping file without metadata");
                }
            }
        }

        Ok(true)
    }
}

fn absolute_path(path: &Path) -> Result<PathBuf, ScanError> {
    std::path::absolute(path).map_err(|e| ScanError::io(path, e))
}
