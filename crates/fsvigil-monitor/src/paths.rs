//! The set of monitored roots.

use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

/// Display information for one monitored root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathStatus {
    /// The root.
    pub path: PathBuf,
    /// Whether the root currently exists.
    pub exists: bool,
    /// Regular files directly inside the root (not recursive).
    pub file_count: usize,
}

impl PathStatus {
    /// Inspect a root on disk.
    pub fn probe(path: &Path) -> Self {
        let exists = path.exists();
        let file_count = if exists {
            std::fs::read_dir(path)
                .map(|entries| {
                    entries
                        .filter_map(Result::ok)
                        .filter(|e| e.file_type().is_ok_and(|t| t.is_file()))
                        .count()
                })
                .unwrap_or(0)
        } else {
            0
        };
        Self {
            path: path.to_path_buf(),
            exists,
            file_count,
        }
    }
}

/// Append-only set of root directories, shared by the loop and collaborators.
#[derive(Debug, Default)]
pub struct MonitoredPathSet {
    roots: RwLock<Vec<PathBuf>>,
}

impl MonitoredPathSet {
    /// Create a set from initial roots, dropping duplicates.
    pub fn new<I: IntoIterator<Item = PathBuf>>(roots: I) -> Self {
        let set = Self::default();
        for root in roots {
            set.add(root);
        }
        set
    }

    /// Add a root. Returns false if it was already present.
    pub fn add(&self, root: impl AsRef<Path>) -> bool {
        let root = normalize(root.as_ref());
        let mut roots = self.roots.write().unwrap_or_else(PoisonError::into_inner);
        if roots.contains(&root) {
            return false;
        }
        roots.push(root);
        true
    }

    /// Check if a root is monitored.
    pub fn contains(&self, root: impl AsRef<Path>) -> bool {
        let root = normalize(root.as_ref());
        self.roots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&root)
    }

    /// Copy of the roots in insertion order.
    pub fn to_vec(&self) -> Vec<PathBuf> {
        self.roots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of roots.
    pub fn len(&self) -> usize {
        self.roots.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Check if no roots are monitored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Probe every root for display.
    pub fn statuses(&self) -> Vec<PathStatus> {
        self.to_vec().iter().map(|p| PathStatus::probe(p)).collect()
    }
}

/// Make a path absolute without touching the filesystem.
pub(crate) fn normalize(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
