//! File records, snapshots and content hashes.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// BLAKE3 content hash used as an integrity baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub [u8; 32]);

impl ContentHash {
    /// Create a new ContentHash from raw bytes.
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the hash as a hex string.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Lightweight metadata for one regular file, rebuilt on every scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Absolute path of the file.
    pub path: PathBuf,
    /// Size in bytes.
    pub size: u64,
    /// Last modification time.
    pub modified: SystemTime,
    /// Creation time (if available, platform-dependent).
    pub created: Option<SystemTime>,
}

impl FileRecord {
    /// Create a new file record.
    pub fn new(
        path: impl Into<PathBuf>,
        size: u64,
        modified: SystemTime,
        created: Option<SystemTime>,
    ) -> Self {
        Self {
            path: path.into(),
            size,
            modified,
            created,
        }
    }

    /// Build a record from file metadata.
    pub fn from_metadata(path: impl Into<PathBuf>, metadata: &std::fs::Metadata) -> Self {
        Self {
            path: path.into(),
            size: metadata.len(),
            modified: metadata.modified().unwrap_or(std::time::UNIX_EPOCH),
            created: metadata.created().ok(),
        }
    }
}

/// Complete observed state of all monitored trees at one instant.
///
/// Keys are absolute paths. Iteration follows insertion order, which is the
/// directory-walk order of the scan that produced the snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    files: IndexMap<PathBuf, FileRecord>,
}

impl Snapshot {
    /// Create an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record, replacing any record with the same path.
    pub fn insert(&mut self, record: FileRecord) {
        self.files.insert(record.path.clone(), record);
    }

    /// Look up a record by path.
    pub fn get(&self, path: &Path) -> Option<&FileRecord> {
        self.files.get(path)
    }

    /// Check if a path is present.
    pub fn contains(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    /// Number of files in the snapshot.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Check if the snapshot holds no files.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Iterate records in walk order.
    pub fn iter(&self) -> impl Iterator<Item = &FileRecord> {
        self.files.values()
    }

    /// Iterate paths in walk order.
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.files.keys().map(PathBuf::as_path)
    }

    /// Sum of all file sizes.
    pub fn total_size(&self) -> u64 {
        self.files.values().map(|r| r.size).sum()
    }

    /// Add every record of `other` that this snapshot does not know yet.
    pub fn merge(&mut self, other: Snapshot) {
        for (path, record) in other.files {
            self.files.entry(path).or_insert(record);
        }
    }
}

impl FromIterator<FileRecord> for Snapshot {
    fn from_iter<T: IntoIterator<Item = FileRecord>>(iter: T) -> Self {
        let mut snapshot = Snapshot::new();
        for record in iter {
            snapshot.insert(record);
        }
        snapshot
    }
}

impl Extend<FileRecord> for Snapshot {
    fn extend<T: IntoIterator<Item = FileRecord>>(&mut self, iter: T) {
        for record in iter {
            self.insert(record);
        }
    }
}
