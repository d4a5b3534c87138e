//! Where the monitor gets its snapshots from.

use std::path::PathBuf;

use fsvigil_core::{ScanError, Snapshot};
use fsvigil_scan::SnapshotScanner;

/// Produces a complete snapshot of the given roots.
///
/// [`SnapshotScanner`] is the real implementation; tests and embedders can
/// supply their own.
pub trait SnapshotSource: Send + Sync {
    /// Take a snapshot of every root.
    fn snapshot(&self, roots: &[PathBuf]) -> Result<Snapshot, ScanError>;
}

impl SnapshotSource for SnapshotScanner {
    fn snapshot(&self, roots: &[PathBuf]) -> Result<Snapshot, ScanError> {
        self.scan(roots)
    }
}
