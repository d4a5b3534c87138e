//! Snapshot scanning and content hashing for fsvigil.
//!
//! This crate provides the two leaf components of the monitor:
//!
//! - **[`SnapshotScanner`]** walks every monitored root with jwalk and
//!   records size and timestamps for each regular file it can stat.
//! - **[`HashStore`]** keeps a BLAKE3 baseline hash per path and compares
//!   later content against it.
//!
//! # Example
//!
//! ```rust,no_run
//! use fsvigil_scan::{HashStore, ScanConfig, SnapshotScanner};
//!
//! let scanner = SnapshotScanner::new(ScanConfig::default()).unwrap();
//! let snapshot = scanner.scan(&["/path/to/watch"]).unwrap();
//! println!("{} files", snapshot.len());
//!
//! let store = HashStore::new();
//! for record in snapshot.iter() {
//!     let result = store.check_integrity(&record.path);
//!     println!("{}: {}", record.path.display(), result.message);
//! }
//! ```

mod hash;
mod scanner;

pub use hash::HashStore;
pub use scanner::SnapshotScanner;

// Re-export core types for convenience
pub use fsvigil_core::{
    ContentHash, FileRecord, IntegrityResult, IntegrityStatus, ScanConfig, ScanError, Snapshot,
};
