//! Core types for fsvigil.
//!
//! This crate provides the data model shared by the scanner, the hash store
//! and the monitor loop: file records and snapshots, content hashes, the
//! event stream, running statistics and configuration.

mod config;
mod error;
mod event;
mod record;
mod stats;

pub use config::{
    DEFAULT_ERROR_BACKOFF, DEFAULT_REFRESH_EVERY, DEFAULT_SCAN_INTERVAL, MonitorConfig,
    MonitorConfigBuilder, ScanConfig, ScanConfigBuilder,
};
pub use error::{ConfigError, MonitorError, ScanError};
pub use event::{Event, EventKind, IntegrityResult, IntegrityStatus};
pub use record::{ContentHash, FileRecord, Snapshot};
pub use stats::Statistics;
