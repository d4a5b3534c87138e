//! Diff engine, statistics and monitor loop for fsvigil.
//!
//! The [`Monitor`] owns the monitoring lifecycle. Each cycle it takes a
//! snapshot of every monitored root, compares it with the previous one via
//! [`diff_snapshots`], checks the content hash of every modified file and
//! hands the resulting [`Event`]s to its sinks, counting them on the way.
//!
//! Presentation is left to collaborators, which register an [`EventSink`]
//! (or call [`Monitor::subscribe`]) and poll [`Monitor::statistics`].

mod diff;
mod monitor;
mod paths;
mod sink;
mod source;
mod stats;

pub use diff::{
    Change, REASON_CONTENT, REASON_CREATED, REASON_DELETED, REASON_SIZE, classify, diff_events,
    diff_snapshots,
};
pub use monitor::{Monitor, MonitorState};
pub use paths::{MonitoredPathSet, PathStatus};
pub use sink::{ChannelSink, EventLog, EventSink};
pub use source::SnapshotSource;
pub use stats::StatsAggregator;

// Re-export core types
pub use fsvigil_core::{Event, EventKind, IntegrityResult, MonitorConfig, Snapshot, Statistics};
