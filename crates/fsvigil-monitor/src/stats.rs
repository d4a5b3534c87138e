//! Lock-free event counters.

use std::sync::atomic::{AtomicU64, Ordering};

use fsvigil_core::{EventKind, Statistics};

/// Counts events by kind. Safe to share between the loop and readers.
#[derive(Debug, Default)]
pub struct StatsAggregator {
    total_events: AtomicU64,
    file_changes: AtomicU64,
    files_created: AtomicU64,
    files_deleted: AtomicU64,
}

impl StatsAggregator {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one event.
    pub fn record(&self, kind: EventKind) {
        self.total_events.fetch_add(1, Ordering::Relaxed);
        let counter = match kind {
            EventKind::Created => &self.files_created,
            EventKind::Modified => &self.file_changes,
            EventKind::Deleted => &self.files_deleted,
            EventKind::System | EventKind::Error | EventKind::Test => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Read all four counters.
    pub fn snapshot(&self) -> Statistics {
        Statistics {
            total_events: self.total_events.load(Ordering::Relaxed),
            file_changes: self.file_changes.load(Ordering::Relaxed),
            files_created: self.files_created.load(Ordering::Relaxed),
            files_deleted: self.files_deleted.load(Ordering::Relaxed),
        }
    }

    /// Zero all four counters.
    pub fn reset(&self) {
        self.total_events.store(0, Ordering::Relaxed);
        self.file_changes.store(0, Ordering::Relaxed);
        self.files_created.store(0, Ordering::Relaxed);
        self.files_deleted.store(0, Ordering::Relaxed);
    }
}
