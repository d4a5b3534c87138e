//! Running event statistics.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Point-in-time copy of the four event counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statistics {
    /// Every event ever recorded.
    pub total_events: u64,
    /// MODIFIED events.
    pub file_changes: u64,
    /// CREATED events.
    pub files_created: u64,
    /// DELETED events.
    pub files_deleted: u64,
}

impl fmt::Display for Statistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} events, {} changed, {} created, {} deleted",
            self.total_events, self.file_changes, self.files_created, self.files_deleted
        )
    }
}
