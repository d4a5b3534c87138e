//! Snapshot comparison and event classification.

use std::path::PathBuf;

use fsvigil_core::{Event, EventKind, FileRecord, Snapshot};
use fsvigil_scan::HashStore;

/// Reason attached to CREATED events.
pub const REASON_CREATED: &str = "new file detected";
/// Reason attached to MODIFIED events whose modification time moved.
pub const REASON_CONTENT: &str = "content changed";
/// Reason attached to MODIFIED events where only the size moved.
pub const REASON_SIZE: &str = "size changed";
/// Reason attached to DELETED events.
pub const REASON_DELETED: &str = "file deleted";

/// One classified difference between two snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    /// CREATED, MODIFIED or DELETED.
    pub kind: EventKind,
    /// Path the change applies to.
    pub path: PathBuf,
    /// Why the change was reported.
    pub reason: &'static str,
}

impl Change {
    /// Turn the change into an event, checking integrity for modifications.
    pub fn into_event(self, hashes: &HashStore) -> Event {
        let check = self.kind == EventKind::Modified;
        let integrity = check.then(|| hashes.check_integrity(&self.path));
        let event = Event::file(self.kind, self.path, self.reason);
        match integrity {
            Some(result) => event.with_integrity(result),
            None => event,
        }
    }
}

/// Decide whether a file present in both snapshots changed.
///
/// Modification time is checked first, so a file whose time and size both
/// moved is reported as "content changed".
pub fn classify(previous: &FileRecord, current: &FileRecord) -> Option<&'static str> {
    if previous.modified != current.modified {
        Some(REASON_CONTENT)
    } else if previous.size != current.size {
        Some(REASON_SIZE)
    } else {
        None
    }
}

/// Compare two snapshots.
///
/// CREATED and MODIFIED changes come first, in the walk order of `current`;
/// DELETED changes follow, in the walk order of `previous`.
pub fn diff_snapshots(previous: &Snapshot, current: &Snapshot) -> Vec<Change> {
    let mut changes = Vec::new();

    for record in current.iter() {
        match previous.get(&record.path) {
            None => changes.push(Change {
                kind: EventKind::Created,
                path: record.path.clone(),
                reason: REASON_CREATED,
            }),
            Some(old) => {
                if let Some(reason) = classify(old, record) {
                    changes.push(Change {
                        kind: EventKind::Modified,
                        path: record.path.clone(),
                        reason,
                    });
                }
            }
        }
    }

    for path in previous.paths() {
        if !current.contains(path) {
            changes.push(Change {
                kind: EventKind::Deleted,
                path: path.to_path_buf(),
                reason: REASON_DELETED,
            });
        }
    }

    changes
}

/// Compare two snapshots and build the events for one cycle.
pub fn diff_events(previous: &Snapshot, current: &Snapshot, hashes: &HashStore) -> Vec<Event> {
    diff_snapshots(previous, current)
        .into_iter()
        .map(|change| change.into_event(hashes))
        .collect()
}
