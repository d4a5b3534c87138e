//! Events emitted by the monitor and integrity check results.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Kind of monitor event.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum EventKind {
    /// A file appeared since the previous snapshot.
    Created,
    /// A file's modification time or size changed.
    Modified,
    /// A file disappeared since the previous snapshot.
    Deleted,
    /// Monitor lifecycle notice.
    System,
    /// A cycle or collaborator operation failed.
    Error,
    /// A probe file was written on request.
    Test,
}

impl EventKind {
    /// Check if this kind describes a file lifecycle change.
    pub fn is_file_change(&self) -> bool {
        matches!(self, Self::Created | Self::Modified | Self::Deleted)
    }
}

/// Outcome class of an integrity check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum IntegrityStatus {
    /// No baseline existed; the current hash became the baseline.
    Baselined,
    /// Current content matches the baseline.
    Match,
    /// Current content differs from the baseline.
    Violation,
    /// A baseline exists but the file could not be read.
    Skipped,
}

/// Result of checking a file against its baseline hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityResult {
    /// False only for a violation.
    pub ok: bool,
    /// What the check concluded.
    pub status: IntegrityStatus,
    /// Human-readable message.
    pub message: String,
}

impl IntegrityResult {
    /// A baseline was recorded for a file seen for the first time.
    pub fn baselined() -> Self {
        Self::new(IntegrityStatus::Baselined, "new file, hash stored")
    }

    /// The content still matches its baseline.
    pub fn matched() -> Self {
        Self::new(IntegrityStatus::Match, "match")
    }

    /// The content no longer matches its baseline.
    pub fn violation() -> Self {
        Self::new(IntegrityStatus::Violation, "integrity violation")
    }

    /// The file could not be hashed, so the comparison was skipped.
    pub fn skipped() -> Self {
        Self::new(IntegrityStatus::Skipped, "file unreadable, check skipped")
    }

    fn new(status: IntegrityStatus, message: &str) -> Self {
        Self {
            ok: status != IntegrityStatus::Violation,
            status,
            message: message.to_string(),
        }
    }
}

/// A single immutable entry of the monitor's event stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Kind of event.
    pub kind: EventKind,
    /// File or root the event is about, if any.
    pub path: Option<PathBuf>,
    /// When the event was constructed.
    pub timestamp: DateTime<Local>,
    /// Free-text reason.
    pub detail: String,
    /// Integrity outcome, present on MODIFIED events.
    pub integrity: Option<IntegrityResult>,
}

impl Event {
    /// Create an event stamped with the current local time.
    pub fn new(kind: EventKind, path: Option<PathBuf>, detail: impl Into<String>) -> Self {
        Self {
            kind,
            path,
            timestamp: Local::now(),
            detail: detail.into(),
            integrity: None,
        }
    }

    /// Create an event about a file.
    pub fn file(kind: EventKind, path: impl Into<PathBuf>, detail: impl Into<String>) -> Self {
        Self::new(kind, Some(path.into()), detail)
    }

    /// Create a lifecycle notice.
    pub fn system(detail: impl Into<String>) -> Self {
        Self::new(EventKind::System, None, detail)
    }

    /// Create an error notice.
    pub fn error(detail: impl Into<String>) -> Self {
        Self::new(EventKind::Error, None, detail)
    }

    /// Attach an integrity result.
    pub fn with_integrity(mut self, result: IntegrityResult) -> Self {
        self.integrity = Some(result);
        self
    }

    /// Check if this event reports a failed integrity check.
    pub fn is_integrity_violation(&self) -> bool {
        self.integrity.as_ref().is_some_and(|r| !r.ok)
    }

    /// Short display name: the file name, or the kind for pathless events.
    pub fn name(&self) -> String {
        match &self.path {
            Some(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| path.display().to_string()),
            None => "monitor".to_string(),
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "[{}] {}: {}",
            self.timestamp.format("%H:%M:%S"),
            self.kind,
            self.name()
        )?;
        if let Some(path) = &self.path {
            writeln!(f, "    Path: {}", path.display())?;
        }
        write!(f, "    Details: {}", self.detail)?;
        if let Some(integrity) = &self.integrity {
            write!(f, "\n    Integrity Check: {}", integrity.message)?;
        }
        Ok(())
    }
}
