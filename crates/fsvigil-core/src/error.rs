//! Error types for scanning, configuration and monitoring.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that abort a whole scan.
///
/// Failures on individual files never surface here; the scanner drops
/// those files from the snapshot instead.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Permission denied for a path.
    #[error("Permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    /// Path not found.
    #[error("Path not found: {path}")]
    NotFound { path: PathBuf },

    /// Generic I/O error.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Operation was interrupted.
    #[error("Operation interrupted")]
    Interrupted,

    /// Other error.
    #[error("{message}")]
    Other { message: String },
}

impl ScanError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            std::io::ErrorKind::Interrupted => Self::Interrupted,
            _ => Self::Io { path, source },
        }
    }
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for this schema.
    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// TOML text that is not valid for this schema.
    #[error("Invalid config: {0}")]
    Toml(#[from] toml::de::Error),

    /// A value failed validation.
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

/// Failure of a single monitor cycle.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// The snapshot could not be taken.
    #[error(transparent)]
    Scan(#[from] ScanError),

    /// Configuration problem.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The background cycle task panicked or was cancelled.
    #[error("Cycle task failed: {message}")]
    Task { message: String },
}
