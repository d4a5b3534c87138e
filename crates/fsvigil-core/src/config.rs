//! Scan and monitor configuration types.

use std::path::{Path, PathBuf};
use std::time::Duration;

use derive_builder::Builder;
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Configuration for a single snapshot scan.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct ScanConfig {
    /// Include hidden files (starting with .).
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub include_hidden: bool,

    /// Glob patterns matched against file and directory names.
    #[builder(default)]
    #[serde(default)]
    pub ignore_patterns: Vec<String>,

    /// Maximum depth to traverse (None = unlimited).
    #[builder(default)]
    #[serde(default)]
    pub max_depth: Option<u32>,

    /// Number of threads for scanning (0 = auto-detect).
    #[builder(default = "0")]
    #[serde(default)]
    pub threads: usize,
}

fn default_true() -> bool {
    true
}

impl ScanConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(ref patterns) = self.ignore_patterns {
            compile_patterns(patterns).map_err(|e| e.to_string())?;
        }
        Ok(())
    }
}

impl ScanConfig {
    /// Create a new scan config builder.
    pub fn builder() -> ScanConfigBuilder {
        ScanConfigBuilder::default()
    }

    /// Compile the ignore patterns into a matcher.
    pub fn ignore_matcher(&self) -> Result<GlobSet, ConfigError> {
        compile_patterns(&self.ignore_patterns)
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            include_hidden: true,
            ignore_patterns: Vec::new(),
            max_depth: None,
            threads: 0,
        }
    }
}

fn compile_patterns(patterns: &[String]) -> Result<GlobSet, ConfigError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| ConfigError::Invalid {
            message: format!("bad ignore pattern {pattern:?}: {e}"),
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|e| ConfigError::Invalid {
        message: e.to_string(),
    })
}

/// Default pause between two monitor cycles.
pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_secs(3);

/// Default pause after a failed cycle.
pub const DEFAULT_ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Default number of cycles between path display refreshes.
pub const DEFAULT_REFRESH_EVERY: u32 = 10;

/// Configuration for the monitor loop.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct MonitorConfig {
    /// Initial set of root directories to watch.
    #[builder(default)]
    #[serde(default)]
    pub roots: Vec<PathBuf>,

    /// Pause between successful cycles.
    #[builder(default = "DEFAULT_SCAN_INTERVAL")]
    #[serde(
        rename = "scan_interval_ms",
        with = "duration_ms",
        default = "default_scan_interval"
    )]
    pub scan_interval: Duration,

    /// Pause after a cycle that failed.
    #[builder(default = "DEFAULT_ERROR_BACKOFF")]
    #[serde(
        rename = "error_backoff_ms",
        with = "duration_ms",
        default = "default_error_backoff"
    )]
    pub error_backoff: Duration,

    /// Emit a path refresh signal every N cycles.
    #[builder(default = "DEFAULT_REFRESH_EVERY")]
    #[serde(default = "default_refresh_every")]
    pub refresh_every: u32,

    /// Scanner settings.
    #[builder(default)]
    #[serde(default)]
    pub scan: ScanConfig,
}

fn default_scan_interval() -> Duration {
    DEFAULT_SCAN_INTERVAL
}

fn default_error_backoff() -> Duration {
    DEFAULT_ERROR_BACKOFF
}

fn default_refresh_every() -> u32 {
    DEFAULT_REFRESH_EVERY
}

impl MonitorConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if self.refresh_every == Some(0) {
            return Err("refresh_every must be at least 1".to_string());
        }
        if self.scan_interval.is_some_and(|d| d.is_zero()) {
            return Err("scan_interval must be non-zero".to_string());
        }
        Ok(())
    }
}

impl MonitorConfig {
    /// Create a new monitor config builder.
    pub fn builder() -> MonitorConfigBuilder {
        MonitorConfigBuilder::default()
    }

    /// Create a config watching the given roots with default timings.
    pub fn new<I, P>(roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            roots: roots.into_iter().map(Into::into).collect(),
            scan_interval: DEFAULT_SCAN_INTERVAL,
            error_backoff: DEFAULT_ERROR_BACKOFF,
            refresh_every: DEFAULT_REFRESH_EVERY,
            scan: ScanConfig::default(),
        }
    }

    /// Parse and validate a config from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text).map_err(|err| match err {
            ConfigError::Toml(source) => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    /// Check the invariants the builder enforces, for configs loaded from files.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.refresh_every == 0 {
            return Err(ConfigError::Invalid {
                message: "refresh_every must be at least 1".to_string(),
            });
        }
        if self.scan_interval.is_zero() {
            return Err(ConfigError::Invalid {
                message: "scan_interval must be non-zero".to_string(),
            });
        }
        self.scan.ignore_matcher()?;
        Ok(())
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self::new(Vec::<PathBuf>::new())
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
