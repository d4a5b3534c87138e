//! fsvigil - polling file system monitor with content integrity checks.
//!
//! Usage:
//!   fsvigil [PATH]...            Watch paths (default: Desktop, Documents, Downloads)
//!   fsvigil -c fsvigil.toml      Load settings from a TOML file
//!   fsvigil --json [PATH]...     Print events as JSON lines
//!   fsvigil --help               Show help

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{ArgAction, Parser};
use color_eyre::eyre::{Context, Result, eyre};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use fsvigil_core::{Event, MonitorConfig};
use fsvigil_monitor::{EventSink, Monitor};

#[derive(Parser)]
#[command(
    name = "fsvigil",
    version,
    about = "Watch directory trees for file changes and integrity violations",
    long_about = "fsvigil rescans the watched directories on a fixed interval and reports \
                  created, modified and deleted files. Modified files are checked against \
                  the content hash recorded the first time they changed.\n\n\
                  Press Ctrl-C to stop and print the statistics."
)]
struct Cli {
    /// Directories to watch (defaults to Desktop, Documents and Downloads)
    paths: Vec<PathBuf>,

    /// Load settings from a TOML file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Milliseconds between scans
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Milliseconds to wait after a failed scan
    #[arg(long)]
    backoff_ms: Option<u64>,

    /// Reprint the watched folders every N scans
    #[arg(long)]
    refresh_every: Option<u32>,

    /// Glob pattern of names to ignore (repeatable)
    #[arg(short, long = "ignore")]
    ignore: Vec<String>,

    /// Skip hidden files and directories
    #[arg(long)]
    no_hidden: bool,

    /// Print events as JSON lines
    #[arg(long)]
    json: bool,

    /// Write a test file into this directory after starting
    #[arg(long, value_name = "DIR")]
    probe: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    /// Merge the config file, CLI overrides and default roots.
    fn monitor_config(&self) -> Result<MonitorConfig> {
        let mut config = match &self.config {
            Some(path) => MonitorConfig::from_toml_file(path)?,
            None => MonitorConfig::default(),
        };

        if !self.paths.is_empty() {
            config.roots = self.paths.clone();
        }
        if config.roots.is_empty() {
            config.roots = default_roots();
        }
        if config.roots.is_empty() {
            return Err(eyre!("no paths to watch and no home directory found"));
        }

        if let Some(ms) = self.interval_ms {
            config.scan_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = self.backoff_ms {
            config.error_backoff = Duration::from_millis(ms);
        }
        if let Some(n) = self.refresh_every {
            config.refresh_every = n;
        }
        config.scan.ignore_patterns.extend(self.ignore.iter().cloned());
        if self.no_hidden {
            config.scan.include_hidden = false;
        }

        config.validate()?;
        Ok(config)
    }
}

/// Prints events and forwards refresh requests to the main task.
struct ConsoleSink {
    json: bool,
    refresh_tx: mpsc::UnboundedSender<()>,
}

impl EventSink for ConsoleSink {
    fn handle(&self, event: &Event) {
        if self.json {
            match serde_json::to_string(event) {
                Ok(line) => println!("{line}"),
                Err(err) => tracing::error!(error = %err, "cannot serialize event"),
            }
        } else {
            println!("{event}");
            println!("{}", "─".repeat(80));
        }

        if event.is_integrity_violation() {
            eprintln!(
                "ALERT: file integrity compromised: {}",
                event
                    .path
                    .as_deref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default()
            );
        }
    }

    fn refresh_paths(&self) {
        let _ = self.refresh_tx.send(());
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = cli.monitor_config().context("Invalid configuration")?;
    let monitor = Monitor::new(config).context("Cannot create monitor")?;

    if !cli.json {
        let baseline = monitor.current_snapshot();
        eprintln!(
            "Baseline: {} files, {}",
            baseline.len(),
            format_size(baseline.total_size())
        );
    }

    let (refresh_tx, mut refresh_rx) = mpsc::unbounded_channel();
    monitor.on_event(ConsoleSink {
        json: cli.json,
        refresh_tx,
    });

    monitor.start();
    if let Some(dir) = &cli.probe {
        monitor.create_test_file(dir);
    }

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal.context("Cannot listen for Ctrl-C")?;
                break;
            }
            Some(()) = refresh_rx.recv() => {
                if !cli.json {
                    print_paths(&monitor);
                }
            }
        }
    }

    monitor.stop();
    monitor.wait().await;

    let stats = monitor.statistics();
    if cli.json {
        println!("{}", serde_json::to_string(&stats)?);
    } else {
        eprintln!("{stats}");
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Desktop, Documents and Downloads of the current user.
fn default_roots() -> Vec<PathBuf> {
    [dirs::desktop_dir(), dirs::document_dir(), dirs::download_dir()]
        .into_iter()
        .flatten()
        .collect()
}

/// Print every watched folder with its status.
fn print_paths(monitor: &Monitor) {
    for status in monitor.path_statuses() {
        eprintln!("{}:", display_name(&status.path));
        eprintln!("  Path: {}", status.path.display());
        eprintln!(
            "  Status: {}",
            if status.exists { "monitoring" } else { "not found" }
        );
        eprintln!("  Files: {}", status.file_count);
        eprintln!("{}", "-".repeat(50));
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// Format size in human-readable form.
fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}
