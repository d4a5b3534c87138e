//! Monitor lifecycle and the periodic scan loop.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use fsvigil_core::{
    ContentHash, Event, EventKind, MonitorConfig, MonitorError, Snapshot, Statistics,
};
use fsvigil_scan::{HashStore, SnapshotScanner};

use crate::diff::diff_events;
use crate::paths::{MonitoredPathSet, PathStatus, normalize};
use crate::sink::{ChannelSink, EventSink};
use crate::source::SnapshotSource;
use crate::stats::StatsAggregator;

/// Lifecycle state of a [`Monitor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MonitorState {
    /// No loop is running.
    Stopped = 0,
    /// The loop is cycling.
    Running = 1,
    /// Stop was requested; the loop exits at its next iteration boundary.
    Stopping = 2,
}

impl MonitorState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Running,
            2 => Self::Stopping,
            _ => Self::Stopped,
        }
    }
}

/// Polling file system monitor.
///
/// Construction takes a baseline snapshot of the configured roots, so the
/// first cycle only reports what changed since then. [`start`](Self::start)
/// spawns the loop on the current Tokio runtime; every cycle scans all
/// roots, diffs against the previous snapshot, checks integrity of modified
/// files and hands the resulting events to the registered sinks.
///
/// # Example
///
/// ```rust,no_run
/// use fsvigil_core::MonitorConfig;
/// use fsvigil_monitor::Monitor;
///
/// # async fn run() {
/// let monitor = Monitor::new(MonitorConfig::new(["/srv/data"])).unwrap();
/// let mut events = monitor.subscribe();
/// monitor.start();
///
/// while let Some(event) = events.recv().await {
///     println!("{event}");
/// }
/// # }
/// ```
pub struct Monitor {
    inner: Arc<Inner>,
    task: Mutex<Option<JoinHandle<()>>>,
}

struct Inner {
    config: MonitorConfig,
    source: Box<dyn SnapshotSource>,
    paths: MonitoredPathSet,
    hashes: HashStore,
    stats: StatsAggregator,
    sinks: RwLock<Vec<Arc<dyn EventSink>>>,
    previous: Mutex<Snapshot>,
    baselined: AtomicBool,
    cycle: Mutex<()>,
    state: AtomicU8,
    cycles: AtomicU64,
    wake: Notify,
}

impl Monitor {
    /// Create a monitor that scans the file system with [`SnapshotScanner`].
    pub fn new(config: MonitorConfig) -> Result<Self, MonitorError> {
        config.validate()?;
        let scanner = SnapshotScanner::new(config.scan.clone())?;
        Ok(Self::with_source(config, scanner))
    }

    /// Create a monitor with a custom snapshot source.
    pub fn with_source(config: MonitorConfig, source: impl SnapshotSource + 'static) -> Self {
        let paths = MonitoredPathSet::new(config.roots.iter().cloned());

        let (baseline, baselined) = match source.snapshot(&paths.to_vec()) {
            Ok(snapshot) => {
                info!(
                    roots = paths.len(),
                    files = snapshot.len(),
                    "baseline scan complete"
                );
                (snapshot, true)
            }
            Err(err) => {
                warn!(error = %err, "baseline scan failed, retrying on the first cycle");
                (Snapshot::new(), false)
            }
        };

        Self {
            inner: Arc::new(Inner {
                config,
                source: Box::new(source),
                paths,
                hashes: HashStore::new(),
                stats: StatsAggregator::new(),
                sinks: RwLock::new(Vec::new()),
                previous: Mutex::new(baseline),
                baselined: AtomicBool::new(baselined),
                cycle: Mutex::new(()),
                state: AtomicU8::new(MonitorState::Stopped as u8),
                cycles: AtomicU64::new(0),
                wake: Notify::new(),
            }),
            task: Mutex::new(None),
        }
    }

    /// Start the loop on the current Tokio runtime.
    ///
    /// Returns false without doing anything if the monitor is not stopped
    /// (including while a previous loop is still draining after
    /// [`stop`](Self::stop)) or if there is no runtime.
    pub fn start(&self) -> bool {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(err) => {
                error!(error = %err, "monitor must be started inside a Tokio runtime");
                return false;
            }
        };

        if self
            .inner
            .state
            .compare_exchange(
                MonitorState::Stopped as u8,
                MonitorState::Running as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_err()
        {
            debug!(state = ?self.state(), "start ignored");
            return false;
        }

        self.inner.emit(Event::system("monitoring started"));
        let task = handle.spawn(run_loop(Arc::clone(&self.inner)));
        *self.task.lock().unwrap_or_else(PoisonError::into_inner) = Some(task);
        true
    }

    /// Ask the loop to stop.
    ///
    /// The request is observed at the next iteration boundary: a cycle in
    /// progress finishes and emits all of its events first. The loop then
    /// emits "monitoring stopped" as its final event. Returns false if the
    /// monitor was not running.
    pub fn stop(&self) -> bool {
        let requested = self
            .inner
            .state
            .compare_exchange(
                MonitorState::Running as u8,
                MonitorState::Stopping as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok();
        if requested {
            info!("stop requested");
            self.inner.wake.notify_one();
        }
        requested
    }

    /// Wait for the loop task to finish.
    pub async fn wait(&self) {
        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            if let Err(err) = task.await {
                warn!(error = %err, "monitor loop ended abnormally");
                self.inner
                    .state
                    .store(MonitorState::Stopped as u8, Ordering::SeqCst);
            }
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> MonitorState {
        self.inner.state()
    }

    /// Check if the loop is running and has not been asked to stop.
    pub fn is_running(&self) -> bool {
        self.state() == MonitorState::Running
    }

    /// Run one scan, diff and emit cycle on the calling thread.
    ///
    /// This is the same cycle the loop runs; it blocks for the duration of
    /// the scan, and waits for a cycle the loop is running to finish first.
    /// Returns the number of file events emitted.
    pub fn run_once(&self) -> Result<usize, MonitorError> {
        self.inner.run_cycle()
    }

    /// Register a sink for every subsequent event.
    pub fn on_event<S: EventSink + 'static>(&self, sink: S) {
        self.add_sink(Arc::new(sink));
    }

    /// Register a sink the caller keeps a handle to.
    pub fn add_sink(&self, sink: Arc<dyn EventSink>) {
        self.inner
            .sinks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sink);
    }

    /// Receive every subsequent event on a channel.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<Event> {
        let (sink, rx) = ChannelSink::new();
        self.on_event(sink);
        rx
    }

    /// Current counter values.
    pub fn statistics(&self) -> Statistics {
        self.inner.stats.snapshot()
    }

    /// Reset the statistics and tell sinks to drop their logs.
    ///
    /// Snapshots and baseline hashes are left untouched.
    pub fn clear_logs_and_stats(&self) {
        self.inner.stats.reset();
        for sink in self.inner.sinks_snapshot() {
            sink.logs_cleared();
        }
    }

    /// Monitored roots in the order they were added.
    pub fn monitored_paths(&self) -> Vec<PathBuf> {
        self.inner.paths.to_vec()
    }

    /// Existence and direct file count of every monitored root.
    pub fn path_statuses(&self) -> Vec<PathStatus> {
        self.inner.paths.statuses()
    }

    /// Start monitoring another root.
    ///
    /// The root's current files are merged into the retained snapshot so the
    /// next cycle does not report them as created. Returns false if the root
    /// was already monitored.
    pub fn add_path(&self, path: impl AsRef<Path>) -> bool {
        let root = normalize(path.as_ref());

        let scanned = {
            let mut previous = self
                .inner
                .previous
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if !self.inner.paths.add(&root) {
                return false;
            }
            self.inner
                .source
                .snapshot(std::slice::from_ref(&root))
                .map(|snapshot| {
                    let files = snapshot.len();
                    previous.merge(snapshot);
                    files
                })
        };

        match scanned {
            Ok(files) => {
                info!(root = %root.display(), files, "root added");
                self.inner.emit(Event::new(
                    EventKind::System,
                    Some(root),
                    "added to monitoring",
                ));
            }
            Err(err) => {
                warn!(root = %root.display(), error = %err, "root added without baseline");
                self.inner.emit(Event::new(
                    EventKind::Error,
                    Some(root),
                    format!("added to monitoring without baseline: {err}"),
                ));
            }
        }
        true
    }

    /// Write a probe file into `dir` and report it as a TEST event.
    ///
    /// Returns the probe path, or `None` (after emitting an ERROR event) if
    /// it could not be written.
    pub fn create_test_file(&self, dir: impl AsRef<Path>) -> Option<PathBuf> {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        let path = normalize(dir.as_ref()).join(format!("test_file_{secs}.txt"));
        let contents = format!(
            "Test file created at {}\nThis file is being monitored for changes!\n",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        );

        match std::fs::write(&path, contents) {
            Ok(()) => {
                self.inner.emit(Event::new(
                    EventKind::Test,
                    Some(path.clone()),
                    "test file created, should appear as CREATED",
                ));
                Some(path)
            }
            Err(err) => {
                self.inner
                    .emit(Event::error(format!("could not create test file: {err}")));
                None
            }
        }
    }

    /// The integrity baselines.
    pub fn hashes(&self) -> &HashStore {
        &self.inner.hashes
    }

    /// Drop the baseline hash of a path.
    pub fn forget_path(&self, path: impl AsRef<Path>) -> Option<ContentHash> {
        self.inner.hashes.forget(&normalize(path.as_ref()))
    }

    /// Accept a path's current content as its new baseline.
    pub fn rebaseline(&self, path: impl AsRef<Path>) -> Option<ContentHash> {
        self.inner.hashes.rebaseline(&normalize(path.as_ref()))
    }

    /// Copy of the snapshot the next cycle will diff against.
    pub fn current_snapshot(&self) -> Snapshot {
        self.inner
            .previous
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of cycles that completed successfully.
    pub fn cycles_completed(&self) -> u64 {
        self.inner.cycles.load(Ordering::SeqCst)
    }

    /// The configuration the monitor was built with.
    pub fn config(&self) -> &MonitorConfig {
        &self.inner.config
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Inner {
    fn state(&self) -> MonitorState {
        MonitorState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn sinks_snapshot(&self) -> Vec<Arc<dyn EventSink>> {
        self.sinks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Scan, diff against the retained snapshot, replace it, then emit.
    ///
    /// If no baseline could be taken yet, the scan becomes the baseline and
    /// nothing is reported.
    fn run_cycle(&self) -> Result<usize, MonitorError> {
        // Held until emission and the refresh signal are done.
        let _cycle = self.cycle.lock().unwrap_or_else(PoisonError::into_inner);

        let events = {
            let mut previous = self
                .previous
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let current = self.source.snapshot(&self.paths.to_vec())?;
            let events = if self.baselined.swap(true, Ordering::SeqCst) {
                diff_events(&previous, &current, &self.hashes)
            } else {
                info!(files = current.len(), "baseline scan complete");
                Vec::new()
            };
            *previous = current;
            events
        };

        let emitted = events.len();
        for event in events {
            self.emit(event);
        }

        let cycle = self.cycles.fetch_add(1, Ordering::SeqCst);
        if cycle % u64::from(self.config.refresh_every.max(1)) == 0 {
            for sink in self.sinks_snapshot() {
                sink.refresh_paths();
            }
        }

        debug!(cycle, emitted, "cycle complete");
        Ok(emitted)
    }

    fn emit(&self, event: Event) {
        self.stats.record(event.kind);
        log_event(&event);
        for sink in self.sinks_snapshot() {
            sink.handle(&event);
        }
    }
}

async fn run_loop(inner: Arc<Inner>) {
    info!(roots = inner.paths.len(), "monitoring started");

    // Drop a wakeup left over from a stop that arrived while no one was waiting.
    tokio::select! {
        biased;
        _ = inner.wake.notified() => {}
        _ = std::future::ready(()) => {}
    }

    while inner.state() == MonitorState::Running {
        let worker = Arc::clone(&inner);
        let outcome = tokio::task::spawn_blocking(move || worker.run_cycle())
            .await
            .unwrap_or_else(|err| {
                Err(MonitorError::Task {
                    message: err.to_string(),
                })
            });

        let pause = match outcome {
            Ok(_) => inner.config.scan_interval,
            Err(err) => {
                warn!(error = %err, "monitor cycle failed");
                inner.emit(Event::error(format!("Error: {err}")));
                inner.config.error_backoff
            }
        };

        if inner.state() != MonitorState::Running {
            break;
        }
        tokio::select! {
            _ = tokio::time::sleep(pause) => {}
            _ = inner.wake.notified() => {}
        }
    }

    inner.emit(Event::system("monitoring stopped"));
    inner
        .state
        .store(MonitorState::Stopped as u8, Ordering::SeqCst);
    info!("monitoring stopped");
}

fn log_event(event: &Event) {
    let path = event
        .path
        .as_deref()
        .map(|p| p.display().to_string())
        .unwrap_or_default();

    if event.is_integrity_violation() {
        warn!(path = %path, "integrity violation detected");
        return;
    }
    match event.kind {
        EventKind::Error => warn!(path = %path, detail = %event.detail, "monitor error"),
        EventKind::System | EventKind::Test => {
            info!(path = %path, detail = %event.detail, "{}", event.kind)
        }
        _ => debug!(kind = %event.kind, path = %path, detail = %event.detail, "file event"),
    }
}
