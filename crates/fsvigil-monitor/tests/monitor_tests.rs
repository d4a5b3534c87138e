use fsvigil_core::{ConfigError, FileRecord, IntegrityStatus, MonitorError, ScanError};
use fsvigil_monitor::{
    Event, EventKind, EventLog, EventSink, Monitor, MonitorConfig, MonitorState, REASON_CONTENT,
    Snapshot, SnapshotSource,
};
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;
use tokio::sync::mpsc;

fn set_mtime(path: &Path, secs: u64) {
    let file = fs::OpenOptions::new().write(true).open(path).unwrap();
    file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
        .unwrap();
}

fn write_with_mtime(path: &Path, contents: &[u8], secs: u64) {
    fs::write(path, contents).unwrap();
    set_mtime(path, secs);
}

fn fast_config(roots: Vec<PathBuf>) -> MonitorConfig {
    MonitorConfig::builder()
        .roots(roots)
        .scan_interval(Duration::from_millis(20))
        .error_backoff(Duration::from_millis(20))
        .build()
        .unwrap()
}

fn monitor_with_log(root: &Path) -> (Monitor, Arc<EventLog>) {
    let monitor = Monitor::new(fast_config(vec![root.to_path_buf()])).unwrap();
    let log = Arc::new(EventLog::new());
    monitor.add_sink(log.clone());
    (monitor, log)
}

fn summary(events: &[Event]) -> Vec<(EventKind, Option<PathBuf>)> {
    events.iter().map(|e| (e.kind, e.path.clone())).collect()
}

async fn next_event(rx: &mut mpsc::UnboundedReceiver<Event>) -> Event {
    tokio::time::timeout(Duration::from_secs(10), rx.recv())
        .await
        .expect("timed out waiting for an event")
        .expect("event channel closed")
}

fn drain(rx: &mut mpsc::UnboundedReceiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn record(path: &str) -> FileRecord {
    FileRecord::new(path, 1, SystemTime::UNIX_EPOCH, None)
}

/// Replays a fixed list of scan results, then repeats the last good one.
struct ScriptedSource {
    script: Mutex<VecDeque<Result<Snapshot, ScanError>>>,
    last: Mutex<Snapshot>,
}

impl ScriptedSource {
    fn new(script: Vec<Result<Snapshot, ScanError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(Snapshot::new()),
        }
    }
}

impl SnapshotSource for ScriptedSource {
    fn snapshot(&self, _roots: &[PathBuf]) -> Result<Snapshot, ScanError> {
        match self.script.lock().unwrap().pop_front() {
            Some(Ok(snapshot)) => {
                *self.last.lock().unwrap() = snapshot.clone();
                Ok(snapshot)
            }
            Some(Err(err)) => Err(err),
            None => Ok(self.last.lock().unwrap().clone()),
        }
    }
}

/// Returns an empty baseline, then blocks the next `gated` scans until released.
struct GateSource {
    calls: AtomicUsize,
    gated: usize,
    entered: mpsc::UnboundedSender<()>,
    release: Mutex<std::sync::mpsc::Receiver<()>>,
    after: Snapshot,
}

impl GateSource {
    fn new(
        gated: usize,
        after: Snapshot,
    ) -> (
        Self,
        mpsc::UnboundedReceiver<()>,
        std::sync::mpsc::Sender<()>,
    ) {
        let (entered_tx, entered_rx) = mpsc::unbounded_channel();
        let (release_tx, release_rx) = std::sync::mpsc::channel();
        let source = Self {
            calls: AtomicUsize::new(0),
            gated,
            entered: entered_tx,
            release: Mutex::new(release_rx),
            after,
        };
        (source, entered_rx, release_tx)
    }
}

impl SnapshotSource for GateSource {
    fn snapshot(&self, _roots: &[PathBuf]) -> Result<Snapshot, ScanError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call == 0 {
            return Ok(Snapshot::new());
        }
        if call > self.gated {
            return Ok(self.after.clone());
        }
        let _ = self.entered.send(());
        let _ = self.release.lock().unwrap().recv();
        Ok(self.after.clone())
    }
}

/// Alternates between a full and an empty tree on every call.
struct FlipSource {
    calls: AtomicUsize,
    full: Snapshot,
}

impl SnapshotSource for FlipSource {
    fn snapshot(&self, _roots: &[PathBuf]) -> Result<Snapshot, ScanError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) % 2 == 0 {
            Ok(self.full.clone())
        } else {
            Ok(Snapshot::new())
        }
    }
}

#[derive(Default)]
struct RefreshCounter {
    refreshes: AtomicUsize,
}

impl EventSink for RefreshCounter {
    fn handle(&self, _event: &Event) {}

    fn refresh_paths(&self) {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn test_unchanged_tree_emits_nothing() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("a.txt"), "a").unwrap();
    let (monitor, log) = monitor_with_log(temp.path());

    assert_eq!(monitor.run_once().unwrap(), 0);
    assert_eq!(monitor.run_once().unwrap(), 0);
    assert!(log.is_empty());
}

#[test]
fn test_create_and_delete_in_one_cycle() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    fs::write(root.join("a.txt"), vec![b'a'; 100]).unwrap();
    fs::write(root.join("b.txt"), vec![b'b'; 200]).unwrap();
    let (monitor, log) = monitor_with_log(root);

    fs::remove_file(root.join("b.txt")).unwrap();
    fs::write(root.join("c.txt"), vec![b'c'; 50]).unwrap();
    monitor.run_once().unwrap();

    assert_eq!(
        summary(&log.events()),
        vec![
            (EventKind::Created, Some(root.join("c.txt"))),
            (EventKind::Deleted, Some(root.join("b.txt"))),
        ]
    );
    let stats = monitor.statistics();
    assert_eq!(stats.files_created, 1);
    assert_eq!(stats.files_deleted, 1);
    assert_eq!(stats.total_events, 2);
}

#[test]
fn test_mtime_change_with_same_size_is_content_change() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("a.txt");
    write_with_mtime(&path, &[b'a'; 100], 1_000_000);
    let (monitor, log) = monitor_with_log(temp.path());

    write_with_mtime(&path, &[b'z'; 100], 2_000_000);
    monitor.run_once().unwrap();

    let events = log.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, EventKind::Modified);
    assert_eq!(events[0].detail, REASON_CONTENT);
    let integrity = events[0].integrity.as_ref().unwrap();
    assert!(integrity.ok);
    assert_eq!(integrity.status, IntegrityStatus::Baselined);
    assert_eq!(monitor.statistics().file_changes, 1);
}

#[test]
fn test_clear_resets_stats_but_keeps_baselines() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    let watched = root.join("a.txt");
    write_with_mtime(&watched, b"original", 1_000_000);
    let (monitor, log) = monitor_with_log(root);

    write_with_mtime(&watched, b"original", 2_000_000);
    monitor.run_once().unwrap();
    for i in 0..4 {
        fs::write(root.join(format!("new{i}.txt")), "x").unwrap();
    }
    monitor.run_once().unwrap();
    assert_eq!(monitor.statistics().total_events, 5);

    monitor.clear_logs_and_stats();
    assert_eq!(monitor.statistics().total_events, 0);
    assert!(log.is_empty());
    assert!(monitor.hashes().baseline(&watched).is_some());

    write_with_mtime(&watched, b"tampered", 3_000_000);
    monitor.run_once().unwrap();

    let events = log.events();
    assert_eq!(events.len(), 1);
    assert!(events[0].is_integrity_violation());
    assert_eq!(monitor.statistics().total_events, 1);
    assert_eq!(monitor.statistics().file_changes, 1);
}

#[test]
fn test_violation_repeats_against_original_baseline() {
    let temp = TempDir::new().unwrap();
    let watched = temp.path().join("hosts");
    write_with_mtime(&watched, b"127.0.0.1 localhost", 1_000_000);
    let (monitor, log) = monitor_with_log(temp.path());

    write_with_mtime(&watched, b"127.0.0.1 localhost", 2_000_000);
    monitor.run_once().unwrap();
    write_with_mtime(&watched, b"10.0.0.1 localhost", 3_000_000);
    monitor.run_once().unwrap();
    write_with_mtime(&watched, b"10.0.0.2 localhost", 4_000_000);
    monitor.run_once().unwrap();

    let violations = log
        .events()
        .iter()
        .filter(|e| e.is_integrity_violation())
        .count();
    assert_eq!(violations, 2);

    monitor.rebaseline(&watched);
    write_with_mtime(&watched, b"10.0.0.2 localhost", 5_000_000);
    monitor.run_once().unwrap();
    assert!(!log.events().last().unwrap().is_integrity_violation());
}

#[test]
fn test_deleted_file_keeps_baseline_until_forgotten() {
    let temp = TempDir::new().unwrap();
    let watched = temp.path().join("a.txt");
    write_with_mtime(&watched, b"a", 1_000_000);
    let (monitor, log) = monitor_with_log(temp.path());

    write_with_mtime(&watched, b"a", 2_000_000);
    monitor.run_once().unwrap();
    fs::remove_file(&watched).unwrap();
    monitor.run_once().unwrap();

    assert_eq!(log.events().last().unwrap().kind, EventKind::Deleted);
    assert!(monitor.hashes().baseline(&watched).is_some());
    assert!(monitor.forget_path(&watched).is_some());
    assert!(monitor.hashes().is_empty());
}

#[test]
fn test_add_path_merges_existing_files() {
    let first = TempDir::new().unwrap();
    let second = TempDir::new().unwrap();
    fs::write(second.path().join("old1.txt"), "1").unwrap();
    fs::write(second.path().join("old2.txt"), "2").unwrap();
    let (monitor, log) = monitor_with_log(first.path());

    assert!(monitor.add_path(second.path()));
    assert!(!monitor.add_path(second.path()));
    assert_eq!(monitor.monitored_paths().len(), 2);

    assert_eq!(monitor.run_once().unwrap(), 0);
    fs::write(second.path().join("fresh.txt"), "3").unwrap();
    monitor.run_once().unwrap();

    assert_eq!(
        summary(&log.events()),
        vec![
            (EventKind::System, Some(second.path().to_path_buf())),
            (EventKind::Created, Some(second.path().join("fresh.txt"))),
        ]
    );
}

#[test]
fn test_missing_root_is_tolerated() {
    let temp = TempDir::new().unwrap();
    let missing = temp.path().join("later");
    let monitor = Monitor::new(fast_config(vec![missing.clone()])).unwrap();
    let log = Arc::new(EventLog::new());
    monitor.add_sink(log.clone());

    assert_eq!(monitor.run_once().unwrap(), 0);
    let status = &monitor.path_statuses()[0];
    assert!(!status.exists);

    fs::create_dir(&missing).unwrap();
    fs::write(missing.join("a.txt"), "a").unwrap();
    monitor.run_once().unwrap();

    assert_eq!(
        summary(&log.events()),
        vec![(EventKind::Created, Some(missing.join("a.txt")))]
    );
    assert_eq!(monitor.path_statuses()[0].file_count, 1);
}

#[test]
fn test_probe_file_is_reported_then_detected() {
    let temp = TempDir::new().unwrap();
    let (monitor, log) = monitor_with_log(temp.path());

    let probe = monitor.create_test_file(temp.path()).unwrap();
    monitor.run_once().unwrap();

    assert_eq!(
        summary(&log.events()),
        vec![
            (EventKind::Test, Some(probe.clone())),
            (EventKind::Created, Some(probe)),
        ]
    );

    assert!(monitor.create_test_file(temp.path().join("no/such/dir")).is_none());
    assert_eq!(log.events().last().unwrap().kind, EventKind::Error);
    assert_eq!(monitor.statistics().total_events, 3);
}

#[test]
fn test_refresh_signal_every_nth_cycle() {
    let config = MonitorConfig::builder().refresh_every(2u32).build().unwrap();
    let monitor = Monitor::with_source(config, ScriptedSource::new(Vec::new()));
    let counter = Arc::new(RefreshCounter::default());
    monitor.add_sink(counter.clone());

    for _ in 0..5 {
        monitor.run_once().unwrap();
    }

    assert_eq!(monitor.cycles_completed(), 5);
    assert_eq!(counter.refreshes.load(Ordering::SeqCst), 3);
}

#[test]
fn test_start_requires_runtime() {
    let monitor = Monitor::with_source(MonitorConfig::default(), ScriptedSource::new(Vec::new()));
    assert!(!monitor.start());
    assert_eq!(monitor.state(), MonitorState::Stopped);
    assert!(!monitor.stop());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_loop_reports_changes_until_stopped() {
    let temp = TempDir::new().unwrap();
    let monitor = Monitor::new(fast_config(vec![temp.path().to_path_buf()])).unwrap();
    let mut rx = monitor.subscribe();

    assert!(monitor.start());
    assert!(!monitor.start());
    assert!(monitor.is_running());

    let started = next_event(&mut rx).await;
    assert_eq!(started.kind, EventKind::System);
    assert_eq!(started.detail, "monitoring started");

    let created = temp.path().join("c.txt");
    fs::write(&created, "hello").unwrap();
    loop {
        let event = next_event(&mut rx).await;
        if event.kind == EventKind::Created {
            assert_eq!(event.path.as_deref(), Some(created.as_path()));
            break;
        }
    }

    assert!(monitor.stop());
    assert!(!monitor.stop());
    monitor.wait().await;

    assert_eq!(monitor.state(), MonitorState::Stopped);
    let rest = drain(&mut rx);
    let last = rest.last().unwrap();
    assert_eq!(last.kind, EventKind::System);
    assert_eq!(last.detail, "monitoring stopped");
    assert_eq!(monitor.statistics().files_created, 1);

    assert!(monitor.start());
    assert!(monitor.stop());
    monitor.wait().await;
    assert_eq!(monitor.state(), MonitorState::Stopped);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_loop_survives_cycle_errors() {
    let script = vec![
        Ok(Snapshot::new()),
        Err(ScanError::Other {
            message: "transient walk failure".to_string(),
        }),
        Ok(vec![record("/w/new.txt")].into_iter().collect()),
    ];
    let monitor = Monitor::with_source(
        fast_config(vec![PathBuf::from("/w")]),
        ScriptedSource::new(script),
    );
    let mut rx = monitor.subscribe();

    assert!(monitor.start());
    assert_eq!(next_event(&mut rx).await.kind, EventKind::System);

    let error = next_event(&mut rx).await;
    assert_eq!(error.kind, EventKind::Error);
    assert!(error.detail.contains("transient walk failure"));

    let created = next_event(&mut rx).await;
    assert_eq!(created.kind, EventKind::Created);
    assert_eq!(created.path, Some(PathBuf::from("/w/new.txt")));
    assert!(monitor.is_running());

    monitor.stop();
    monitor.wait().await;

    let stats = monitor.statistics();
    assert_eq!(stats.files_created, 1);
    // started, error, created, stopped
    assert_eq!(stats.total_events, 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stop_mid_cycle_finishes_the_cycle() {
    let (source, mut entered_rx, release_tx) =
        GateSource::new(usize::MAX, vec![record("/w/b.txt")].into_iter().collect());
    let monitor = Monitor::with_source(fast_config(vec![PathBuf::from("/w")]), source);
    let mut rx = monitor.subscribe();

    assert!(monitor.start());
    tokio::time::timeout(Duration::from_secs(10), entered_rx.recv())
        .await
        .unwrap();

    assert!(monitor.stop());
    assert_eq!(monitor.state(), MonitorState::Stopping);
    assert!(!monitor.start());

    release_tx.send(()).unwrap();
    monitor.wait().await;

    let events = drain(&mut rx);
    assert_eq!(
        events
            .iter()
            .map(|e| (e.kind, e.detail.as_str()))
            .collect::<Vec<_>>(),
        vec![
            (EventKind::System, "monitoring started"),
            (EventKind::Created, "new file detected"),
            (EventKind::System, "monitoring stopped"),
        ]
    );

    // The next run diffs against the snapshot the stopped cycle retained.
    release_tx.send(()).unwrap();
    assert!(monitor.start());
    tokio::time::timeout(Duration::from_secs(10), entered_rx.recv())
        .await
        .unwrap();
    monitor.stop();
    release_tx.send(()).unwrap();
    monitor.wait().await;

    let created = drain(&mut rx)
        .iter()
        .filter(|e| e.kind == EventKind::Created)
        .count();
    assert_eq!(created, 0);
    assert_eq!(monitor.statistics().files_created, 1);
}

#[test]
fn test_unreachable_root_does_not_block_other_roots() {
    let temp = TempDir::new().unwrap();
    let good = temp.path();
    fs::write(good.join("plain"), "not a directory").unwrap();
    let unreachable = good.join("plain/sub");
    let monitor = Monitor::new(fast_config(vec![good.to_path_buf(), unreachable])).unwrap();
    let log = Arc::new(EventLog::new());
    monitor.add_sink(log.clone());

    fs::write(good.join("new.txt"), "hello").unwrap();
    assert_eq!(monitor.run_once().unwrap(), 1);
    assert_eq!(monitor.run_once().unwrap(), 0);

    assert_eq!(
        summary(&log.events()),
        vec![(EventKind::Created, Some(good.join("new.txt")))]
    );
    assert_eq!(monitor.current_snapshot().len(), 2);
}

#[test]
fn test_failed_baseline_is_taken_on_first_cycle() {
    let two: Snapshot = vec![record("/w/a.txt"), record("/w/b.txt")]
        .into_iter()
        .collect();
    let mut three = two.clone();
    three.insert(record("/w/c.txt"));
    let script = vec![
        Err(ScanError::Other {
            message: "volume not mounted yet".to_string(),
        }),
        Ok(two),
        Ok(three),
    ];
    let monitor = Monitor::with_source(
        fast_config(vec![PathBuf::from("/w")]),
        ScriptedSource::new(script),
    );
    let log = Arc::new(EventLog::new());
    monitor.add_sink(log.clone());

    assert_eq!(monitor.run_once().unwrap(), 0);
    assert_eq!(monitor.current_snapshot().len(), 2);
    assert_eq!(monitor.run_once().unwrap(), 1);

    assert_eq!(
        summary(&log.events()),
        vec![(EventKind::Created, Some(PathBuf::from("/w/c.txt")))]
    );
}

#[test]
fn test_concurrent_cycles_emit_whole_batches() {
    const FILES: usize = 50;
    const CYCLES: usize = 20;

    let full: Snapshot = (0..FILES)
        .map(|i| record(&format!("/w/f{i:02}.txt")))
        .collect();
    let source = FlipSource {
        calls: AtomicUsize::new(0),
        full,
    };
    let monitor = Arc::new(Monitor::with_source(
        fast_config(vec![PathBuf::from("/w")]),
        source,
    ));
    let log = Arc::new(EventLog::new());
    monitor.add_sink(log.clone());

    let workers: Vec<_> = (0..2)
        .map(|_| {
            let monitor = Arc::clone(&monitor);
            std::thread::spawn(move || {
                for _ in 0..CYCLES {
                    monitor.run_once().unwrap();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    let events = log.events();
    assert_eq!(events.len(), 2 * CYCLES * FILES);
    for batch in events.chunks(FILES) {
        assert!(batch.iter().all(|e| e.kind == batch[0].kind));
    }
    assert_eq!(monitor.cycles_completed(), (2 * CYCLES) as u64);
}

#[test]
fn test_new_rejects_invalid_config() {
    let mut config = MonitorConfig::new(["/w"]);
    config.scan.ignore_patterns = vec!["a[".to_string()];

    let err = Monitor::new(config).err().unwrap();
    assert!(matches!(err, MonitorError::Config(ConfigError::Invalid { .. })));

    let mut config = MonitorConfig::new(["/w"]);
    config.refresh_every = 0;
    assert!(matches!(
        Monitor::new(config),
        Err(MonitorError::Config(_))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_restart_after_stop_mid_cycle_waits_full_interval() {
    let (source, mut entered_rx, release_tx) = GateSource::new(1, Snapshot::new());
    let config = MonitorConfig::builder()
        .roots(vec![PathBuf::from("/w")])
        .scan_interval(Duration::from_secs(60))
        .build()
        .unwrap();
    let monitor = Monitor::with_source(config, source);

    assert!(monitor.start());
    tokio::time::timeout(Duration::from_secs(10), entered_rx.recv())
        .await
        .unwrap();
    assert!(monitor.stop());
    release_tx.send(()).unwrap();
    monitor.wait().await;
    assert_eq!(monitor.cycles_completed(), 1);

    // The stop above arrived while nothing was waiting on the sleep.
    assert!(monitor.start());
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(monitor.cycles_completed(), 2);

    assert!(monitor.stop());
    monitor.wait().await;
    assert_eq!(monitor.state(), MonitorState::Stopped);
}
