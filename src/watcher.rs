//! Control loop: poll, detect, batch, flush
//!
//! A single cooperative loop owns every component. Each iteration polls all
//! files once, runs the detector over the new lines, echoes and batches the
//! matches, checks the flush window and then sleeps for a fixed quantum.
//! Cancellation is a flag observed between iterations, never during a read.

use crate::aggregator::ErrorBatch;
use crate::alerts::{FlushOutcome, FlushScheduler, FlushWindow, Notifier};
use crate::collectors::{ErrorDetector, FileCursorSet};
use crate::config::Settings;
use crate::events::ErrorRecord;
use crate::monitoring::MonitorStats;
use chrono::{DateTime, Local, NaiveDate, Utc};
use log::{debug, error, info, warn};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::Serializer;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

/// Indentation of the per-record JSON echo
const ECHO_INDENT: &[u8] = b"    ";

/// What happened during one poll cycle
#[derive(Debug)]
pub struct CycleReport {
    /// Complete lines read across all files
    pub lines_read: usize,
    /// Lines accepted by the detector
    pub errors_detected: usize,
    /// File faults raised during the poll
    pub faults: usize,
    /// Set when the flush window elapsed this cycle
    pub flush: Option<FlushOutcome>,
}

/// Tails the monitored files and reports same-day errors in batches
pub struct LogWatcher {
    cursors: FileCursorSet,
    detector: ErrorDetector,
    scheduler: FlushScheduler,
    poll_interval: Duration,
    echo: Box<dyn Write>,
    stats: MonitorStats,
}

impl LogWatcher {
    /// Create a watcher from already-built components
    ///
    /// Detected records are echoed to stdout and the loop sleeps 100 ms
    /// between cycles unless overridden.
    pub fn new(cursors: FileCursorSet, scheduler: FlushScheduler) -> Self {
        Self {
            cursors,
            detector: ErrorDetector::new(),
            scheduler,
            poll_interval: Duration::from_millis(100),
            echo: Box::new(io::stdout()),
            stats: MonitorStats::new(),
        }
    }

    /// Open `paths` and wire the components according to `settings`
    ///
    /// Files that cannot be opened are reported and retried on later polls.
    pub fn from_settings(settings: &Settings, paths: &[PathBuf], notifier: Box<dyn Notifier>) -> Self {
        let (cursors, faults) = FileCursorSet::open(paths);
        for fault in &faults {
            error!("{}", fault);
        }

        let batch = match settings.max_batch_size {
            Some(max_size) => ErrorBatch::with_capacity_limit(max_size),
            None => ErrorBatch::new(),
        };
        let scheduler = FlushScheduler::new(notifier, FlushWindow::new(settings.flush_interval()))
            .with_batch(batch);

        let mut watcher = Self::new(cursors.with_lines_per_poll(settings.lines_per_poll), scheduler)
            .with_poll_interval(settings.poll_interval());
        watcher.stats.record_faults(faults.len());
        watcher
    }

    /// Override the sleep between poll cycles
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Send the per-record JSON echo somewhere other than stdout
    pub fn with_echo(mut self, echo: Box<dyn Write>) -> Self {
        self.echo = echo;
        self
    }

    /// Run until `shutdown` is set, then close files and flush once more
    pub fn run(mut self, shutdown: &AtomicBool) -> MonitorStats {
        info!(
            "Monitoring {} log files ({} open), flushing every {}s",
            self.cursors.len(),
            self.cursors.open_count(),
            self.scheduler.window().interval().num_seconds()
        );

        while !shutdown.load(Ordering::SeqCst) {
            self.poll_cycle(Utc::now(), Local::now().date_naive());
            thread::sleep(self.poll_interval);
        }

        info!("Stopping log monitoring.");
        self.shutdown(Utc::now())
    }

    /// Execute one iteration of the loop body (without the sleep)
    ///
    /// `now` drives the flush window and `today` the freshness check.
    pub fn poll_cycle(&mut self, now: DateTime<Utc>, today: NaiveDate) -> CycleReport {
        let output = self.cursors.poll();
        for fault in &output.faults {
            error!("{}", fault);
        }

        let mut errors_detected = 0;
        for tailed in &output.lines {
            if !self.detector.is_error_on(&tailed.line, today) {
                continue;
            }
            let record = ErrorRecord::new(&tailed.path, &tailed.line);
            self.echo_record(&record);
            self.scheduler.record(record);
            errors_detected += 1;
        }

        let flush = self.scheduler.tick(now);
        if let Some(outcome) = &flush {
            self.stats.record_flush(outcome);
        }
        self.stats
            .record_cycle(output.lines.len(), errors_detected, output.faults.len());

        CycleReport {
            lines_read: output.lines.len(),
            errors_detected,
            faults: output.faults.len(),
            flush,
        }
    }

    /// Release every file handle, make the final flush and return the stats
    pub fn shutdown(self, now: DateTime<Utc>) -> MonitorStats {
        let LogWatcher {
            cursors,
            mut scheduler,
            mut stats,
            ..
        } = self;

        let failures = cursors.close();
        for failure in &failures {
            error!("{}", failure);
        }
        stats.record_faults(failures.len());

        debug!("Final flush of {} pending records", scheduler.pending());
        let outcome = scheduler.flush(now);
        stats.record_flush(&outcome);
        stats.records_dropped = scheduler.batch().dropped();

        stats.log_summary();
        stats
    }

    /// Records waiting for the next flush
    pub fn pending(&self) -> usize {
        self.scheduler.pending()
    }

    pub fn scheduler(&self) -> &FlushScheduler {
        &self.scheduler
    }

    pub fn stats(&self) -> &MonitorStats {
        &self.stats
    }

    fn echo_record(&mut self, record: &ErrorRecord) {
        let mut json = Vec::new();
        let mut serializer =
            Serializer::with_formatter(&mut json, PrettyFormatter::with_indent(ECHO_INDENT));
        if let Err(e) = record.serialize(&mut serializer) {
            warn!("Failed to serialize error record: {}", e);
            return;
        }
        json.push(b'\n');
        if let Err(e) = self.echo.write_all(&json).and_then(|_| self.echo.flush()) {
            warn!("Failed to echo error record: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::notifier::MockNotifier;
    use crate::error::DeliveryError;
    use std::fs::OpenOptions;
    use std::path::Path;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    /// Write sink whose contents stay inspectable after being boxed
    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    fn append(path: &Path, content: &str) {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .unwrap();
        file.write_all(content.as_bytes()).unwrap();
    }

    fn june_first() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    fn watcher(
        paths: &[PathBuf],
        mock: MockNotifier,
        start: DateTime<Utc>,
        echo: SharedBuffer,
    ) -> LogWatcher {
        let (cursors, _) = FileCursorSet::open(paths);
        let scheduler = FlushScheduler::new(
            Box::new(mock),
            FlushWindow::starting_at(chrono::Duration::minutes(10), start),
        );
        LogWatcher::new(cursors, scheduler).with_echo(Box::new(echo))
    }

    #[test]
    fn test_only_matching_file_contributes() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.log");
        let b = dir.path().join("b.log");
        append(&a, "2024-06-01 ERROR x\n");
        append(&b, "no issue here\n");

        let mut mock = MockNotifier::new();
        mock.expect_deliver().never();

        let start = Utc::now();
        let mut watcher = watcher(&[a.clone(), b], mock, start, SharedBuffer::default());

        let report = watcher.poll_cycle(start, june_first());
        assert_eq!(report.lines_read, 2);
        assert_eq!(report.errors_detected, 1);
        assert!(report.flush.is_none());

        let records: Vec<_> = watcher.scheduler().batch().records().collect();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].source_path, a);
        assert_eq!(records[0].message, "2024-06-01 ERROR x");
    }

    #[test]
    fn test_stale_errors_are_not_batched() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.log");
        append(&a, "2024-05-31 ERROR from yesterday\n");

        let mut mock = MockNotifier::new();
        mock.expect_deliver().never();

        let start = Utc::now();
        let mut watcher = watcher(&[a], mock, start, SharedBuffer::default());

        let report = watcher.poll_cycle(start, june_first());
        assert_eq!(report.lines_read, 1);
        assert_eq!(report.errors_detected, 0);
        assert_eq!(watcher.pending(), 0);
    }

    #[test]
    fn test_detected_records_are_echoed_immediately() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.log");
        append(&a, "2024-06-01 Error: cache miss storm\n");

        let mut mock = MockNotifier::new();
        mock.expect_deliver().never();

        let echo = SharedBuffer::default();
        let start = Utc::now();
        let mut watcher = watcher(&[a.clone()], mock, start, echo.clone());
        watcher.poll_cycle(start, june_first());

        let contents = echo.contents();
        assert!(contents.starts_with("{\n    \"date\": "));
        assert!(contents.ends_with("}\n"));

        let printed: serde_json::Value = serde_json::from_str(&contents).unwrap();
        assert_eq!(printed["error_message"], "2024-06-01 Error: cache miss storm");
        assert_eq!(printed["log_file"], a.to_str().unwrap());
    }

    #[test]
    fn test_flush_happens_when_window_elapses() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.log");
        append(&a, "2024-06-01 ERROR one\n");

        let mut mock = MockNotifier::new();
        mock.expect_deliver()
            .times(1)
            .withf(|records| records.len() == 1 && records[0].message == "2024-06-01 ERROR one")
            .returning(|_| Ok(()));

        let start = Utc::now();
        let mut watcher = watcher(&[a], mock, start, SharedBuffer::default());

        assert!(watcher.poll_cycle(start, june_first()).flush.is_none());
        let report = watcher.poll_cycle(start + chrono::Duration::minutes(10), june_first());
        assert!(matches!(report.flush, Some(FlushOutcome::Delivered(1))));
        assert_eq!(watcher.pending(), 0);
        assert_eq!(watcher.stats().flushes_delivered, 1);
    }

    #[test]
    fn test_failed_delivery_drops_batch() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.log");
        append(&a, "2024-06-01 ERROR one\n");

        let mut mock = MockNotifier::new();
        mock.expect_deliver()
            .times(1)
            .returning(|_| Err(DeliveryError::Status(502)));

        let start = Utc::now();
        let mut watcher = watcher(&[a], mock, start, SharedBuffer::default());
        watcher.poll_cycle(start, june_first());

        let report = watcher.poll_cycle(start + chrono::Duration::minutes(11), june_first());
        assert!(matches!(report.flush, Some(FlushOutcome::Failed { records: 1, .. })));
        assert_eq!(watcher.pending(), 0);

        // Shutdown has nothing left to send
        let stats = watcher.shutdown(start + chrono::Duration::minutes(12));
        assert_eq!(stats.records_lost, 1);
    }

    #[test]
    fn test_shutdown_flushes_all_pending_once() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.log");
        append(
            &a,
            "2024-06-01 ERROR 1\n2024-06-01 ERROR 2\n2024-06-01 ERROR 3\n",
        );

        let mut mock = MockNotifier::new();
        mock.expect_deliver()
            .times(1)
            .withf(|records| {
                records.len() == 3
                    && records[0].message == "2024-06-01 ERROR 1"
                    && records[2].message == "2024-06-01 ERROR 3"
            })
            .returning(|_| Ok(()));

        let start = Utc::now();
        let mut watcher = watcher(&[a], mock, start, SharedBuffer::default());
        for _ in 0..3 {
            watcher.poll_cycle(start, june_first());
        }
        assert_eq!(watcher.pending(), 3);

        let stats = watcher.shutdown(start);
        assert_eq!(stats.flushes_delivered, 1);
        assert_eq!(stats.records_delivered, 3);
        assert_eq!(stats.errors_detected, 3);
    }

    #[test]
    fn test_missing_file_does_not_stop_others() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.log");
        let a = dir.path().join("a.log");
        append(&a, "2024-06-01 ERROR survived\n");

        let mut mock = MockNotifier::new();
        mock.expect_deliver().never();

        let start = Utc::now();
        let mut watcher = watcher(&[missing, a], mock, start, SharedBuffer::default());
        let report = watcher.poll_cycle(start, june_first());
        assert_eq!(report.errors_detected, 1);
        assert_eq!(watcher.pending(), 1);
    }

    #[test]
    fn test_run_stops_on_flag_and_flushes() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.log");
        // Carry both dates so the line still matches if the run crosses midnight
        let today = Local::now().date_naive();
        let tomorrow = today.succ_opt().unwrap();
        append(
            &a,
            &format!(
                "{} 23:59:59 ERROR live failure (retry {})\n",
                today.format("%Y-%m-%d"),
                tomorrow.format("%Y-%m-%d")
            ),
        );

        let mut mock = MockNotifier::new();
        mock.expect_deliver()
            .times(1)
            .withf(|records| records.len() == 1)
            .returning(|_| Ok(()));

        let (cursors, _) = FileCursorSet::open(&[a]);
        let scheduler = FlushScheduler::new(
            Box::new(mock),
            FlushWindow::new(chrono::Duration::hours(1)),
        );
        let watcher = LogWatcher::new(cursors, scheduler)
            .with_poll_interval(Duration::from_millis(10))
            .with_echo(Box::new(SharedBuffer::default()));

        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&shutdown);
        let stopper = thread::spawn(move || {
            thread::sleep(Duration::from_millis(200));
            flag.store(true, Ordering::SeqCst);
        });

        let stats = watcher.run(&shutdown);
        stopper.join().unwrap();

        assert!(stats.poll_cycles >= 1);
        assert_eq!(stats.errors_detected, 1);
        assert_eq!(stats.records_delivered, 1);
    }

    #[test]
    fn test_run_with_flag_already_set_only_flushes() {
        let mut mock = MockNotifier::new();
        mock.expect_deliver().never();

        let (cursors, _) = FileCursorSet::open(&[]);
        let scheduler = FlushScheduler::new(Box::new(mock), FlushWindow::default());
        let watcher = LogWatcher::new(cursors, scheduler);

        let stats = watcher.run(&AtomicBool::new(true));
        assert_eq!(stats.poll_cycles, 0);
    }

    #[test]
    fn test_from_settings_applies_limits() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.log");
        append(
            &a,
            "2024-06-01 ERROR 1\n2024-06-01 ERROR 2\n2024-06-01 ERROR 3\n",
        );

        let settings = Settings {
            lines_per_poll: 5,
            max_batch_size: Some(2),
            ..Settings::default()
        };

        let mut mock = MockNotifier::new();
        mock.expect_deliver()
            .times(1)
            .withf(|records| records.len() == 2 && records[0].message == "2024-06-01 ERROR 2")
            .returning(|_| Ok(()));

        let mut watcher = LogWatcher::from_settings(
            &settings,
            &[a, dir.path().join("absent.log")],
            Box::new(mock),
        )
        .with_echo(Box::new(SharedBuffer::default()));
        assert_eq!(watcher.stats().file_faults, 1);

        let report = watcher.poll_cycle(Utc::now(), june_first());
        assert_eq!(report.lines_read, 3);

        let stats = watcher.shutdown(Utc::now());
        assert_eq!(stats.records_dropped, 1);
        assert_eq!(stats.records_delivered, 2);
    }
}
