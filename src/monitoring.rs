//! Self-monitoring counters for the watcher
//!
//! Tracks how much work the control loop has done and how deliveries went.
//! The counters are owned by the loop and summarized to the log at shutdown.

use crate::alerts::FlushOutcome;
use chrono::{DateTime, Utc};
use log::info;

/// Counters accumulated over the lifetime of a watcher
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorStats {
    /// When monitoring started
    pub started_at: DateTime<Utc>,
    /// Completed poll cycles
    pub poll_cycles: u64,
    /// Complete lines read across all files
    pub lines_read: u64,
    /// Lines accepted by the detector
    pub errors_detected: u64,
    /// File open/read/close faults
    pub file_faults: u64,
    /// Flushes accepted by the notifier
    pub flushes_delivered: u64,
    /// Flushes rejected by the notifier
    pub flushes_failed: u64,
    /// Records in delivered flushes
    pub records_delivered: u64,
    /// Records discarded with a failed flush
    pub records_lost: u64,
    /// Records discarded by the batch capacity limit
    pub records_dropped: u64,
}

impl Default for MonitorStats {
    fn default() -> Self {
        Self::new()
    }
}

impl MonitorStats {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            poll_cycles: 0,
            lines_read: 0,
            errors_detected: 0,
            file_faults: 0,
            flushes_delivered: 0,
            flushes_failed: 0,
            records_delivered: 0,
            records_lost: 0,
            records_dropped: 0,
        }
    }

    /// Record the work done in one poll cycle
    pub fn record_cycle(&mut self, lines: usize, matches: usize, faults: usize) {
        self.poll_cycles += 1;
        self.lines_read += lines as u64;
        self.errors_detected += matches as u64;
        self.file_faults += faults as u64;
    }

    /// Record file faults raised outside a poll cycle (open, close)
    pub fn record_faults(&mut self, faults: usize) {
        self.file_faults += faults as u64;
    }

    /// Record the outcome of a flush
    pub fn record_flush(&mut self, outcome: &FlushOutcome) {
        match outcome {
            FlushOutcome::Empty => {}
            FlushOutcome::Delivered(count) => {
                self.flushes_delivered += 1;
                self.records_delivered += *count as u64;
            }
            FlushOutcome::Failed { records, .. } => {
                self.flushes_failed += 1;
                self.records_lost += *records as u64;
            }
        }
    }

    /// Delivery success rate as a percentage (0-100)
    ///
    /// 100 when nothing has been delivered yet.
    pub fn delivery_success_rate(&self) -> f64 {
        let attempts = self.flushes_delivered + self.flushes_failed;
        if attempts == 0 {
            return 100.0;
        }
        (self.flushes_delivered as f64 / attempts as f64) * 100.0
    }

    /// Write a one-block summary to the log
    pub fn log_summary(&self) {
        let uptime = Utc::now() - self.started_at;
        info!(
            "Monitoring summary: uptime {}s, {} cycles, {} lines read, {} errors detected, {} file faults",
            uptime.num_seconds(),
            self.poll_cycles,
            self.lines_read,
            self.errors_detected,
            self.file_faults
        );
        info!(
            "Delivery summary: {} flushes delivered ({} records), {} failed ({} records lost), {} dropped by cap, {:.1}% success",
            self.flushes_delivered,
            self.records_delivered,
            self.flushes_failed,
            self.records_lost,
            self.records_dropped,
            self.delivery_success_rate()
        );
    }
}
