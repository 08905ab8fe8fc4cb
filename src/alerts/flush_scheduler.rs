use crate::aggregator::ErrorBatch;
use crate::alerts::{FlushWindow, Notifier};
use crate::error::DeliveryError;
use crate::events::ErrorRecord;
use chrono::{DateTime, Utc};
use log::{debug, error, info};

/// Result of a flush attempt
#[derive(Debug)]
pub enum FlushOutcome {
    /// Nothing was pending; the notifier was not called
    Empty,
    /// The notifier accepted this many records
    Delivered(usize),
    /// The notifier rejected the batch; the records are gone regardless
    Failed {
        records: usize,
        error: DeliveryError,
    },
}

/// Owns the error batch and decides when to hand it to the notifier
///
/// Two states: accumulating, and a transient synchronous flush. A flush
/// always clears the batch and restarts the window, whether delivery
/// succeeded or not. Failed deliveries are logged and never retried.
pub struct FlushScheduler {
    batch: ErrorBatch,
    window: FlushWindow,
    notifier: Box<dyn Notifier>,
}

impl FlushScheduler {
    /// Create a scheduler with an unbounded batch
    pub fn new(notifier: Box<dyn Notifier>, window: FlushWindow) -> Self {
        Self {
            batch: ErrorBatch::new(),
            window,
            notifier,
        }
    }

    /// Replace the batch, e.g. with a capacity-limited one
    pub fn with_batch(mut self, batch: ErrorBatch) -> Self {
        self.batch = batch;
        self
    }

    /// Append a detected record to the current batch
    pub fn record(&mut self, record: ErrorRecord) {
        self.batch.push(record);
    }

    /// Flush if the window has elapsed at `now`
    ///
    /// Meant to be called once per poll cycle.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<FlushOutcome> {
        if self.window.is_due_at(now) {
            Some(self.flush(now))
        } else {
            None
        }
    }

    /// Deliver whatever is pending, then clear the batch and restart the window
    pub fn flush(&mut self, now: DateTime<Utc>) -> FlushOutcome {
        let records = self.batch.take();
        self.window.record_flush_at(now);

        if records.is_empty() {
            debug!("Flush window elapsed with no pending errors");
            return FlushOutcome::Empty;
        }

        let count = records.len();
        match self.notifier.deliver(&records) {
            Ok(()) => {
                info!("Flushed {} error records", count);
                FlushOutcome::Delivered(count)
            }
            Err(e) => {
                error!("Failed to deliver {} error records: {}", count, e);
                FlushOutcome::Failed {
                    records: count,
                    error: e,
                }
            }
        }
    }

    /// Number of records waiting for the next flush
    pub fn pending(&self) -> usize {
        self.batch.len()
    }

    pub fn batch(&self) -> &ErrorBatch {
        &self.batch
    }

    pub fn window(&self) -> &FlushWindow {
        &self.window
    }
}
