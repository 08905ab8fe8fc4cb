//! Append-only buffer of detected errors between flushes
//!
//! The batch keeps records in detection order and performs no deduplication.
//! It is unbounded unless a capacity is configured, in which case the oldest
//! records are dropped to make room and counted.

use crate::events::ErrorRecord;
use log::warn;
use std::collections::VecDeque;

/// Records accumulated since the last flush
#[derive(Debug, Default)]
pub struct ErrorBatch {
    /// Records in detection order
    records: VecDeque<ErrorRecord>,
    /// Optional capacity; `None` means unbounded
    max_size: Option<usize>,
    /// Records dropped by the capacity limit since the batch was created
    dropped: u64,
}

impl ErrorBatch {
    /// Create an unbounded batch
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a batch that drops its oldest record once `max_size` is exceeded
    ///
    /// # Examples
    ///
    /// ```
    /// use errwatch::aggregator::ErrorBatch;
    ///
    /// let batch = ErrorBatch::with_capacity_limit(500);
    /// assert!(batch.is_empty());
    /// ```
    pub fn with_capacity_limit(max_size: usize) -> Self {
        Self {
            records: VecDeque::new(),
            max_size: Some(max_size.max(1)),
            dropped: 0,
        }
    }

    /// Append a record
    pub fn push(&mut self, record: ErrorRecord) {
        self.records.push_back(record);
        self.enforce_capacity();
    }

    /// Move every record out, leaving the batch empty
    pub fn take(&mut self) -> Vec<ErrorRecord> {
        self.records.drain(..).collect()
    }

    /// Records currently held, oldest first
    pub fn records(&self) -> impl Iterator<Item = &ErrorRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Total records discarded by the capacity limit
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    fn enforce_capacity(&mut self) {
        let Some(max_size) = self.max_size else {
            return;
        };

        while self.records.len() > max_size {
            if let Some(oldest) = self.records.pop_front() {
                self.dropped += 1;
                warn!(
                    "Error batch full ({} records), dropping oldest from {}",
                    max_size,
                    oldest.source_path.display()
                );
            }
        }
    }
}
