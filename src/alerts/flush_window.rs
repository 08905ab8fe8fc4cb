use chrono::{DateTime, Duration, Utc};

/// Time window that decides when the error batch is due for a flush
///
/// Holds the configured interval and the time of the last flush. The window
/// is checked once per poll cycle, so flushes happen at poll granularity.
#[derive(Debug, Clone)]
pub struct FlushWindow {
    /// Minimum time between two flushes
    interval: Duration,
    /// When the batch was last flushed (or when the window was created)
    last_flush_at: DateTime<Utc>,
}

impl Default for FlushWindow {
    fn default() -> Self {
        Self::new(Duration::minutes(10)) // Default: one flush every 10 minutes
    }
}

impl FlushWindow {
    /// Create a window whose first period starts now
    ///
    /// # Arguments
    ///
    /// * `interval` - Minimum time between two flushes
    pub fn new(interval: Duration) -> Self {
        Self::starting_at(interval, Utc::now())
    }

    /// Create a window whose first period starts at `start`
    ///
    /// This is primarily used for testing with controlled timestamps.
    pub fn starting_at(interval: Duration, start: DateTime<Utc>) -> Self {
        Self {
            interval,
            last_flush_at: start,
        }
    }

    /// Check whether a flush is due at the current time
    pub fn is_due(&self) -> bool {
        self.is_due_at(Utc::now())
    }

    /// Check whether `now - last_flush_at >= interval`
    pub fn is_due_at(&self, now: DateTime<Utc>) -> bool {
        now - self.last_flush_at >= self.interval
    }

    /// Record that a flush happened at `now`, starting a new period
    pub fn record_flush_at(&mut self, now: DateTime<Utc>) {
        self.last_flush_at = now;
    }

    /// Time of the last flush
    pub fn last_flush_at(&self) -> DateTime<Utc> {
        self.last_flush_at
    }

    /// Configured interval
    pub fn interval(&self) -> Duration {
        self.interval
    }
}
