/// Error types for the log watcher
pub mod error;

/// Detected error records
pub mod events;

/// File tailing and error detection
pub mod collectors;

/// Pending error batch
pub mod aggregator;

/// Flush window, scheduling and notifiers
pub mod alerts;

/// Configuration management
pub mod config;

/// Self-monitoring counters
pub mod monitoring;

/// Poll/detect/flush control loop
pub mod watcher;

// Re-export commonly used types
pub use error::{ConfigError, DeliveryError, FileAccessError};
pub use events::ErrorRecord;
pub use monitoring::MonitorStats;
pub use watcher::LogWatcher;
