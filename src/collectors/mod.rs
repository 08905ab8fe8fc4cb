/// Incremental multi-file line reader
pub mod file_tailer;
/// Same-day error line detection
pub mod error_detector;

pub use error_detector::ErrorDetector;
pub use file_tailer::{FileCursorSet, PollOutput, TailedLine};
