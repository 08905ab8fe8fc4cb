/// Error batch accumulated between flushes
pub mod error_batch;

pub use error_batch::ErrorBatch;
