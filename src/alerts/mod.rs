/// Flush scheduling and notification delivery
pub mod flush_scheduler;
pub mod flush_window;
pub mod notifier;

pub use flush_scheduler::{FlushOutcome, FlushScheduler};
pub use flush_window::FlushWindow;
pub use notifier::{build_notifier, EmailApiNotifier, LogNotifier, Notifier};
