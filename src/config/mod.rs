/// Configuration management
pub mod settings;
pub mod sources;

pub use settings::{EmailApiConfig, NotifierConfig, Settings, DEFAULT_SETTINGS_FILE};
pub use sources::{SourceRegistry, DEFAULT_SOURCES_FILE};
