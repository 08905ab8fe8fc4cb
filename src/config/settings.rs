use crate::config::sources::DEFAULT_SOURCES_FILE;
use crate::error::ConfigError;
use log::{info, warn};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Settings file looked up in the working directory when none is given
pub const DEFAULT_SETTINGS_FILE: &str = "errwatch.toml";

/// Runtime settings for the watcher
///
/// Every field has a default, so an absent settings file yields a working
/// configuration that logs reports instead of emailing them.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// CSV table listing the files to monitor
    pub sources_file: PathBuf,
    /// Minimum time between two flushes
    pub flush_interval_seconds: u64,
    /// Sleep between poll cycles
    pub poll_interval_ms: u64,
    /// Complete lines taken from each file per poll cycle
    pub lines_per_poll: usize,
    /// Cap on pending records; oldest are dropped beyond it. Unbounded if unset.
    pub max_batch_size: Option<usize>,
    /// Where flushed batches go
    pub notifier: NotifierConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sources_file: PathBuf::from(DEFAULT_SOURCES_FILE),
            flush_interval_seconds: 600,
            poll_interval_ms: 100,
            lines_per_poll: 1,
            max_batch_size: None,
            notifier: NotifierConfig::default(),
        }
    }
}

/// Notification backend selection
#[derive(Debug, Clone, Deserialize, PartialEq, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotifierConfig {
    /// HTTP email relay
    EmailApi(EmailApiConfig),
    /// Write reports to the log only
    #[default]
    Log,
}

/// Email relay endpoint and message envelope
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct EmailApiConfig {
    pub url: String,
    #[serde(default)]
    pub token: String,
    pub recipients: Vec<String>,
    pub sender: String,
    #[serde(default = "default_subject")]
    pub subject: String,
    /// No timeout unless set
    #[serde(default)]
    pub request_timeout_seconds: Option<u64>,
}

fn default_subject() -> String {
    "Error report".to_string()
}

impl Settings {
    /// Load settings from a TOML file
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ReadError` if the file cannot be read,
    /// `ConfigError::TomlError` if it does not parse and
    /// `ConfigError::ValidationError` if a value is out of range.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;
        Self::from_toml(&content)
    }

    /// Parse and validate settings from TOML text
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let settings: Settings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Resolve settings for the binary
    ///
    /// An explicit path must exist. Without one, [`DEFAULT_SETTINGS_FILE`] is
    /// used when present, otherwise built-in defaults apply.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => {
                info!("Loading settings from: {}", path.display());
                Self::from_file(path)
            }
            None => {
                let default_path = Path::new(DEFAULT_SETTINGS_FILE);
                if default_path.is_file() {
                    info!("Loading settings from: {}", default_path.display());
                    Self::from_file(default_path)
                } else {
                    info!("No {} found, using default settings", DEFAULT_SETTINGS_FILE);
                    Ok(Self::default())
                }
            }
        }
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.flush_interval_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "flush_interval_seconds must be greater than 0".to_string(),
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "poll_interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.lines_per_poll == 0 {
            return Err(ConfigError::ValidationError(
                "lines_per_poll must be at least 1".to_string(),
            ));
        }
        if self.max_batch_size == Some(0) {
            return Err(ConfigError::ValidationError(
                "max_batch_size must be at least 1 when set".to_string(),
            ));
        }

        if let NotifierConfig::EmailApi(email) = &self.notifier {
            if !(email.url.starts_with("http://") || email.url.starts_with("https://")) {
                return Err(ConfigError::ValidationError(format!(
                    "notifier url must be an http(s) URL, got '{}'",
                    email.url
                )));
            }
            if email.recipients.is_empty() {
                return Err(ConfigError::ValidationError(
                    "notifier recipients must not be empty".to_string(),
                ));
            }
            if email.token.is_empty() {
                warn!("Email relay configured without a token");
            }
        }

        Ok(())
    }

    /// Flush interval as a chrono duration
    pub fn flush_interval(&self) -> chrono::Duration {
        i64::try_from(self.flush_interval_seconds)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or(chrono::Duration::MAX)
    }

    /// Sleep quantum between poll cycles
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
