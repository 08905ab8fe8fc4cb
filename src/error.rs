use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during configuration loading
///
/// Any of these is fatal at startup: monitoring never begins.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),

    #[error("Invalid configuration value: {0}")]
    ValidationError(String),

    #[error("Source table {path} is missing required column '{column}'")]
    MissingColumn { path: PathBuf, column: String },

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
}

/// Errors raised while tailing a monitored file
///
/// Always tagged with the offending path. Never fatal; the file is skipped
/// until the condition clears.
#[derive(Error, Debug)]
pub enum FileAccessError {
    #[error("Failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to close {path}: {source}")]
    Close {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl FileAccessError {
    /// Path of the file that faulted
    pub fn path(&self) -> &PathBuf {
        match self {
            FileAccessError::Open { path, .. }
            | FileAccessError::Read { path, .. }
            | FileAccessError::Close { path, .. } => path,
        }
    }
}

/// Errors that can occur when delivering a batch to the alert endpoint
#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("Failed to build HTTP client: {0}")]
    Client(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Alert endpoint returned status {0}")]
    Status(u16),
}
