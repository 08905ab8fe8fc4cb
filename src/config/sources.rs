//! Source registry: the table of log files to monitor
//!
//! The table is a CSV file with a header row. Two columns are required:
//! `MainPath` (a base directory) and `FilePath` (a path relative to it).
//! Each row yields one monitored path, `MainPath` joined with `FilePath`
//! and lexically normalized. Extra columns are ignored.

use crate::error::ConfigError;
use csv::{ReaderBuilder, Trim};
use log::debug;
use std::fs::File;
use std::io::Read;
use std::path::{Component, Path, PathBuf};

/// Fixed name of the source table looked up in the working directory
pub const DEFAULT_SOURCES_FILE: &str = "LogFiler.csv";

pub const MAIN_PATH_COLUMN: &str = "MainPath";
pub const FILE_PATH_COLUMN: &str = "FilePath";

/// Ordered list of monitored file paths
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRegistry {
    paths: Vec<PathBuf>,
}

impl SourceRegistry {
    /// Load the registry from a CSV file
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ReadError` if the file cannot be opened,
    /// `ConfigError::MissingColumn` if a required column is absent,
    /// `ConfigError::CsvError` for malformed rows and
    /// `ConfigError::ValidationError` if the table lists no files.
    pub fn from_csv(path: &Path) -> Result<Self, ConfigError> {
        let file = File::open(path)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;
        Self::from_reader(file, path)
    }

    /// Load the registry from any reader; `origin` is used in error messages
    pub fn from_reader<R: Read>(reader: R, origin: &Path) -> Result<Self, ConfigError> {
        let mut csv_reader = ReaderBuilder::new().trim(Trim::All).from_reader(reader);

        let headers = csv_reader.headers()?.clone();
        let main_idx = column_index(&headers, MAIN_PATH_COLUMN, origin)?;
        let file_idx = column_index(&headers, FILE_PATH_COLUMN, origin)?;

        let mut paths = Vec::new();
        for row in csv_reader.records() {
            let row = row?;
            let main_path = clean_cell(row.get(main_idx).unwrap_or_default());
            let file_path = clean_cell(row.get(file_idx).unwrap_or_default());

            let full_path = normalize(&Path::new(main_path).join(file_path));
            debug!("Registered log file {}", full_path.display());
            paths.push(full_path);
        }

        if paths.is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "{} lists no log files",
                origin.display()
            )));
        }

        Ok(Self { paths })
    }

    /// Paths in table order
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn into_paths(self) -> Vec<PathBuf> {
        self.paths
    }
}

fn column_index(headers: &csv::StringRecord, column: &str, origin: &Path) -> Result<usize, ConfigError> {
    headers
        .iter()
        .position(|header| header.trim_start_matches('\u{feff}') == column)
        .ok_or_else(|| ConfigError::MissingColumn {
            path: origin.to_path_buf(),
            column: column.to_string(),
        })
}

/// Strip surrounding whitespace, then surrounding double quotes
fn clean_cell(cell: &str) -> &str {
    cell.trim().trim_matches('"')
}

/// Lexically normalize a path: drop `.`, resolve `..` against prior components
pub fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match normalized.components().next_back() {
                Some(Component::Normal(_)) => {
                    normalized.pop();
                }
                // Cannot climb above the root
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => normalized.push(".."),
            },
            other => normalized.push(other.as_os_str()),
        }
    }

    if normalized.as_os_str().is_empty() {
        normalized.push(".");
    }
    normalized
}
