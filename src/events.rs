//! Core record type for detected errors
//!
//! An [`ErrorRecord`] is created once per accepted log line and is immutable
//! afterwards. Its JSON form is what gets echoed to stdout at detection time.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Timestamp type for detected records (wall-clock local time)
pub type Timestamp = DateTime<Local>;

/// A single detected error line
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorRecord {
    /// When the line was detected
    #[serde(rename = "date", with = "local_timestamp")]
    pub timestamp: Timestamp,
    /// File the line was read from
    #[serde(rename = "log_file")]
    pub source_path: PathBuf,
    /// The line, trimmed of surrounding whitespace
    #[serde(rename = "error_message")]
    pub message: String,
}

impl ErrorRecord {
    /// Create a record stamped with the current local time
    pub fn new(source_path: &Path, line: &str) -> Self {
        Self::at(Local::now(), source_path, line)
    }

    /// Create a record with an explicit detection time
    pub fn at(timestamp: Timestamp, source_path: &Path, line: &str) -> Self {
        Self {
            timestamp,
            source_path: source_path.to_path_buf(),
            message: line.trim().to_string(),
        }
    }

    /// Detection time in the `YYYY-MM-DD HH:MM:SS` form used on the wire
    pub fn formatted_timestamp(&self) -> String {
        self.timestamp.format(local_timestamp::FORMAT).to_string()
    }
}

mod local_timestamp {
    use super::Timestamp;
    use chrono::{Local, NaiveDateTime, TimeZone};
    use serde::{Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    pub fn serialize<S: Serializer>(timestamp: &Timestamp, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&timestamp.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Timestamp, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let naive = NaiveDateTime::parse_from_str(&raw, FORMAT).map_err(serde::de::Error::custom)?;
        Local
            .from_local_datetime(&naive)
            .earliest()
            .ok_or_else(|| serde::de::Error::custom(format!("nonexistent local time: {}", raw)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_time() -> Timestamp {
        Local.with_ymd_and_hms(2024, 6, 1, 14, 30, 5).unwrap()
    }

    #[test]
    fn test_message_is_trimmed() {
        let record = ErrorRecord::at(
            fixed_time(),
            Path::new("/var/log/app.log"),
            "  2024-06-01 ERROR disk full \r\n",
        );
        assert_eq!(record.message, "2024-06-01 ERROR disk full");
        assert_eq!(record.source_path, PathBuf::from("/var/log/app.log"));
    }

    #[test]
    fn test_json_field_names() {
        let record = ErrorRecord::at(fixed_time(), Path::new("/var/log/app.log"), "ERROR x");
        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(value["date"], "2024-06-01 14:30:05");
        assert_eq!(value["log_file"], "/var/log/app.log");
        assert_eq!(value["error_message"], "ERROR x");
        assert_eq!(value.as_object().unwrap().len(), 3);
    }

    #[test]
    fn test_json_deserialization_restores_record() {
        let record = ErrorRecord::at(fixed_time(), Path::new("a.log"), "Error: boom");
        let json = serde_json::to_string(&record).unwrap();
        let parsed: ErrorRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn test_rejects_malformed_date() {
        let json = r#"{"date": "yesterday", "log_file": "a.log", "error_message": "x"}"#;
        assert!(serde_json::from_str::<ErrorRecord>(json).is_err());
    }

    #[test]
    fn test_formatted_timestamp() {
        let record = ErrorRecord::at(fixed_time(), Path::new("a.log"), "x");
        assert_eq!(record.formatted_timestamp(), "2024-06-01 14:30:05");
    }
}
