use chrono::{Local, NaiveDate};

/// Tokens that mark a line as an error. Matched as plain substrings.
pub const ERROR_TOKENS: [&str; 3] = ["ERROR", "error", "Error"];

/// Decides whether a log line is a same-day error
///
/// A line qualifies when it contains one of [`ERROR_TOKENS`] and today's date
/// formatted `YYYY-MM-DD`. Both checks are literal substring tests: a line
/// without an embedded date in that exact form is always rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorDetector;

impl ErrorDetector {
    pub fn new() -> Self {
        Self
    }

    /// Check a line against the signature using the current local date
    pub fn is_error(&self, line: &str) -> bool {
        self.is_error_on(line, Local::now().date_naive())
    }

    /// Check a line against the signature using an explicit "today"
    pub fn is_error_on(&self, line: &str, today: NaiveDate) -> bool {
        Self::matches_signature(line) && Self::is_fresh(line, today)
    }

    /// Signature test only: any of the three casings as a substring
    pub fn matches_signature(line: &str) -> bool {
        ERROR_TOKENS.iter().any(|token| line.contains(token))
    }

    /// Freshness test only: today's `YYYY-MM-DD` as a substring
    pub fn is_fresh(line: &str, today: NaiveDate) -> bool {
        line.contains(&today.format("%Y-%m-%d").to_string())
    }
}
