//! Scanner issue model.
//!
//! An [`Issue`] is a single static-analysis finding as reported by the
//! scanner. It is immutable once fetched; everything mutable about
//! processing it lives on the [`crate::work_item::WorkItem`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Issue severity as reported by the scanner.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Minor,
    Major,
    Critical,
    Blocker,
}

impl Severity {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "blocker" => Self::Blocker,
            "critical" => Self::Critical,
            "major" => Self::Major,
            "minor" => Self::Minor,
            _ => Self::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Minor => "minor",
            Self::Major => "major",
            Self::Critical => "critical",
            Self::Blocker => "blocker",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single static-analysis finding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Issue {
    /// Scanner-assigned key, stable across runs.
    pub key: String,
    /// Rule identifier that was violated (e.g. `S1135`).
    pub rule: String,
    /// Severity reported by the scanner.
    pub severity: Severity,
    /// Path of the affected file, relative to the repository root.
    pub file_path: String,
    /// First affected line (1-based).
    pub line: u32,
    /// Last affected line, when the finding spans a range.
    pub end_line: Option<u32>,
    /// Human-readable description of the finding.
    pub message: String,
    /// When the issue was introduced.
    pub created_at: DateTime<Utc>,
}

impl Issue {
    /// Inclusive line range of the finding.
    pub fn line_range(&self) -> (u32, u32) {
        (self.line, self.end_line.unwrap_or(self.line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_from_str() {
        assert_eq!(Severity::from_str("BLOCKER"), Severity::Blocker);
        assert_eq!(Severity::from_str("minor"), Severity::Minor);
        assert_eq!(Severity::from_str("weird"), Severity::Info);
    }

    #[test]
    fn test_line_range_defaults_to_single_line() {
        let issue = Issue {
            key: "SONAR-123".into(),
            rule: "S1135".into(),
            severity: Severity::Minor,
            file_path: "a.py".into(),
            line: 10,
            end_line: Some(12),
            message: "Complete the task associated to this TODO comment.".into(),
            created_at: Utc::now(),
        };
        assert_eq!(issue.line_range(), (10, 12));

        let single = Issue { end_line: None, ..issue };
        assert_eq!(single.line_range(), (10, 10));
    }
}
