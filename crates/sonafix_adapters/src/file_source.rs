//! File-backed issue source.
//!
//! Reads issues from a JSON file instead of a live scanner. Used for
//! offline runs and demos, and to replay a captured set of findings
//! deterministically.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use sonafix_core::{CoreResult, FixerError, Issue, ScannerClient};

/// `ScannerClient` reading a JSON array of issues from disk.
pub struct FileIssueSource {
    path: PathBuf,
}

impl FileIssueSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ScannerClient for FileIssueSource {
    async fn fetch_new_issues(&self, since: DateTime<Utc>, max: usize) -> CoreResult<Vec<Issue>> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        let mut issues: Vec<Issue> = serde_json::from_str(&content)
            .map_err(|e| FixerError::Serialization(format!("issue file: {}", e)))?;
        issues.retain(|issue| issue.created_at > since);
        // Newest first, like the live scanner.
        issues.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        issues.truncate(max);
        debug!("Loaded {} issues from {}", issues.len(), self.path.display());
        Ok(issues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use sonafix_core::Severity;
    use std::fs;
    use tempfile::TempDir;

    fn issue(key: &str, created_at: DateTime<Utc>) -> Issue {
        Issue {
            key: key.into(),
            rule: "S1135".into(),
            severity: Severity::Minor,
            file_path: "a.py".into(),
            line: 10,
            end_line: None,
            message: "Complete the task associated to this TODO comment.".into(),
            created_at,
        }
    }

    #[tokio::test]
    async fn test_filters_by_age_and_sorts_newest_first() {
        let now = Utc::now();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("issues.json");
        let issues = vec![
            issue("OLD-1", now - Duration::days(10)),
            issue("NEW-1", now - Duration::hours(2)),
            issue("NEW-2", now - Duration::hours(1)),
        ];
        fs::write(&path, serde_json::to_string(&issues).unwrap()).unwrap();

        let source = FileIssueSource::new(&path);
        let fetched = source
            .fetch_new_issues(now - Duration::days(1), 10)
            .await
            .unwrap();
        assert_eq!(fetched.len(), 2);
        assert_eq!(fetched[0].key, "NEW-2");
        assert_eq!(fetched[1].key, "NEW-1");
    }

    #[tokio::test]
    async fn test_truncates_to_max() {
        let now = Utc::now();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("issues.json");
        let issues: Vec<Issue> = (0..10)
            .map(|i| issue(&format!("I-{}", i), now - Duration::minutes(i)))
            .collect();
        fs::write(&path, serde_json::to_string(&issues).unwrap()).unwrap();

        let source = FileIssueSource::new(&path);
        let fetched = source
            .fetch_new_issues(now - Duration::days(1), 3)
            .await
            .unwrap();
        assert_eq!(fetched.len(), 3);
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let source = FileIssueSource::new("/nonexistent/issues.json");
        let err = source.fetch_new_issues(Utc::now(), 10).await.unwrap_err();
        assert!(matches!(err, FixerError::Io(_)));
    }
}
