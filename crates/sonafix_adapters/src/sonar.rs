//! SonarQube scanner client.
//!
//! Fetches unresolved issues introduced after a given instant from the
//! `api/issues/search` endpoint, newest first, walking pages of 100
//! until the requested maximum is reached or the server runs out.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

use sonafix_core::{CoreResult, FixerError, Issue, ScannerClient, Severity};

const PAGE_SIZE: usize = 100;

/// Connection settings for a SonarQube server.
#[derive(Debug, Clone)]
pub struct SonarConfig {
    /// Base URL, e.g. `https://sonar.example.com`.
    pub base_url: String,
    /// User token, sent as a bearer token.
    pub token: String,
    /// Project key whose issues are fetched.
    pub project_key: String,
}

/// `ScannerClient` backed by the SonarQube REST API.
pub struct SonarScanner {
    config: SonarConfig,
    agent: ureq::Agent,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    total: usize,
    issues: Vec<RawIssue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawIssue {
    key: String,
    rule: String,
    severity: String,
    /// `projectKey:path/to/file`.
    component: String,
    line: Option<u32>,
    text_range: Option<RawTextRange>,
    message: String,
    /// Sonar formats this as `2024-05-01T10:00:00+0000`, which is not
    /// RFC 3339; parsed explicitly in [`parse_creation_date`].
    creation_date: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTextRange {
    end_line: u32,
}

impl SonarScanner {
    pub fn new(config: SonarConfig) -> Self {
        Self {
            config,
            agent: ureq::AgentBuilder::new().build(),
        }
    }

    fn fetch_page(&self, since: DateTime<Utc>, page: usize) -> CoreResult<SearchResponse> {
        let url = format!("{}/api/issues/search", self.config.base_url.trim_end_matches('/'));
        let response = self
            .agent
            .get(&url)
            .set("Authorization", &format!("Bearer {}", self.config.token))
            .query("componentKeys", &self.config.project_key)
            .query("resolved", "false")
            .query("createdAfter", &since.to_rfc3339())
            .query("s", "CREATION_DATE")
            .query("asc", "false")
            .query("ps", &PAGE_SIZE.to_string())
            .query("p", &page.to_string())
            .call()
            .map_err(classify_http_error)?;
        response
            .into_json::<SearchResponse>()
            .map_err(|e| FixerError::Serialization(format!("issue search response: {}", e)))
    }
}

#[async_trait]
impl ScannerClient for SonarScanner {
    async fn fetch_new_issues(&self, since: DateTime<Utc>, max: usize) -> CoreResult<Vec<Issue>> {
        let config = self.config.clone();
        let agent = self.agent.clone();
        tokio::task::spawn_blocking(move || {
            let scanner = SonarScanner { config, agent };
            let mut issues = Vec::new();
            let mut page = 1;
            loop {
                let response = scanner.fetch_page(since, page)?;
                let fetched = response.issues.len();
                issues.extend(response.issues.into_iter().filter_map(convert_issue));
                debug!(
                    "Fetched page {}: {} raw issues, {} usable so far",
                    page,
                    fetched,
                    issues.len()
                );
                if issues.len() >= max || page * PAGE_SIZE >= response.total || fetched == 0 {
                    break;
                }
                page += 1;
            }
            issues.truncate(max);
            Ok(issues)
        })
        .await
        .map_err(|e| FixerError::Network(format!("issue fetch task failed: {}", e)))?
    }
}

/// Issues without a line (file-level findings) have no code region to
/// patch and are dropped here.
fn convert_issue(raw: RawIssue) -> Option<Issue> {
    let line = raw.line?;
    let file_path = raw
        .component
        .split_once(':')
        .map(|(_, path)| path.to_string())
        .unwrap_or(raw.component);
    Some(Issue {
        key: raw.key,
        rule: raw.rule,
        severity: parse_severity(&raw.severity),
        file_path,
        line,
        end_line: raw.text_range.map(|r| r.end_line),
        message: raw.message,
        created_at: parse_creation_date(&raw.creation_date),
    })
}

fn parse_severity(raw: &str) -> Severity {
    Severity::from_str(raw)
}

fn parse_creation_date(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%z")
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn classify_http_error(err: ureq::Error) -> FixerError {
    match err {
        ureq::Error::Status(401, _) | ureq::Error::Status(403, _) => {
            FixerError::Auth("scanner rejected the token".into())
        }
        ureq::Error::Status(429, _) => FixerError::RateLimited("scanner throttled request".into()),
        ureq::Error::Status(code, _) => {
            FixerError::Network(format!("scanner returned HTTP {}", code))
        }
        ureq::Error::Transport(t) => FixerError::Network(t.to_string()),
    }
}
