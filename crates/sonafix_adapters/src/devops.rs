//! Azure DevOps pull-request client.
//!
//! Opens pull requests through the `git/repositories/.../pullrequests`
//! REST endpoint. Opening a PR for a branch that already has an active
//! one is treated as success: the existing PR is looked up and
//! returned, so a re-run never produces duplicate review threads.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use sonafix_core::{CoreResult, FixerError, PrClient, PrRef, PullRequestSpec};

const API_VERSION: &str = "7.0";

/// Connection settings for an Azure DevOps repository.
#[derive(Debug, Clone)]
pub struct DevOpsConfig {
    /// Service root, e.g. `https://dev.azure.com`.
    pub base_url: String,
    pub organization: String,
    pub project: String,
    pub repository: String,
    /// Access token, sent as a bearer token.
    pub token: String,
}

/// `PrClient` backed by the Azure DevOps REST API.
pub struct DevOpsPrClient {
    config: DevOpsConfig,
    agent: ureq::Agent,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPullRequest {
    pull_request_id: u64,
}

#[derive(Debug, Deserialize)]
struct PullRequestList {
    value: Vec<RawPullRequest>,
}

impl DevOpsPrClient {
    pub fn new(config: DevOpsConfig) -> Self {
        Self {
            config,
            agent: ureq::AgentBuilder::new().build(),
        }
    }

    fn api_url(&self) -> String {
        format!(
            "{}/{}/{}/_apis/git/repositories/{}/pullrequests",
            self.config.base_url.trim_end_matches('/'),
            self.config.organization,
            self.config.project,
            self.config.repository
        )
    }

    fn web_url(&self, id: u64) -> String {
        format!(
            "{}/{}/{}/_git/{}/pullrequest/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.organization,
            self.config.project,
            self.config.repository,
            id
        )
    }

    fn create(&self, spec: &PullRequestSpec) -> CoreResult<u64> {
        let response = self
            .agent
            .post(&self.api_url())
            .set("Authorization", &format!("Bearer {}", self.config.token))
            .query("api-version", API_VERSION)
            .send_json(json!({
                "sourceRefName": format!("refs/heads/{}", spec.source_branch),
                "targetRefName": format!("refs/heads/{}", spec.target_branch),
                "title": spec.title,
                "description": spec.body,
            }))
            .map_err(classify_http_error)?;
        let raw: RawPullRequest = response
            .into_json()
            .map_err(|e| FixerError::Serialization(format!("pull request response: {}", e)))?;
        Ok(raw.pull_request_id)
    }

    /// Look up the active pull request for a source branch, if any.
    fn find_existing(&self, source_branch: &str) -> CoreResult<Option<u64>> {
        let response = self
            .agent
            .get(&self.api_url())
            .set("Authorization", &format!("Bearer {}", self.config.token))
            .query("api-version", API_VERSION)
            .query(
                "searchCriteria.sourceRefName",
                &format!("refs/heads/{}", source_branch),
            )
            .query("searchCriteria.status", "active")
            .call()
            .map_err(classify_http_error)?;
        let list: PullRequestList = response
            .into_json()
            .map_err(|e| FixerError::Serialization(format!("pull request list: {}", e)))?;
        Ok(list.value.first().map(|pr| pr.pull_request_id))
    }
}

#[async_trait]
impl PrClient for DevOpsPrClient {
    async fn open_pull_request(&self, spec: &PullRequestSpec) -> CoreResult<PrRef> {
        let config = self.config.clone();
        let agent = self.agent.clone();
        let spec = spec.clone();
        tokio::task::spawn_blocking(move || {
            let client = DevOpsPrClient { config, agent };
            let id = match client.create(&spec) {
                Ok(id) => {
                    info!("Opened pull request {} for {}", id, spec.source_branch);
                    id
                }
                Err(FixerError::Conflict(_)) => {
                    debug!(
                        "Active pull request already exists for {}, reusing it",
                        spec.source_branch
                    );
                    client
                        .find_existing(&spec.source_branch)?
                        .ok_or_else(|| {
                            FixerError::Conflict(format!(
                                "duplicate pull request for {} reported but not found",
                                spec.source_branch
                            ))
                        })?
                }
                Err(e) => return Err(e),
            };
            Ok(PrRef {
                id,
                url: client.web_url(id),
            })
        })
        .await
        .map_err(|e| FixerError::Network(format!("pull request task failed: {}", e)))?
    }
}

fn classify_http_error(err: ureq::Error) -> FixerError {
    match err {
        ureq::Error::Status(401, _) | ureq::Error::Status(403, _) => {
            FixerError::Auth("forge rejected the token".into())
        }
        ureq::Error::Status(409, _) => {
            FixerError::Conflict("pull request already exists".into())
        }
        ureq::Error::Status(429, _) => FixerError::RateLimited("forge throttled request".into()),
        ureq::Error::Status(code, _) => FixerError::Network(format!("forge returned HTTP {}", code)),
        ureq::Error::Transport(t) => FixerError::Network(t.to_string()),
    }
}
