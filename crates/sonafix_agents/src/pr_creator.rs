//! Pull-request creator agent.
//!
//! Builds a deterministic title and markdown body out of the work
//! item's accumulated state and opens the pull request through the
//! forge client. Pushing the branch is the pipeline's job; by the time
//! `publish` runs the branch already exists on the remote.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use sonafix_core::{
    CoreResult, FixerError, PrAgent, PrClient, PrRef, PullRequestSpec, WorkItem,
};

const TITLE_MESSAGE_LIMIT: usize = 72;

/// PR agent rendering and opening pull requests for fix branches.
pub struct PrCreator {
    client: Arc<dyn PrClient>,
    target_branch: String,
}

impl PrCreator {
    pub fn new(client: Arc<dyn PrClient>, target_branch: impl Into<String>) -> Self {
        Self {
            client,
            target_branch: target_branch.into(),
        }
    }

    fn title(item: &WorkItem) -> String {
        let mut message: String = item.issue.message.chars().take(TITLE_MESSAGE_LIMIT).collect();
        if message.len() < item.issue.message.len() {
            message.push('…');
        }
        format!("Fix {}: {}", item.issue.key, message)
    }

    fn body(&self, item: &WorkItem) -> String {
        let mut body = String::new();
        body.push_str(&format!(
            "Automated fix for scanner issue `{}`.\n\n",
            item.issue.key
        ));
        body.push_str(&format!("- **Rule**: {}\n", item.issue.rule));
        body.push_str(&format!("- **Severity**: {}\n", item.issue.severity));
        body.push_str(&format!(
            "- **Location**: `{}:{}`\n",
            item.issue.file_path, item.issue.line
        ));
        if let Some(strategy) = item.strategy {
            body.push_str(&format!("- **Strategy**: {}\n", strategy));
        }
        if let Some(confidence) = item.confidence {
            body.push_str(&format!("- **Confidence**: {:.0}%\n", confidence * 100.0));
        }
        body.push_str(&format!("\n> {}\n", item.issue.message));
        if let Some(explanation) = &item.explanation {
            body.push_str(&format!("\n### What changed\n\n{}\n", explanation));
        }
        body.push_str("\nPlease review before merging.\n");
        body
    }
}

#[async_trait]
impl PrAgent for PrCreator {
    async fn publish(&self, item: &WorkItem) -> CoreResult<PrRef> {
        let branch = item.branch.clone().ok_or_else(|| {
            FixerError::Serialization(format!("no branch on {} at publish", item.issue.key))
        })?;
        let spec = PullRequestSpec {
            source_branch: branch,
            target_branch: self.target_branch.clone(),
            title: Self::title(item),
            body: self.body(item),
        };
        let pr = self.client.open_pull_request(&spec).await?;
        info!("Opened PR #{} for {}: {}", pr.id, item.issue.key, pr.url);
        Ok(pr)
    }
}
