//! Per-issue stage pipeline.
//!
//! One [`IssuePipeline`] instance drives a single [`WorkItem`] through
//! `analyze → fix → commit → open_pr`, retrying Transient failures
//! within each stage and marking the item `failed` with the stage and
//! error class on any terminal error. The pipeline never panics on a
//! bad item; every outcome is encoded in the returned item's status.

use std::sync::Arc;
use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use tracing::{info, warn};

use crate::cancel::CancelToken;
use crate::clients::{FixProposal, VcsClient};
use crate::config::RetryPolicy;
use crate::error::{CoreResult, ErrorClass};
use crate::issue::Issue;
use crate::memory::{AttemptOutcome, FixAttempt, MemoryStore};
use crate::retry::retry_transient;
use crate::strategy::FixStrategy;
use crate::work_item::{CodeContext, PrRef, Stage, WorkItem, WorkItemStatus};

/// Output of the analyze stage.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub context: CodeContext,
    pub strategy: FixStrategy,
}

/// Analyzes a work item: extracts context and classifies a strategy.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AnalyzerAgent: Send + Sync {
    async fn analyze(&self, item: &WorkItem) -> CoreResult<Analysis>;
}

/// Produces a candidate fix for an analyzed work item.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FixerAgent: Send + Sync {
    async fn propose(&self, item: &WorkItem) -> CoreResult<FixProposal>;
}

/// Publishes a committed fix branch as a pull request.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PrAgent: Send + Sync {
    async fn publish(&self, item: &WorkItem) -> CoreResult<PrRef>;
}

/// Branch name for an issue's fix, derived from its key. Unique per
/// issue, which also gives each branch an exclusive working copy.
pub fn branch_for(issue: &Issue) -> String {
    static UNSAFE_CHARS: OnceLock<Regex> = OnceLock::new();
    let re = UNSAFE_CHARS
        .get_or_init(|| Regex::new(r"[^a-z0-9._-]+").expect("valid branch pattern"));
    let lowered = issue.key.to_lowercase();
    let key = re.replace_all(&lowered, "-");
    format!("fix/{}", key.trim_matches('-'))
}

/// Commit message for an issue's fix.
pub fn commit_message(issue: &Issue) -> String {
    format!("Fix {} ({}): {}", issue.key, issue.rule, issue.message)
}

/// Drives one work item through the stage chain.
///
/// Cheap to clone; workers each hold a clone and process items they
/// exclusively own.
#[derive(Clone)]
pub struct IssuePipeline {
    analyzer: Arc<dyn AnalyzerAgent>,
    fixer: Arc<dyn FixerAgent>,
    vcs: Arc<dyn VcsClient>,
    pr: Arc<dyn PrAgent>,
    memory: Arc<MemoryStore>,
    retry: RetryPolicy,
    target_branch: String,
}

impl IssuePipeline {
    pub fn new(
        analyzer: Arc<dyn AnalyzerAgent>,
        fixer: Arc<dyn FixerAgent>,
        vcs: Arc<dyn VcsClient>,
        pr: Arc<dyn PrAgent>,
        memory: Arc<MemoryStore>,
        retry: RetryPolicy,
        target_branch: impl Into<String>,
    ) -> Self {
        Self {
            analyzer,
            fixer,
            vcs,
            pr,
            memory,
            retry,
            target_branch: target_branch.into(),
        }
    }

    /// Process the item to a terminal status. Stage boundaries check
    /// the cancel token; an in-flight item interrupted by cancellation
    /// fails at the stage it would have entered next.
    pub async fn process(&self, mut item: WorkItem, cancel: &CancelToken) -> WorkItem {
        let stages = [
            (Stage::Analyze, WorkItemStatus::Analyzed),
            (Stage::Fix, WorkItemStatus::Fixed),
            (Stage::Commit, WorkItemStatus::Committed),
            (Stage::OpenPr, WorkItemStatus::PrCreated),
        ];

        for (stage, next) in stages {
            if cancel.is_cancelled() {
                item.fail(stage, ErrorClass::Fatal, "run cancelled");
                return item;
            }
            let outcome = match stage {
                Stage::Analyze => self.analyze(&mut item).await,
                Stage::Fix => self.fix(&mut item).await,
                Stage::Commit => self.commit(&mut item).await,
                Stage::OpenPr => self.open_pr(&mut item).await,
            };
            match outcome {
                Ok(()) => {
                    // advance only fails on rank regression, which the
                    // fixed stage order rules out
                    if let Err(e) = item.advance(next) {
                        item.fail(stage, e.class(), e.to_string());
                        return item;
                    }
                }
                Err(e) => {
                    warn!("{} failed at {}: {}", item.issue.key, stage, e);
                    item.fail(stage, e.class(), e.to_string());
                    return item;
                }
            }
        }

        if let Err(e) = item.advance(WorkItemStatus::Done) {
            item.fail(Stage::OpenPr, e.class(), e.to_string());
            return item;
        }
        info!(
            "{} done: {}",
            item.issue.key,
            item.pr.as_ref().map(|p| p.url.as_str()).unwrap_or("-")
        );
        self.remember(&item).await;
        item
    }

    async fn analyze(&self, item: &mut WorkItem) -> CoreResult<()> {
        let analysis =
            retry_transient(&self.retry, "analyze", || self.analyzer.analyze(item)).await?;
        item.context = Some(analysis.context);
        item.strategy = Some(analysis.strategy);
        Ok(())
    }

    async fn fix(&self, item: &mut WorkItem) -> CoreResult<()> {
        let proposal = retry_transient(&self.retry, "fix", || self.fixer.propose(item)).await?;
        item.strategy = Some(proposal.strategy);
        item.patch = Some(proposal.patch);
        item.explanation = Some(proposal.explanation);
        item.confidence = Some(proposal.confidence);
        Ok(())
    }

    async fn commit(&self, item: &mut WorkItem) -> CoreResult<()> {
        let branch = branch_for(&item.issue);
        let patch = item.patch.clone().ok_or_else(|| {
            crate::error::FixerError::Serialization(format!(
                "no patch on {} at commit stage",
                item.issue.key
            ))
        })?;
        let message = commit_message(&item.issue);

        retry_transient(&self.retry, "create branch", || {
            self.vcs.create_branch(&branch, &self.target_branch)
        })
        .await?;
        retry_transient(&self.retry, "commit", || {
            self.vcs.apply_and_commit(&branch, &patch, &message)
        })
        .await?;

        item.branch = Some(branch);
        Ok(())
    }

    async fn open_pr(&self, item: &mut WorkItem) -> CoreResult<()> {
        let branch = item.branch.clone().ok_or_else(|| {
            crate::error::FixerError::Serialization(format!(
                "no branch on {} at open-pr stage",
                item.issue.key
            ))
        })?;
        retry_transient(&self.retry, "push", || self.vcs.push(&branch)).await?;
        let pr = retry_transient(&self.retry, "open pr", || self.pr.publish(item)).await?;
        item.pr = Some(pr);
        Ok(())
    }

    /// Record the completed fix in cross-run memory. Persistence
    /// failures here do not fail the already-completed item.
    async fn remember(&self, item: &WorkItem) {
        let Some(strategy) = item.strategy else {
            return;
        };
        let summary = item
            .explanation
            .as_deref()
            .and_then(|e| e.lines().next())
            .unwrap_or("applied fix")
            .to_string();
        let attempt = FixAttempt {
            issue_key: item.issue.key.clone(),
            rule: item.issue.rule.clone(),
            strategy,
            patch_summary: summary,
            outcome: AttemptOutcome::SuccessPendingReview,
            confidence: item.confidence.unwrap_or(0.0),
            recorded_at: chrono::Utc::now(),
        };
        if let Err(e) = self.memory.append(&item.fingerprint, attempt).await {
            warn!("Failed to record memory for {}: {}", item.issue.key, e);
        }
    }
}
