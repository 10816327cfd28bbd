//! Run-level result aggregation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::feedback::{FeedbackOutcome, FeedbackRecord};
use crate::strategy::FixStrategy;
use crate::work_item::{PrRef, WorkItem, WorkItemStatus};

/// Terminal result of one work item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueResult {
    pub issue_key: String,
    pub rule: String,
    pub file_path: String,
    pub status: WorkItemStatus,
    pub strategy: Option<FixStrategy>,
    pub branch: Option<String>,
    pub pr: Option<PrRef>,
}

impl IssueResult {
    pub fn from_item(item: &WorkItem) -> Self {
        Self {
            issue_key: item.issue.key.clone(),
            rule: item.issue.rule.clone(),
            file_path: item.issue.file_path.clone(),
            status: item.status().clone(),
            strategy: item.strategy,
            branch: item.branch.clone(),
            pr: item.pr.clone(),
        }
    }
}

/// Immutable record of one orchestrator run, sealed once the worker
/// pool drains. Results are recorded independent of completion order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub issues_found: usize,
    pub cancelled: bool,
    pub results: Vec<IssueResult>,
}

impl RunReport {
    pub fn succeeded(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.status, WorkItemStatus::Done))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.status, WorkItemStatus::Failed { .. }))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.status, WorkItemStatus::Skipped(_)))
            .count()
    }

    pub fn duration(&self) -> chrono::Duration {
        self.completed_at - self.started_at
    }

    /// Seed one pending feedback record per completed fix. The verdict
    /// stays `Unknown` until an external signal confirms or reverts it.
    pub fn feedback_seeds(&self) -> Vec<FeedbackRecord> {
        self.results
            .iter()
            .filter(|r| matches!(r.status, WorkItemStatus::Done))
            .filter_map(|r| {
                Some(FeedbackRecord {
                    issue_key: r.issue_key.clone(),
                    rule: r.rule.clone(),
                    strategy: r.strategy?,
                    outcome: FeedbackOutcome::Unknown,
                    annotation: None,
                    recorded_at: self.completed_at,
                })
            })
            .collect()
    }
}
