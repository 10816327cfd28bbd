//! Per-issue unit of pipeline state.
//!
//! A [`WorkItem`] wraps one [`Issue`] plus everything the pipeline
//! accumulates while processing it. Its status walks the chain
//! `pending → analyzed → fixed → committed → pr_created → done`, with
//! the terminal `failed` reachable from any non-terminal state and
//! `skipped` assigned before dispatch (duplicate fingerprint or run
//! cancellation). A status never regresses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreResult, ErrorClass, FixerError};
use crate::fingerprint::Fingerprint;
use crate::issue::Issue;
use crate::strategy::FixStrategy;

/// Source snippet surrounding a finding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CodeContext {
    pub file_path: String,
    /// Line the finding points at (1-based).
    pub target_line: u32,
    /// First line included in the snippet (1-based, inclusive).
    pub start_line: u32,
    /// Last line included in the snippet (1-based, inclusive).
    pub end_line: u32,
    /// The snippet text, exactly as read from the file.
    pub snippet: String,
}

impl CodeContext {
    /// Extract the given 1-based inclusive line range out of the
    /// snippet, or `None` when the range falls outside it.
    pub fn region(&self, start: u32, end: u32) -> Option<String> {
        if start < self.start_line || end > self.end_line || start > end {
            return None;
        }
        let skip = (start - self.start_line) as usize;
        let take = (end - start + 1) as usize;
        let lines: Vec<&str> = self.snippet.lines().skip(skip).take(take).collect();
        if lines.len() < take {
            return None;
        }
        Some(lines.join("\n"))
    }
}

/// A candidate patch replacing a contiguous region of one file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FixPatch {
    pub file_path: String,
    /// First replaced line (1-based, inclusive).
    pub start_line: u32,
    /// Last replaced line (1-based, inclusive).
    pub end_line: u32,
    /// Content the patch expects at the region. Checked before apply.
    pub original: String,
    /// Replacement content.
    pub replacement: String,
}

impl FixPatch {
    /// Structural precondition: the patch must match the content it
    /// replaces, modulo trailing newline.
    pub fn applies_to(&self, current: &str) -> bool {
        self.original.trim_end_matches('\n') == current.trim_end_matches('\n')
    }
}

/// Reference to an opened pull request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PrRef {
    pub id: u64,
    pub url: String,
}

/// Pipeline stage identifiers, used in failure reporting and retries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Analyze,
    Fix,
    Commit,
    OpenPr,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Analyze => "analyze",
            Stage::Fix => "fix",
            Stage::Commit => "commit",
            Stage::OpenPr => "open_pr",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why an item was skipped before dispatch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "reason")]
pub enum SkipReason {
    /// Another issue with the same fingerprint was processed this run.
    Duplicate { of: String },
    /// The run was cancelled before the item was dispatched.
    Cancelled,
}

/// Work item status along the pipeline state chain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum WorkItemStatus {
    Pending,
    Analyzed,
    Fixed,
    Committed,
    PrCreated,
    Done,
    Failed {
        stage: Stage,
        class: String,
        error: String,
    },
    Skipped(SkipReason),
}

impl WorkItemStatus {
    /// Position along the happy-path chain; terminal failure/skip have
    /// no rank and are handled separately.
    fn rank(&self) -> Option<u8> {
        match self {
            WorkItemStatus::Pending => Some(0),
            WorkItemStatus::Analyzed => Some(1),
            WorkItemStatus::Fixed => Some(2),
            WorkItemStatus::Committed => Some(3),
            WorkItemStatus::PrCreated => Some(4),
            WorkItemStatus::Done => Some(5),
            WorkItemStatus::Failed { .. } | WorkItemStatus::Skipped(_) => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WorkItemStatus::Done | WorkItemStatus::Failed { .. } | WorkItemStatus::Skipped(_)
        )
    }

    pub fn label(&self) -> String {
        match self {
            WorkItemStatus::Pending => "pending".into(),
            WorkItemStatus::Analyzed => "analyzed".into(),
            WorkItemStatus::Fixed => "fixed".into(),
            WorkItemStatus::Committed => "committed".into(),
            WorkItemStatus::PrCreated => "pr_created".into(),
            WorkItemStatus::Done => "done".into(),
            WorkItemStatus::Failed { stage, .. } => format!("failed:{}", stage),
            WorkItemStatus::Skipped(SkipReason::Duplicate { .. }) => "skipped:duplicate".into(),
            WorkItemStatus::Skipped(SkipReason::Cancelled) => "skipped:cancelled".into(),
        }
    }
}

impl std::fmt::Display for WorkItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// The mutable per-issue unit of pipeline state.
///
/// Owned exclusively by the pipeline instance processing it; never
/// shared across workers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItem {
    pub issue: Issue,
    pub fingerprint: Fingerprint,
    /// Context snippet, set by the analyze stage (or prefetched during
    /// the orchestrator's fingerprint pass).
    pub context: Option<CodeContext>,
    /// Classified fix strategy, set by the analyze stage.
    pub strategy: Option<FixStrategy>,
    /// Candidate patch, set by the fix stage.
    pub patch: Option<FixPatch>,
    /// Explanation of the fix, set by the fix stage.
    pub explanation: Option<String>,
    /// Generator confidence in the fix (0..=1), set by the fix stage.
    pub confidence: Option<f64>,
    /// Fix branch, set by the commit stage.
    pub branch: Option<String>,
    /// Opened pull request, set by the open-pr stage.
    pub pr: Option<PrRef>,
    status: WorkItemStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl WorkItem {
    pub fn new(issue: Issue, fingerprint: Fingerprint) -> Self {
        Self {
            issue,
            fingerprint,
            context: None,
            strategy: None,
            patch: None,
            explanation: None,
            confidence: None,
            branch: None,
            pr: None,
            status: WorkItemStatus::Pending,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn status(&self) -> &WorkItemStatus {
        &self.status
    }

    /// Advance along the happy path. The target must be strictly later
    /// in the chain than the current status.
    pub fn advance(&mut self, next: WorkItemStatus) -> CoreResult<()> {
        let current_rank = self.status.rank().ok_or_else(|| {
            FixerError::Serialization(format!(
                "work item {} is terminal ({}) and cannot advance",
                self.issue.key, self.status
            ))
        })?;
        match next.rank() {
            Some(next_rank) if next_rank > current_rank => {
                if next == WorkItemStatus::Done {
                    self.finished_at = Some(Utc::now());
                }
                self.status = next;
                Ok(())
            }
            _ => Err(FixerError::Serialization(format!(
                "invalid status transition for {}: {} -> {}",
                self.issue.key, self.status, next
            ))),
        }
    }

    /// Mark the item failed at a stage. Allowed from any non-terminal
    /// state; completed earlier stages are not rolled back.
    pub fn fail(&mut self, stage: Stage, class: ErrorClass, error: impl Into<String>) {
        if self.status.is_terminal() {
            return;
        }
        self.status = WorkItemStatus::Failed {
            stage,
            class: class.as_str().to_string(),
            error: error.into(),
        };
        self.finished_at = Some(Utc::now());
    }

    /// Mark the item skipped before dispatch.
    pub fn skip(&mut self, reason: SkipReason) {
        if self.status.is_terminal() {
            return;
        }
        self.status = WorkItemStatus::Skipped(reason);
        self.finished_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issue::Severity;

    fn test_issue() -> Issue {
        Issue {
            key: "SONAR-123".into(),
            rule: "S1135".into(),
            severity: Severity::Minor,
            file_path: "a.py".into(),
            line: 10,
            end_line: Some(12),
            message: "Complete the task associated to this TODO comment.".into(),
            created_at: Utc::now(),
        }
    }

    fn test_item() -> WorkItem {
        let issue = test_issue();
        let fp = Fingerprint::from_location(&issue.rule, &issue.file_path, issue.line);
        WorkItem::new(issue, fp)
    }

    #[test]
    fn test_happy_path_walk() {
        let mut item = test_item();
        for next in [
            WorkItemStatus::Analyzed,
            WorkItemStatus::Fixed,
            WorkItemStatus::Committed,
            WorkItemStatus::PrCreated,
            WorkItemStatus::Done,
        ] {
            item.advance(next).unwrap();
        }
        assert_eq!(item.status(), &WorkItemStatus::Done);
        assert!(item.finished_at.is_some());
    }

    #[test]
    fn test_status_never_regresses() {
        let mut item = test_item();
        item.advance(WorkItemStatus::Fixed).unwrap();
        assert!(item.advance(WorkItemStatus::Analyzed).is_err());
        assert!(item.advance(WorkItemStatus::Fixed).is_err());
        assert_eq!(item.status(), &WorkItemStatus::Fixed);
    }

    #[test]
    fn test_failed_is_terminal_from_any_stage() {
        let mut item = test_item();
        item.advance(WorkItemStatus::Analyzed).unwrap();
        item.fail(Stage::Fix, ErrorClass::Transient, "rate limited");
        assert!(item.status().is_terminal());
        assert!(item.advance(WorkItemStatus::Fixed).is_err());
        assert_eq!(item.status().label(), "failed:fix");
    }

    #[test]
    fn test_skip_reason_labels() {
        let mut dup = test_item();
        dup.skip(SkipReason::Duplicate { of: "SONAR-122".into() });
        assert_eq!(dup.status().label(), "skipped:duplicate");

        let mut cancelled = test_item();
        cancelled.skip(SkipReason::Cancelled);
        assert_eq!(cancelled.status().label(), "skipped:cancelled");
    }

    #[test]
    fn test_context_region_extraction() {
        let context = CodeContext {
            file_path: "a.py".into(),
            target_line: 10,
            start_line: 9,
            end_line: 11,
            snippet: "x = 1\n# TODO: remove\ny = 2\n".into(),
        };
        assert_eq!(context.region(10, 10).as_deref(), Some("# TODO: remove"));
        assert_eq!(context.region(9, 11).as_deref(), Some("x = 1\n# TODO: remove\ny = 2"));
        assert!(context.region(8, 10).is_none());
        assert!(context.region(10, 12).is_none());
        assert!(context.region(11, 10).is_none());
    }

    #[test]
    fn test_patch_precondition_ignores_trailing_newline() {
        let patch = FixPatch {
            file_path: "a.py".into(),
            start_line: 1,
            end_line: 1,
            original: "x = 1\n".into(),
            replacement: "x = 2\n".into(),
        };
        assert!(patch.applies_to("x = 1"));
        assert!(!patch.applies_to("x = 3"));
    }
}
