//! Deterministic heuristic fix generator.
//!
//! Covers the remediations that are safe to perform without a model:
//! deleting flagged regions that consist purely of comments (stale
//! TODO/FIXME markers, commented-out code). Anything beyond that is
//! refused rather than guessed, so the failure is recorded as a policy
//! refusal and never retried.

use async_trait::async_trait;
use tracing::debug;

use sonafix_core::{
    CoreResult, FixGenerator, FixPatch, FixProposal, FixRequest, FixStrategy, FixerError,
};

const COMMENT_MARKERS: [&str; 5] = ["#", "//", "--", "/*", "*"];

/// Fix generator handling comment-only deletions.
pub struct HeuristicFixGenerator;

impl HeuristicFixGenerator {
    pub fn new() -> Self {
        Self
    }
}

impl Default for HeuristicFixGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FixGenerator for HeuristicFixGenerator {
    async fn generate_fix(&self, request: &FixRequest) -> CoreResult<FixProposal> {
        let (start, end) = request.issue.line_range();
        let region = request.context.region(start, end).ok_or_else(|| {
            FixerError::ContextMissing {
                path: request.issue.file_path.clone(),
                line: request.issue.line,
            }
        })?;

        let deletion_applies = request
            .candidates
            .iter()
            .any(|s| matches!(s, FixStrategy::ResolveTodo | FixStrategy::RemoveDeadCode));
        if !deletion_applies || !is_comment_only(&region) {
            return Err(FixerError::Refused(format!(
                "no deterministic remediation for rule {} at {}:{}",
                request.issue.rule, request.issue.file_path, request.issue.line
            )));
        }

        let strategy = if region.to_lowercase().contains("todo")
            || region.to_lowercase().contains("fixme")
        {
            FixStrategy::ResolveTodo
        } else {
            FixStrategy::RemoveDeadCode
        };
        debug!(
            "Deleting comment-only region {}:{}-{} ({})",
            request.issue.file_path, start, end, strategy
        );

        Ok(FixProposal {
            patch: FixPatch {
                file_path: request.issue.file_path.clone(),
                start_line: start,
                end_line: end,
                original: region,
                replacement: String::new(),
            },
            strategy,
            explanation: format!(
                "Removed the comment-only region at lines {}-{} flagged by {}.",
                start, end, request.issue.rule
            ),
            confidence: 0.8,
        })
    }
}

fn is_comment_only(region: &str) -> bool {
    region.lines().all(|line| {
        let trimmed = line.trim();
        !trimmed.is_empty() && COMMENT_MARKERS.iter().any(|m| trimmed.starts_with(m))
    })
}
