//! Collaborator interfaces consumed by the core.
//!
//! These traits are the narrow boundary to everything the engine does
//! not own: the scanner, the repository content, the fix-generating
//! model, version control and the pull-request forge. Implementations
//! live in `sonafix_adapters`; tests substitute mocks.
//!
//! All implementations must be `Send + Sync`, since workers call them
//! concurrently through `Arc<dyn ...>`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::CoreResult;
use crate::issue::Issue;
use crate::memory::FixAttempt;
use crate::strategy::FixStrategy;
use crate::work_item::{CodeContext, FixPatch, PrRef};

/// Everything the fix generator needs to produce a candidate patch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixRequest {
    pub issue: Issue,
    pub context: CodeContext,
    /// Classified strategy for this finding.
    pub strategy: FixStrategy,
    /// All eligible strategies, best-weighted first. Advisory ordering;
    /// a generator may still pick any of them.
    pub candidates: Vec<FixStrategy>,
    /// Historical attempts for this fingerprint, most recent last.
    pub memory_hints: Vec<FixAttempt>,
    /// Per-strategy feedback weights for the issue's rule.
    pub feedback_weights: HashMap<FixStrategy, f64>,
}

/// A generated candidate fix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixProposal {
    pub patch: FixPatch,
    /// Strategy the generator actually followed.
    pub strategy: FixStrategy,
    pub explanation: String,
    /// Generator confidence in the fix (0..=1).
    pub confidence: f64,
}

/// Request to open a pull request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequestSpec {
    pub source_branch: String,
    pub target_branch: String,
    pub title: String,
    pub body: String,
}

/// Fetches newly-introduced issues from the code-quality scanner.
///
/// Fails with `Network`/`RateLimited` (retryable) or `Auth` (fatal to
/// the run).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ScannerClient: Send + Sync {
    async fn fetch_new_issues(&self, since: DateTime<Utc>, max: usize) -> CoreResult<Vec<Issue>>;
}

/// Retrieves the source snippet around a finding.
///
/// Fails with `ContextMissing` when the file or lines do not exist.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContextProvider: Send + Sync {
    async fn get_context(
        &self,
        path: &str,
        line: u32,
        before: usize,
        after: usize,
    ) -> CoreResult<CodeContext>;
}

/// Produces a candidate patch for a work item.
///
/// Fails with `RateLimited` (retryable) or `Refused` (policy,
/// non-retryable).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FixGenerator: Send + Sync {
    async fn generate_fix(&self, request: &FixRequest) -> CoreResult<FixProposal>;
}

/// Version-control operations over the target repository.
///
/// The working copy used for a branch must be exclusive to the work
/// item owning that branch; concurrent workers never share a mutable
/// checkout. Fails with `Conflict` (non-retryable) or `Network`
/// (retryable).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VcsClient: Send + Sync {
    /// Create the fix branch off the given base ref.
    async fn create_branch(&self, branch: &str, base: &str) -> CoreResult<()>;
    /// Apply the patch in the branch's working copy and commit it.
    async fn apply_and_commit(&self, branch: &str, patch: &FixPatch, message: &str)
        -> CoreResult<()>;
    /// Push the branch to the remote.
    async fn push(&self, branch: &str) -> CoreResult<()>;
}

/// Pull-request forge operations.
///
/// Opening a PR that already exists for the branch is idempotent: the
/// implementation returns the existing reference. Fails with `Network`
/// (retryable).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PrClient: Send + Sync {
    async fn open_pull_request(&self, spec: &PullRequestSpec) -> CoreResult<PrRef>;
}
