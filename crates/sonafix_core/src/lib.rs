//! # sonafix_core
//!
//! Core remediation engine for sonafix.
//!
//! This crate provides the orchestration, per-issue pipeline, cross-run
//! memory and feedback aggregation that turn scanner findings into
//! reviewed pull requests.
//!
//! # Architecture
//!
//! - **Orchestrator**: Fetches issues, dedups by fingerprint, dispatches
//!   work items across a worker pool and seals a run report
//! - **Pipeline**: Drives one work item through analyze → fix → commit →
//!   open-pr with per-stage retry of transient failures
//! - **Memory**: Append-only fingerprint → fix-attempt history surviving
//!   across runs
//! - **Feedback**: Post-hoc verdicts folded into per-rule strategy
//!   weights
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use sonafix_core::{
//!     CancelToken, FeedbackAggregator, IssuePipeline, MemoryStore,
//!     Orchestrator, RunConfig,
//! };
//!
//! let memory = Arc::new(MemoryStore::open(".sonafix/memory.json")?);
//! let feedback = Arc::new(FeedbackAggregator::open(".sonafix/feedback.json")?);
//! let config = RunConfig::default();
//!
//! let pipeline = IssuePipeline::new(
//!     analyzer, fixer, vcs, pr_agent,
//!     memory, config.retry.clone(), config.target_branch.clone(),
//! );
//! let orchestrator = Orchestrator::new(scanner, context, pipeline, feedback, config);
//!
//! let report = orchestrator.run_once(since, CancelToken::new()).await?;
//! println!("{} fixed, {} failed", report.succeeded(), report.failed());
//! ```

pub mod cancel;
pub mod clients;
pub mod config;
pub mod error;
pub mod feedback;
pub mod fingerprint;
pub mod issue;
pub mod memory;
pub mod orchestrator;
pub mod pipeline;
pub mod report;
pub mod retry;
pub mod strategy;
pub mod work_item;

// Re-export main types for convenience
pub use cancel::CancelToken;
pub use clients::{
    ContextProvider, FixGenerator, FixProposal, FixRequest, PrClient, PullRequestSpec,
    ScannerClient, VcsClient,
};
pub use config::{Backoff, RetryPolicy, RunConfig};
pub use error::{CoreResult, ErrorClass, FixerError};
pub use feedback::{
    FeedbackAggregator, FeedbackOutcome, FeedbackRecord, FeedbackStats, NEUTRAL_WEIGHT,
};
pub use fingerprint::Fingerprint;
pub use issue::{Issue, Severity};
pub use memory::{AttemptOutcome, FixAttempt, MemoryStats, MemoryStore, RuleStats};
pub use orchestrator::Orchestrator;
pub use pipeline::{
    branch_for, commit_message, Analysis, AnalyzerAgent, FixerAgent, IssuePipeline, PrAgent,
};
pub use report::{IssueResult, RunReport};
pub use retry::retry_transient;
pub use strategy::FixStrategy;
pub use work_item::{
    CodeContext, FixPatch, PrRef, SkipReason, Stage, WorkItem, WorkItemStatus,
};
