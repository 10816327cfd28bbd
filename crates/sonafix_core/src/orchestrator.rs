//! Run orchestration: fetch, dedup, dispatch, seal.
//!
//! One run fetches newly-introduced issues, derives a fingerprint per
//! issue, drops within-run duplicates, and feeds the rest through a
//! pool of workers that each drive the per-issue pipeline. Worker-count
//! changes affect throughput only; every per-issue outcome is the same
//! whether the pool has one worker or many.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::clients::{ContextProvider, ScannerClient};
use crate::config::RunConfig;
use crate::error::CoreResult;
use crate::feedback::FeedbackAggregator;
use crate::fingerprint::Fingerprint;
use crate::issue::Issue;
use crate::pipeline::IssuePipeline;
use crate::report::{IssueResult, RunReport};
use crate::retry::retry_transient;
use crate::work_item::{SkipReason, WorkItem};

/// Coordinates one remediation run end to end.
pub struct Orchestrator {
    scanner: Arc<dyn ScannerClient>,
    context: Arc<dyn ContextProvider>,
    pipeline: IssuePipeline,
    feedback: Arc<FeedbackAggregator>,
    config: RunConfig,
}

impl Orchestrator {
    pub fn new(
        scanner: Arc<dyn ScannerClient>,
        context: Arc<dyn ContextProvider>,
        pipeline: IssuePipeline,
        feedback: Arc<FeedbackAggregator>,
        config: RunConfig,
    ) -> Self {
        Self {
            scanner,
            context,
            pipeline,
            feedback,
            config,
        }
    }

    /// Execute one run over issues introduced since the given instant.
    ///
    /// Fatal errors (bad configuration, failed authentication) abort
    /// before dispatch; everything after dispatch is recorded per item
    /// and never fails the run as a whole.
    pub async fn run_once(
        &self,
        since: DateTime<Utc>,
        cancel: CancelToken,
    ) -> CoreResult<RunReport> {
        self.config.validate()?;
        info!(
            "Fetching up to {} issues introduced since {}",
            self.config.max_issues, since
        );
        let issues = retry_transient(&self.config.retry, "fetch issues", || {
            self.scanner.fetch_new_issues(since, self.config.max_issues)
        })
        .await?;
        self.process_issues(issues, cancel).await
    }

    /// Execute one run over an already-fetched issue sequence.
    pub async fn process_issues(
        &self,
        mut issues: Vec<Issue>,
        cancel: CancelToken,
    ) -> CoreResult<RunReport> {
        self.config.validate()?;
        let run_id = uuid::Uuid::new_v4();
        let started_at = Utc::now();
        issues.truncate(self.config.max_issues);
        let issues_found = issues.len();
        info!("Run {}: {} issues to process", run_id, issues_found);

        let items = self.fingerprint_all(issues).await;
        let (dispatchable, skipped) = dedup(items);

        let mut results: Vec<IssueResult> =
            skipped.iter().map(IssueResult::from_item).collect();
        results.extend(self.dispatch(dispatchable, &cancel).await);
        results.sort_by(|a, b| a.issue_key.cmp(&b.issue_key));

        let report = RunReport {
            run_id,
            started_at,
            completed_at: Utc::now(),
            issues_found,
            cancelled: cancel.is_cancelled(),
            results,
        };
        self.seed_feedback(&report).await;
        info!(
            "Run {} sealed: {} done, {} failed, {} skipped",
            run_id,
            report.succeeded(),
            report.failed(),
            report.skipped()
        );
        Ok(report)
    }

    /// Derive a fingerprint per issue, prefetching the code context so
    /// whitespace-shifted duplicates collapse onto the same key. When
    /// the context cannot be fetched the weaker location-based
    /// fingerprint is used and the item is still dispatched, so the
    /// analyze stage records the real failure.
    async fn fingerprint_all(&self, issues: Vec<Issue>) -> Vec<WorkItem> {
        let mut items = Vec::with_capacity(issues.len());
        for issue in issues {
            let fetched = self
                .context
                .get_context(
                    &issue.file_path,
                    issue.line,
                    self.config.context_before,
                    self.config.context_after,
                )
                .await;
            let (fingerprint, context) = match fetched {
                Ok(ctx) => (Fingerprint::from_snippet(&issue.rule, &ctx.snippet), Some(ctx)),
                Err(e) => {
                    debug!(
                        "Context prefetch for {} failed ({}); using location fingerprint",
                        issue.key, e
                    );
                    (
                        Fingerprint::from_location(&issue.rule, &issue.file_path, issue.line),
                        None,
                    )
                }
            };
            let mut item = WorkItem::new(issue, fingerprint);
            item.context = context;
            items.push(item);
        }
        items
    }

    /// Feed items through the worker pool and collect terminal results.
    async fn dispatch(&self, items: Vec<WorkItem>, cancel: &CancelToken) -> Vec<IssueResult> {
        if items.is_empty() {
            return Vec::new();
        }
        let workers = self.config.workers.min(items.len());
        debug!("Dispatching {} items across {} workers", items.len(), workers);

        let (work_tx, work_rx) = mpsc::channel::<WorkItem>(items.len());
        let work_rx = Arc::new(Mutex::new(work_rx));
        let (done_tx, mut done_rx) = mpsc::channel::<WorkItem>(items.len());

        for _ in 0..workers {
            let work_rx = work_rx.clone();
            let done_tx = done_tx.clone();
            let pipeline = self.pipeline.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                loop {
                    let next = { work_rx.lock().await.recv().await };
                    let Some(mut item) = next else { break };
                    let item = if cancel.is_cancelled() {
                        item.skip(SkipReason::Cancelled);
                        item
                    } else {
                        pipeline.process(item, &cancel).await
                    };
                    if done_tx.send(item).await.is_err() {
                        break;
                    }
                }
            });
        }
        drop(done_tx);

        for item in items {
            // Channel capacity covers every item, so sends cannot block.
            if work_tx.send(item).await.is_err() {
                break;
            }
        }
        drop(work_tx);

        let mut results = Vec::new();
        while let Some(item) = done_rx.recv().await {
            results.push(IssueResult::from_item(&item));
        }
        results
    }

    /// Seed one pending feedback record per completed fix. Failures are
    /// logged, never fatal: the run already happened.
    async fn seed_feedback(&self, report: &RunReport) {
        for seed in report.feedback_seeds() {
            let key = seed.issue_key.clone();
            if let Err(e) = self.feedback.record(seed).await {
                warn!("Failed to seed feedback for {}: {}", key, e);
            }
        }
    }
}

/// Partition items into the first occurrence per fingerprint and the
/// within-run duplicates, which are skipped pointing at the kept key.
fn dedup(items: Vec<WorkItem>) -> (Vec<WorkItem>, Vec<WorkItem>) {
    let mut first_key: HashMap<Fingerprint, String> = HashMap::new();
    let mut dispatchable = Vec::new();
    let mut skipped = Vec::new();
    for mut item in items {
        match first_key.get(&item.fingerprint) {
            Some(of) => {
                debug!("{} duplicates {} within this run", item.issue.key, of);
                item.skip(SkipReason::Duplicate { of: of.clone() });
                skipped.push(item);
            }
            None => {
                first_key.insert(item.fingerprint.clone(), item.issue.key.clone());
                dispatchable.push(item);
            }
        }
    }
    (dispatchable, skipped)
}
