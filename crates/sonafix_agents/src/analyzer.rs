//! Issue analyzer agent.
//!
//! The analyzer turns a raw finding into an analyzed work item: the
//! code context around the flagged line plus a classified fix strategy.
//! When the orchestrator already prefetched the context during
//! fingerprinting, the analyzer reuses it instead of reading the file
//! again.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use sonafix_core::{
    Analysis, AnalyzerAgent, ContextProvider, CoreResult, FixStrategy, WorkItem,
};

/// Deterministic analyzer: context extraction plus rule classification.
pub struct IssueAnalyzer {
    context: Arc<dyn ContextProvider>,
    before: usize,
    after: usize,
}

impl IssueAnalyzer {
    pub fn new(context: Arc<dyn ContextProvider>, before: usize, after: usize) -> Self {
        Self {
            context,
            before,
            after,
        }
    }
}

#[async_trait]
impl AnalyzerAgent for IssueAnalyzer {
    async fn analyze(&self, item: &WorkItem) -> CoreResult<Analysis> {
        let context = match &item.context {
            Some(ctx) => ctx.clone(),
            None => {
                self.context
                    .get_context(
                        &item.issue.file_path,
                        item.issue.line,
                        self.before,
                        self.after,
                    )
                    .await?
            }
        };
        let strategy = FixStrategy::classify(&item.issue.rule, &item.issue.message);
        debug!(
            "Analyzed {}: {} lines of context, strategy {}",
            item.issue.key,
            context.end_line - context.start_line + 1,
            strategy
        );
        Ok(Analysis { context, strategy })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sonafix_core::{CodeContext, Fingerprint, FixerError, Issue, Severity};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubContextProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ContextProvider for StubContextProvider {
        async fn get_context(
            &self,
            path: &str,
            line: u32,
            before: usize,
            after: usize,
        ) -> CoreResult<CodeContext> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if path == "gone.py" {
                return Err(FixerError::ContextMissing {
                    path: path.into(),
                    line,
                });
            }
            Ok(CodeContext {
                file_path: path.into(),
                target_line: line,
                start_line: line.saturating_sub(before as u32).max(1),
                end_line: line + after as u32,
                snippet: "# TODO: fetched\n".into(),
            })
        }
    }

    fn item(path: &str) -> WorkItem {
        let issue = Issue {
            key: "SONAR-1".into(),
            rule: "S1135".into(),
            severity: Severity::Minor,
            file_path: path.into(),
            line: 10,
            end_line: None,
            message: "Complete the task associated to this TODO comment.".into(),
            created_at: Utc::now(),
        };
        let fp = Fingerprint::from_location(&issue.rule, &issue.file_path, issue.line);
        WorkItem::new(issue, fp)
    }

    #[tokio::test]
    async fn test_reuses_prefetched_context() {
        let provider = Arc::new(StubContextProvider {
            calls: AtomicUsize::new(0),
        });
        let analyzer = IssueAnalyzer::new(provider.clone(), 10, 10);
        let mut item = item("a.py");
        item.context = Some(CodeContext {
            file_path: "a.py".into(),
            target_line: 10,
            start_line: 5,
            end_line: 15,
            snippet: "# TODO: prefetched\n".into(),
        });

        let analysis = analyzer.analyze(&item).await.unwrap();
        assert_eq!(analysis.context.snippet, "# TODO: prefetched\n");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fetches_when_no_context_cached() {
        let provider = Arc::new(StubContextProvider {
            calls: AtomicUsize::new(0),
        });
        let analyzer = IssueAnalyzer::new(provider.clone(), 10, 10);

        let analysis = analyzer.analyze(&item("a.py")).await.unwrap();
        assert_eq!(analysis.context.snippet, "# TODO: fetched\n");
        assert_eq!(analysis.strategy, FixStrategy::ResolveTodo);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_context_propagates() {
        let provider = Arc::new(StubContextProvider {
            calls: AtomicUsize::new(0),
        });
        let analyzer = IssueAnalyzer::new(provider, 10, 10);

        let err = analyzer.analyze(&item("gone.py")).await.unwrap_err();
        assert!(matches!(err, FixerError::ContextMissing { .. }));
    }
}
