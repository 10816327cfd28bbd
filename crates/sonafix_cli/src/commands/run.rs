//! Run command - one remediation cycle.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;
use tracing::{info, warn};

use sonafix_adapters::{
    DevOpsConfig, DevOpsPrClient, FileIssueSource, FsContextProvider, GitWorkspace,
    HeuristicFixGenerator, SonarConfig, SonarScanner,
};
use sonafix_agents::{CodeFixer, IssueAnalyzer, PrCreator};
use sonafix_core::{
    Backoff, CancelToken, ContextProvider, FeedbackAggregator, IssuePipeline, MemoryStore,
    Orchestrator, RetryPolicy, RunConfig, RunReport, ScannerClient,
};

#[derive(Args)]
pub struct RunArgs {
    /// Path to the repository checkout to fix
    #[arg(long, default_value = ".")]
    repo: PathBuf,

    /// Branch pull requests target
    #[arg(long, default_value = "master")]
    target_branch: String,

    /// Read issues from a captured JSON file instead of the scanner
    #[arg(long)]
    issues_file: Option<PathBuf>,

    /// SonarQube base URL
    #[arg(long, env = "SONAR_URL")]
    sonar_url: Option<String>,

    /// SonarQube user token
    #[arg(long, env = "SONAR_TOKEN", hide_env_values = true)]
    sonar_token: Option<String>,

    /// SonarQube project key
    #[arg(long, env = "SONAR_PROJECT_KEY")]
    project_key: Option<String>,

    /// Azure DevOps service root
    #[arg(long, env = "DEVOPS_URL", default_value = "https://dev.azure.com")]
    devops_url: String,

    /// Azure DevOps organization
    #[arg(long, env = "DEVOPS_ORG")]
    devops_org: String,

    /// Azure DevOps project
    #[arg(long, env = "DEVOPS_PROJECT")]
    devops_project: String,

    /// Azure DevOps repository
    #[arg(long, env = "DEVOPS_REPO")]
    devops_repo: String,

    /// Azure DevOps access token
    #[arg(long, env = "DEVOPS_TOKEN", hide_env_values = true)]
    devops_token: String,

    /// Maximum issues processed in one run
    #[arg(long, default_value_t = 50)]
    max_issues: usize,

    /// Only fetch issues introduced within the last N days
    #[arg(long, default_value_t = 1)]
    days_lookback: i64,

    /// Worker pool size
    #[arg(long, default_value_t = 5)]
    parallel_workers: usize,

    /// Process issues sequentially (same as --parallel-workers 1)
    #[arg(long, conflicts_with = "parallel_workers")]
    no_parallel: bool,

    /// Retry attempts for transient failures
    #[arg(long, default_value_t = 3)]
    retry_attempts: u32,

    /// Base delay between retries, in seconds
    #[arg(long, default_value_t = 5)]
    retry_delay_secs: u64,

    /// Double the retry delay after each attempt
    #[arg(long)]
    exponential_backoff: bool,

    /// Context lines extracted before a finding
    #[arg(long, default_value_t = 10)]
    context_before: usize,

    /// Context lines extracted after a finding
    #[arg(long, default_value_t = 10)]
    context_after: usize,

    /// Directory holding memory and feedback state
    #[arg(long, default_value = ".sonafix")]
    state_dir: PathBuf,
}

pub async fn execute(args: RunArgs) -> Result<()> {
    let config = RunConfig {
        max_issues: args.max_issues,
        workers: if args.no_parallel { 1 } else { args.parallel_workers },
        retry: RetryPolicy {
            attempts: args.retry_attempts,
            delay: Duration::from_secs(args.retry_delay_secs),
            backoff: if args.exponential_backoff {
                Backoff::Exponential
            } else {
                Backoff::Fixed
            },
        },
        context_before: args.context_before,
        context_after: args.context_after,
        target_branch: args.target_branch.clone(),
    };

    let scanner: Arc<dyn ScannerClient> = match &args.issues_file {
        Some(path) => {
            info!("Reading issues from {}", path.display());
            Arc::new(FileIssueSource::new(path))
        }
        None => {
            let sonar = SonarConfig {
                base_url: args
                    .sonar_url
                    .clone()
                    .context("--sonar-url (or SONAR_URL) is required without --issues-file")?,
                token: args
                    .sonar_token
                    .clone()
                    .context("--sonar-token (or SONAR_TOKEN) is required without --issues-file")?,
                project_key: args.project_key.clone().context(
                    "--project-key (or SONAR_PROJECT_KEY) is required without --issues-file",
                )?,
            };
            Arc::new(SonarScanner::new(sonar))
        }
    };

    let context: Arc<dyn ContextProvider> = Arc::new(FsContextProvider::new(&args.repo));
    let vcs = Arc::new(GitWorkspace::new(&args.repo));
    let pr_client = Arc::new(DevOpsPrClient::new(DevOpsConfig {
        base_url: args.devops_url.clone(),
        organization: args.devops_org.clone(),
        project: args.devops_project.clone(),
        repository: args.devops_repo.clone(),
        token: args.devops_token.clone(),
    }));

    let memory = Arc::new(MemoryStore::open(args.state_dir.join("memory.json"))?);
    let feedback = Arc::new(FeedbackAggregator::open(args.state_dir.join("feedback.json"))?);

    let analyzer = Arc::new(IssueAnalyzer::new(
        context.clone(),
        config.context_before,
        config.context_after,
    ));
    let fixer = Arc::new(CodeFixer::new(
        Arc::new(HeuristicFixGenerator::new()),
        memory.clone(),
        feedback.clone(),
    ));
    let pr_agent = Arc::new(PrCreator::new(pr_client, config.target_branch.clone()));

    let pipeline = IssuePipeline::new(
        analyzer,
        fixer,
        vcs,
        pr_agent,
        memory,
        config.retry.clone(),
        config.target_branch.clone(),
    );
    let orchestrator = Orchestrator::new(scanner, context, pipeline, feedback, config);

    let cancel = CancelToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing in-flight items");
            signal_cancel.cancel();
        }
    });

    let since = Utc::now() - chrono::Duration::days(args.days_lookback);
    let report = orchestrator.run_once(since, cancel).await?;
    print_summary(&report);
    Ok(())
}

fn print_summary(report: &RunReport) {
    println!();
    println!("Run {} ({:.1}s)", report.run_id, report.duration().num_milliseconds() as f64 / 1000.0);
    println!("  Issues found: {}", report.issues_found);
    for result in &report.results {
        let detail = match &result.pr {
            Some(pr) => pr.url.clone(),
            None => result.status.label(),
        };
        println!(
            "  {} {:<12} {} → {}",
            status_marker(&result.status.label()),
            result.issue_key,
            result.rule,
            detail
        );
    }
    println!(
        "  {} done, {} failed, {} skipped{}",
        report.succeeded(),
        report.failed(),
        report.skipped(),
        if report.cancelled { " (cancelled)" } else { "" }
    );
}

fn status_marker(label: &str) -> &'static str {
    if label == "done" {
        "✅"
    } else if label.starts_with("failed") {
        "❌"
    } else {
        "⏭️"
    }
}
