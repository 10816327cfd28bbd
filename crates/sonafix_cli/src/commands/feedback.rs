//! Feedback command - record and inspect reviewer verdicts.

use std::path::PathBuf;

use anyhow::{bail, Result};
use chrono::Utc;
use clap::{Args, Subcommand};

use sonafix_core::{FeedbackAggregator, FeedbackOutcome, FeedbackRecord, FixStrategy};

#[derive(Args)]
pub struct FeedbackArgs {
    /// Directory holding memory and feedback state
    #[arg(long, default_value = ".sonafix", global = true)]
    state_dir: PathBuf,

    #[command(subcommand)]
    command: FeedbackCommand,
}

#[derive(Subcommand)]
enum FeedbackCommand {
    /// Record a verdict on a past fix
    Record(RecordArgs),

    /// Show aggregate feedback statistics
    Stats,
}

#[derive(Args)]
struct RecordArgs {
    /// Issue key the fix addressed
    #[arg(long)]
    issue_key: String,

    /// Rule the issue violated
    #[arg(long)]
    rule: String,

    /// Strategy the fix followed (resolve_todo, remove_dead_code, ...)
    #[arg(long)]
    strategy: String,

    /// Verdict: accepted, reverted or reflagged
    #[arg(long)]
    outcome: String,

    /// Optional annotation explaining the verdict
    #[arg(long)]
    note: Option<String>,
}

pub async fn execute(args: FeedbackArgs) -> Result<()> {
    let aggregator = FeedbackAggregator::open(args.state_dir.join("feedback.json"))?;
    match args.command {
        FeedbackCommand::Record(record) => {
            let strategy = parse_strategy(&record.strategy)?;
            let outcome = parse_outcome(&record.outcome)?;
            aggregator
                .record(FeedbackRecord {
                    issue_key: record.issue_key.clone(),
                    rule: record.rule,
                    strategy,
                    outcome,
                    annotation: record.note,
                    recorded_at: Utc::now(),
                })
                .await?;
            println!("✅ Recorded {} feedback for {}", record.outcome, record.issue_key);
        }
        FeedbackCommand::Stats => {
            let stats = aggregator.stats().await;
            println!("🗳️  Reviewer feedback");
            println!("  Total records: {}", stats.total);
            println!("  Positive:      {}", stats.positive);
            println!("  Negative:      {}", stats.negative);
            println!("  Pending:       {}", stats.pending);
            if stats.positive + stats.negative > 0 {
                println!("  Positive rate: {:.0}%", stats.positive_rate * 100.0);
            }
        }
    }
    Ok(())
}

fn parse_strategy(raw: &str) -> Result<FixStrategy> {
    match FixStrategy::ALL.iter().find(|s| s.as_str() == raw) {
        Some(strategy) => Ok(*strategy),
        None => {
            let known: Vec<&str> = FixStrategy::ALL.iter().map(|s| s.as_str()).collect();
            bail!("unknown strategy '{}' (expected one of: {})", raw, known.join(", "))
        }
    }
}

fn parse_outcome(raw: &str) -> Result<FeedbackOutcome> {
    match raw {
        "accepted" => Ok(FeedbackOutcome::Accepted),
        "reverted" => Ok(FeedbackOutcome::Reverted),
        "reflagged" => Ok(FeedbackOutcome::Reflagged),
        _ => bail!("unknown outcome '{}' (expected accepted, reverted or reflagged)", raw),
    }
}
