//! CLI command definitions.
//!
//! Each subcommand maps to one operation of the remediation engine:
//! running a fix cycle, inspecting cross-run memory, and recording or
//! inspecting reviewer feedback.

use clap::{Parser, Subcommand};

pub mod feedback;
pub mod memory_stats;
pub mod run;

/// sonafix - automated static-analysis remediation
#[derive(Parser)]
#[command(name = "sonafix")]
#[command(version, about = "sonafix - turns scanner findings into reviewed pull requests")]
#[command(long_about = r#"
sonafix fetches newly-introduced static-analysis issues, generates a
candidate fix per issue, commits each fix to its own branch and opens a
pull request for human review. Fix attempts are remembered across runs
and reviewer feedback reweighs fix strategies per rule.

COMMANDS:
  run           → Fetch issues and process them into pull requests
  memory-stats  → Show cross-run fix-attempt statistics
  feedback      → Record or inspect reviewer verdicts on past fixes

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments
  3 - Fatal run error (configuration, authentication)
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one remediation cycle
    Run(run::RunArgs),

    /// Show cross-run memory statistics
    #[command(name = "memory-stats")]
    MemoryStats(memory_stats::MemoryStatsArgs),

    /// Record or inspect reviewer feedback
    Feedback(feedback::FeedbackArgs),
}
