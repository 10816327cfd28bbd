//! Memory-stats command - inspect cross-run fix-attempt history.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use sonafix_core::MemoryStore;

#[derive(Args)]
pub struct MemoryStatsArgs {
    /// Directory holding memory and feedback state
    #[arg(long, default_value = ".sonafix")]
    state_dir: PathBuf,
}

pub async fn execute(args: MemoryStatsArgs) -> Result<()> {
    let store = MemoryStore::open(args.state_dir.join("memory.json"))?;
    let stats = store.stats().await;

    println!("📚 Fix-attempt memory");
    println!("  Total attempts:      {}", stats.total_attempts);
    println!("  Successful attempts: {}", stats.successful_attempts);
    println!("  Success rate:        {:.0}%", stats.success_rate * 100.0);

    if !stats.rules.is_empty() {
        println!("  By rule:");
        let mut rules: Vec<_> = stats.rules.iter().collect();
        rules.sort_by(|a, b| b.1.total.cmp(&a.1.total).then(a.0.cmp(b.0)));
        for (rule, rule_stats) in rules {
            println!(
                "    {:<16} {:>3} attempts, {:>3} successful",
                rule, rule_stats.total, rule_stats.successful
            );
        }
    }
    Ok(())
}
