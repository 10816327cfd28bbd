//! Post-hoc feedback on fixes and per-rule strategy weights.
//!
//! Verdicts on past fixes (accepted, reverted, re-flagged) accumulate
//! per (rule, strategy) pair; `weights_for` folds them into a decaying
//! average where recent outcomes weigh more. Weights are advisory: the
//! fixer treats them as a soft bias on strategy ordering, never a hard
//! constraint.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::error::{CoreResult, FixerError};
use crate::strategy::FixStrategy;

/// Observed (or pending) verdict on a past fix.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackOutcome {
    /// Fix merged and kept.
    Accepted,
    /// Fix was reverted.
    Reverted,
    /// Scanner re-flagged the same issue after the fix.
    Reflagged,
    /// Seeded after a run; awaiting external confirmation.
    Unknown,
}

impl FeedbackOutcome {
    /// Score used by the decaying average. `Unknown` records carry no
    /// signal and are skipped during aggregation.
    fn score(&self) -> Option<f64> {
        match self {
            FeedbackOutcome::Accepted => Some(1.0),
            FeedbackOutcome::Reverted | FeedbackOutcome::Reflagged => Some(0.0),
            FeedbackOutcome::Unknown => None,
        }
    }
}

/// One feedback verdict on a fix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub issue_key: String,
    pub rule: String,
    pub strategy: FixStrategy,
    pub outcome: FeedbackOutcome,
    /// Optional human annotation.
    pub annotation: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// Aggregate statistics over all feedback.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedbackStats {
    pub total: usize,
    pub positive: usize,
    pub negative: usize,
    pub pending: usize,
    pub positive_rate: f64,
}

/// Smoothing factor of the decaying average: each newer outcome
/// contributes this share of the updated weight.
const DECAY_ALPHA: f64 = 0.3;

/// Neutral weight for a (rule, strategy) pair with no recorded signal.
pub const NEUTRAL_WEIGHT: f64 = 0.5;

type Records = HashMap<String, Arc<Mutex<Vec<FeedbackRecord>>>>;

/// Collects feedback verdicts and derives per-rule strategy weights.
pub struct FeedbackAggregator {
    path: Option<PathBuf>,
    /// Records keyed by rule, so workers recording feedback for
    /// different rules never contend.
    records: RwLock<Records>,
    /// Serializes snapshot+write so concurrent records for different
    /// rules cannot overwrite each other's persisted state.
    persist_lock: Mutex<()>,
}

impl FeedbackAggregator {
    /// In-memory aggregator, nothing persisted.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            records: RwLock::new(HashMap::new()),
            persist_lock: Mutex::new(()),
        }
    }

    /// Open an aggregator backed by a JSON file.
    pub fn open(path: impl AsRef<Path>) -> CoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut records: Records = HashMap::new();
        if path.exists() {
            let content = fs::read_to_string(&path)?;
            let raw: Vec<FeedbackRecord> = serde_json::from_str(&content)
                .map_err(|e| FixerError::Serialization(e.to_string()))?;
            let count = raw.len();
            let mut grouped: HashMap<String, Vec<FeedbackRecord>> = HashMap::new();
            for record in raw {
                grouped.entry(record.rule.clone()).or_default().push(record);
            }
            for (rule, list) in grouped {
                records.insert(rule, Arc::new(Mutex::new(list)));
            }
            info!("Loaded {} feedback records from {}", count, path.display());
        }
        Ok(Self {
            path: Some(path),
            records: RwLock::new(records),
            persist_lock: Mutex::new(()),
        })
    }

    /// Record a feedback verdict.
    pub async fn record(&self, record: FeedbackRecord) -> CoreResult<()> {
        let entry = {
            let records = self.records.read().await;
            records.get(&record.rule).cloned()
        };
        let entry = match entry {
            Some(e) => e,
            None => {
                let mut records = self.records.write().await;
                records
                    .entry(record.rule.clone())
                    .or_insert_with(|| Arc::new(Mutex::new(Vec::new())))
                    .clone()
            }
        };

        {
            let mut list = entry.lock().await;
            debug!(
                "Recorded {:?} feedback for {} ({} for rule {})",
                record.outcome,
                record.issue_key,
                list.len() + 1,
                record.rule
            );
            list.push(record);
        }

        self.persist().await
    }

    /// Per-strategy adjustment weights for a rule, in `0.0..=1.0`.
    ///
    /// Strategies without signal sit at [`NEUTRAL_WEIGHT`]. Each
    /// recorded outcome folds in chronologically, so recent verdicts
    /// dominate and additional negative outcomes only lower the weight.
    pub async fn weights_for(&self, rule: &str) -> HashMap<FixStrategy, f64> {
        let entry = {
            let records = self.records.read().await;
            records.get(rule).cloned()
        };
        let mut weights: HashMap<FixStrategy, f64> =
            FixStrategy::ALL.iter().map(|s| (*s, NEUTRAL_WEIGHT)).collect();
        let Some(entry) = entry else {
            return weights;
        };

        let mut sorted = entry.lock().await.clone();
        sorted.sort_by_key(|r| r.recorded_at);
        for record in &sorted {
            if let Some(score) = record.outcome.score() {
                let w = weights.entry(record.strategy).or_insert(NEUTRAL_WEIGHT);
                *w = (1.0 - DECAY_ALPHA) * *w + DECAY_ALPHA * score;
            }
        }
        weights
    }

    /// Aggregate statistics over all recorded feedback.
    pub async fn stats(&self) -> FeedbackStats {
        let mut stats = FeedbackStats::default();
        let records = self.records.read().await;
        for entry in records.values() {
            for record in entry.lock().await.iter() {
                stats.total += 1;
                match record.outcome {
                    FeedbackOutcome::Accepted => stats.positive += 1,
                    FeedbackOutcome::Reverted | FeedbackOutcome::Reflagged => stats.negative += 1,
                    FeedbackOutcome::Unknown => stats.pending += 1,
                }
            }
        }
        let decided = stats.positive + stats.negative;
        if decided > 0 {
            stats.positive_rate = stats.positive as f64 / decided as f64;
        }
        stats
    }

    async fn persist(&self) -> CoreResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        // Lock before snapshotting, so a stale snapshot can never land
        // after a newer one and drop an acknowledged record.
        let _guard = self.persist_lock.lock().await;
        let mut all = Vec::new();
        {
            let records = self.records.read().await;
            for entry in records.values() {
                all.extend(entry.lock().await.iter().cloned());
            }
        }
        all.sort_by_key(|r| r.recorded_at);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&all)
            .map_err(|e| FixerError::Serialization(e.to_string()))?;
        // Write-then-rename keeps the file whole for concurrent readers.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(rule: &str, strategy: FixStrategy, outcome: FeedbackOutcome) -> FeedbackRecord {
        FeedbackRecord {
            issue_key: "SONAR-1".into(),
            rule: rule.into(),
            strategy,
            outcome,
            annotation: None,
            recorded_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_unseen_rule_gets_neutral_weights() {
        let agg = FeedbackAggregator::in_memory();
        let weights = agg.weights_for("S1135").await;
        assert_eq!(weights.len(), FixStrategy::ALL.len());
        for w in weights.values() {
            assert!((w - NEUTRAL_WEIGHT).abs() < f64::EPSILON);
        }
    }

    #[tokio::test]
    async fn test_weights_monotonically_decrease_with_negative_outcomes() {
        let agg = FeedbackAggregator::in_memory();
        let mut previous = agg.weights_for("S1135").await[&FixStrategy::ResolveTodo];
        for _ in 0..5 {
            agg.record(record("S1135", FixStrategy::ResolveTodo, FeedbackOutcome::Reverted))
                .await
                .unwrap();
            let current = agg.weights_for("S1135").await[&FixStrategy::ResolveTodo];
            assert!(current < previous);
            previous = current;
        }
    }

    #[tokio::test]
    async fn test_recent_outcomes_weigh_more() {
        // Same multiset of outcomes, different order: the series ending
        // in acceptance must score higher.
        let ends_accepted = FeedbackAggregator::in_memory();
        for outcome in [FeedbackOutcome::Reverted, FeedbackOutcome::Accepted] {
            ends_accepted
                .record(record("S1135", FixStrategy::ResolveTodo, outcome))
                .await
                .unwrap();
        }
        let ends_reverted = FeedbackAggregator::in_memory();
        for outcome in [FeedbackOutcome::Accepted, FeedbackOutcome::Reverted] {
            ends_reverted
                .record(record("S1135", FixStrategy::ResolveTodo, outcome))
                .await
                .unwrap();
        }
        let up = ends_accepted.weights_for("S1135").await[&FixStrategy::ResolveTodo];
        let down = ends_reverted.weights_for("S1135").await[&FixStrategy::ResolveTodo];
        assert!(up > down);
    }

    #[tokio::test]
    async fn test_pending_records_carry_no_signal() {
        let agg = FeedbackAggregator::in_memory();
        agg.record(record("S1135", FixStrategy::ResolveTodo, FeedbackOutcome::Unknown))
            .await
            .unwrap();
        let weights = agg.weights_for("S1135").await;
        assert!((weights[&FixStrategy::ResolveTodo] - NEUTRAL_WEIGHT).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_poor_history_never_forecloses_a_strategy() {
        let agg = FeedbackAggregator::in_memory();
        for _ in 0..50 {
            agg.record(record("S1135", FixStrategy::ResolveTodo, FeedbackOutcome::Reverted))
                .await
                .unwrap();
        }
        let weights = agg.weights_for("S1135").await;
        // Deprioritized, but still present and non-negative.
        assert!(weights.contains_key(&FixStrategy::ResolveTodo));
        assert!(weights[&FixStrategy::ResolveTodo] >= 0.0);
    }

    #[tokio::test]
    async fn test_concurrent_records_all_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("feedback.json");
        {
            let agg = Arc::new(FeedbackAggregator::open(&path).unwrap());
            let mut handles = Vec::new();
            for i in 0..16 {
                let agg = agg.clone();
                handles.push(tokio::spawn(async move {
                    let mut verdict =
                        record(&format!("S{}", 1000 + i), FixStrategy::ResolveTodo, FeedbackOutcome::Accepted);
                    verdict.issue_key = format!("SONAR-{}", i);
                    agg.record(verdict).await.unwrap();
                }));
            }
            for handle in handles {
                handle.await.unwrap();
            }
        }

        let reopened = FeedbackAggregator::open(&path).unwrap();
        assert_eq!(reopened.stats().await.total, 16);
    }

    #[tokio::test]
    async fn test_persistence_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("feedback.json");
        {
            let agg = FeedbackAggregator::open(&path).unwrap();
            agg.record(record("S1135", FixStrategy::ResolveTodo, FeedbackOutcome::Accepted))
                .await
                .unwrap();
        }
        let reopened = FeedbackAggregator::open(&path).unwrap();
        let stats = reopened.stats().await;
        assert_eq!(stats.total, 1);
        assert_eq!(stats.positive, 1);
    }
}
