//! Cross-run memory of fix attempts, keyed by fingerprint.
//!
//! The store is append-only: a fingerprint maps to one growing sequence
//! of attempts, most recent last. Reads are snapshots; appends to
//! different fingerprints never block each other, and appends to the
//! same fingerprint are serialized by a per-key lock.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::error::{CoreResult, FixerError};
use crate::fingerprint::Fingerprint;
use crate::strategy::FixStrategy;

/// Outcome of one remembered fix attempt.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// Fix merged into a PR; final verdict not yet observed.
    SuccessPendingReview,
    /// Fix confirmed accepted.
    Success,
    /// Fix was reverted or the issue re-flagged.
    Reverted,
    Unknown,
}

/// One historical fix attempt for a fingerprint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixAttempt {
    pub issue_key: String,
    pub rule: String,
    pub strategy: FixStrategy,
    /// Short human-readable summary of what the patch did.
    pub patch_summary: String,
    pub outcome: AttemptOutcome,
    /// Generator confidence at the time of the fix (0..=1).
    pub confidence: f64,
    pub recorded_at: DateTime<Utc>,
}

/// Per-rule memory statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleStats {
    pub total: usize,
    pub successful: usize,
}

/// Aggregate statistics over the whole store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryStats {
    pub total_attempts: usize,
    pub successful_attempts: usize,
    pub success_rate: f64,
    pub rules: HashMap<String, RuleStats>,
}

type Entries = HashMap<Fingerprint, Arc<Mutex<Vec<FixAttempt>>>>;

/// Durable fingerprint → attempt-history store.
pub struct MemoryStore {
    path: Option<PathBuf>,
    entries: RwLock<Entries>,
    /// Serializes snapshot+write so concurrent appends to different
    /// fingerprints cannot overwrite each other's persisted state.
    persist_lock: Mutex<()>,
}

impl MemoryStore {
    /// In-memory store, nothing persisted. Used by tests and dry runs.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            entries: RwLock::new(HashMap::new()),
            persist_lock: Mutex::new(()),
        }
    }

    /// Open a store backed by a JSON file, loading existing entries.
    /// A missing file yields an empty store.
    pub fn open(path: impl AsRef<Path>) -> CoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut entries: Entries = HashMap::new();
        if path.exists() {
            let content = fs::read_to_string(&path)?;
            let raw: HashMap<String, Vec<FixAttempt>> = serde_json::from_str(&content)
                .map_err(|e| FixerError::Serialization(e.to_string()))?;
            for (fp, attempts) in raw {
                entries.insert(
                    Fingerprint::from_raw(fp),
                    Arc::new(Mutex::new(attempts)),
                );
            }
            info!("Loaded {} memory entries from {}", entries.len(), path.display());
        }
        Ok(Self {
            path: Some(path),
            entries: RwLock::new(entries),
            persist_lock: Mutex::new(()),
        })
    }

    /// Append an attempt to the fingerprint's history.
    pub async fn append(&self, fingerprint: &Fingerprint, attempt: FixAttempt) -> CoreResult<()> {
        let entry = {
            let entries = self.entries.read().await;
            entries.get(fingerprint).cloned()
        };
        let entry = match entry {
            Some(e) => e,
            None => {
                let mut entries = self.entries.write().await;
                entries
                    .entry(fingerprint.clone())
                    .or_insert_with(|| Arc::new(Mutex::new(Vec::new())))
                    .clone()
            }
        };

        {
            let mut attempts = entry.lock().await;
            attempts.push(attempt);
            debug!(
                "Appended attempt to fingerprint {} ({} total)",
                fingerprint,
                attempts.len()
            );
        }

        self.persist().await
    }

    /// Snapshot of the fingerprint's history, most recent last.
    pub async fn query(&self, fingerprint: &Fingerprint) -> Vec<FixAttempt> {
        let entry = {
            let entries = self.entries.read().await;
            entries.get(fingerprint).cloned()
        };
        match entry {
            Some(e) => e.lock().await.clone(),
            None => Vec::new(),
        }
    }

    /// Aggregate statistics across all fingerprints.
    pub async fn stats(&self) -> MemoryStats {
        let snapshot = self.snapshot().await;
        let mut stats = MemoryStats::default();
        for attempts in snapshot.values() {
            for attempt in attempts {
                stats.total_attempts += 1;
                let rule = stats.rules.entry(attempt.rule.clone()).or_default();
                rule.total += 1;
                if matches!(
                    attempt.outcome,
                    AttemptOutcome::Success | AttemptOutcome::SuccessPendingReview
                ) {
                    stats.successful_attempts += 1;
                    rule.successful += 1;
                }
            }
        }
        if stats.total_attempts > 0 {
            stats.success_rate = stats.successful_attempts as f64 / stats.total_attempts as f64;
        }
        stats
    }

    async fn snapshot(&self) -> HashMap<String, Vec<FixAttempt>> {
        let entries = self.entries.read().await;
        let mut snapshot = HashMap::with_capacity(entries.len());
        for (fp, entry) in entries.iter() {
            snapshot.insert(fp.as_str().to_string(), entry.lock().await.clone());
        }
        snapshot
    }

    async fn persist(&self) -> CoreResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        // Lock before snapshotting, so a stale snapshot can never land
        // after a newer one and drop an acknowledged append.
        let _guard = self.persist_lock.lock().await;
        let snapshot = self.snapshot().await;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&snapshot)
            .map_err(|e| FixerError::Serialization(e.to_string()))?;
        // Write-then-rename keeps the file whole for concurrent readers.
        let tmp = path.with_extension("json.tmp");
        if let Err(e) = fs::write(&tmp, json).and_then(|_| fs::rename(&tmp, path)) {
            warn!("Failed to persist memory store to {}: {}", path.display(), e);
            return Err(e.into());
        }
        Ok(())
    }
}
