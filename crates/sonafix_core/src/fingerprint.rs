//! Fingerprints correlating issues and fixes across runs.
//!
//! A fingerprint is derived from the violated rule and the shape of the
//! surrounding code, so that the same defect keeps the same memory entry
//! even when the file is reformatted or lines shift. Whitespace-only
//! changes to the snippet do not change the fingerprint.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Derived key used to correlate a work item with historical memory
/// entries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Derive a fingerprint from the rule and the code snippet the issue
    /// points at.
    pub fn from_snippet(rule: &str, snippet: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(rule.as_bytes());
        hasher.update(b"\x1f");
        hasher.update(normalize(snippet).as_bytes());
        Self(hex_prefix(&hasher.finalize()))
    }

    /// Fallback derivation for issues whose snippet cannot be fetched:
    /// rule plus location. Weaker across-run stability, but still a
    /// usable dedup key within a run.
    pub fn from_location(rule: &str, path: &str, line: u32) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(rule.as_bytes());
        hasher.update(b"\x1f");
        hasher.update(path.as_bytes());
        hasher.update(b"\x1f");
        hasher.update(line.to_string().as_bytes());
        Self(hex_prefix(&hasher.finalize()))
    }

    /// Reconstruct a fingerprint from its persisted string form.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Collapse whitespace so whitespace-only diffs hash identically: each
/// line is trimmed and inner runs of whitespace become a single space;
/// blank lines are dropped.
fn normalize(snippet: &str) -> String {
    snippet
        .lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn hex_prefix(digest: &[u8]) -> String {
    digest.iter().take(8).map(|b| format!("{:02x}", b)).collect()
}
