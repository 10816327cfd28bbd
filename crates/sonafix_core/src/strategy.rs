//! Fix strategy classification.
//!
//! A strategy is a coarse, classified approach to remediating a rule
//! violation. The classification is deterministic (rule id and message
//! heuristics); the feedback aggregator later reweighs strategies per
//! rule based on observed outcomes.

use serde::{Deserialize, Serialize};

/// Classified approach to remediating a rule violation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FixStrategy {
    /// Delete the offending code (dead code, commented-out code).
    RemoveDeadCode,
    /// Resolve or remove a tracked TODO/FIXME marker.
    ResolveTodo,
    /// Reduce complexity or redundancy without changing behavior.
    SimplifyExpression,
    /// Introduce a missing guard or error-handling path.
    AddErrorHandling,
    /// General targeted rewrite of the flagged region.
    Rewrite,
}

impl FixStrategy {
    /// All known strategies. Order here is the neutral prior; feedback
    /// weights reorder candidates at fix time.
    pub const ALL: [FixStrategy; 5] = [
        FixStrategy::RemoveDeadCode,
        FixStrategy::ResolveTodo,
        FixStrategy::SimplifyExpression,
        FixStrategy::AddErrorHandling,
        FixStrategy::Rewrite,
    ];

    /// Classify the strategy for a finding from its rule and message.
    pub fn classify(rule: &str, message: &str) -> Self {
        let msg = message.to_lowercase();
        match rule {
            "S1135" | "S1134" => return Self::ResolveTodo,
            "S125" | "S1068" | "S1481" | "S1172" => return Self::RemoveDeadCode,
            "S3776" | "S1067" | "S1126" => return Self::SimplifyExpression,
            "S2259" | "S3655" | "S2583" => return Self::AddErrorHandling,
            _ => {}
        }
        if msg.contains("todo") || msg.contains("fixme") {
            Self::ResolveTodo
        } else if msg.contains("unused") || msg.contains("commented out") || msg.contains("dead") {
            Self::RemoveDeadCode
        } else if msg.contains("complexity") || msg.contains("simplif") {
            Self::SimplifyExpression
        } else if msg.contains("null") || msg.contains("exception") || msg.contains("error") {
            Self::AddErrorHandling
        } else {
            Self::Rewrite
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RemoveDeadCode => "remove_dead_code",
            Self::ResolveTodo => "resolve_todo",
            Self::SimplifyExpression => "simplify_expression",
            Self::AddErrorHandling => "add_error_handling",
            Self::Rewrite => "rewrite",
        }
    }
}

impl std::fmt::Display for FixStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
