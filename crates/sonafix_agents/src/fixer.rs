//! Code fixer agent.
//!
//! The fixer assembles everything the generator needs (context,
//! candidate strategies ordered by feedback weight, memory of past
//! attempts on the same fingerprint), requests a fix and validates the
//! returned patch against the context before handing it on. A patch
//! whose expected content does not match what is actually there is a
//! structural failure, not something to retry.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use sonafix_core::{
    CodeContext, CoreResult, FeedbackAggregator, FixerAgent, FixerError, FixGenerator, FixPatch,
    FixProposal, FixRequest, FixStrategy, MemoryStore, WorkItem,
};

/// Most recent memory entries forwarded to the generator.
const MEMORY_HINT_LIMIT: usize = 5;

/// Weight bonus for the strategy the analyzer classified. Keeps the
/// classified strategy first among equally-weighted candidates while
/// still letting strong feedback overrule it.
const CLASSIFIED_PRIOR: f64 = 0.1;

/// Fix agent wiring the generator to memory and feedback.
pub struct CodeFixer {
    generator: Arc<dyn FixGenerator>,
    memory: Arc<MemoryStore>,
    feedback: Arc<FeedbackAggregator>,
}

impl CodeFixer {
    pub fn new(
        generator: Arc<dyn FixGenerator>,
        memory: Arc<MemoryStore>,
        feedback: Arc<FeedbackAggregator>,
    ) -> Self {
        Self {
            generator,
            memory,
            feedback,
        }
    }
}

#[async_trait]
impl FixerAgent for CodeFixer {
    async fn propose(&self, item: &WorkItem) -> CoreResult<FixProposal> {
        let context = item.context.clone().ok_or_else(|| FixerError::ContextMissing {
            path: item.issue.file_path.clone(),
            line: item.issue.line,
        })?;
        let strategy = item
            .strategy
            .unwrap_or_else(|| FixStrategy::classify(&item.issue.rule, &item.issue.message));

        let weights = self.feedback.weights_for(&item.issue.rule).await;
        let candidates = ranked_candidates(strategy, &weights);

        let mut hints = self.memory.query(&item.fingerprint).await;
        if hints.len() > MEMORY_HINT_LIMIT {
            hints.drain(..hints.len() - MEMORY_HINT_LIMIT);
        }
        debug!(
            "Requesting fix for {}: {} candidates, {} memory hints",
            item.issue.key,
            candidates.len(),
            hints.len()
        );

        let request = FixRequest {
            issue: item.issue.clone(),
            context: context.clone(),
            strategy,
            candidates,
            memory_hints: hints,
            feedback_weights: weights,
        };
        let proposal = self.generator.generate_fix(&request).await?;
        validate_patch(&proposal.patch, &context)?;
        Ok(proposal)
    }
}

/// All strategies ordered by feedback weight, best first, with the
/// classified strategy given a small prior. Ties keep the declaration
/// order of [`FixStrategy::ALL`].
fn ranked_candidates(
    classified: FixStrategy,
    weights: &std::collections::HashMap<FixStrategy, f64>,
) -> Vec<FixStrategy> {
    let mut ranked: Vec<FixStrategy> = FixStrategy::ALL.to_vec();
    let score = |s: &FixStrategy| {
        let base = weights.get(s).copied().unwrap_or(sonafix_core::NEUTRAL_WEIGHT);
        if *s == classified {
            base + CLASSIFIED_PRIOR
        } else {
            base
        }
    };
    ranked.sort_by(|a, b| score(b).partial_cmp(&score(a)).unwrap_or(std::cmp::Ordering::Equal));
    ranked
}

/// Structural precondition: the patch must target the context's file
/// and lines, and its expected content must match the context.
fn validate_patch(patch: &FixPatch, context: &CodeContext) -> CoreResult<()> {
    if patch.file_path != context.file_path {
        return Err(FixerError::PatchMismatch(patch.file_path.clone()));
    }
    let region = context
        .region(patch.start_line, patch.end_line)
        .ok_or_else(|| FixerError::PatchMismatch(patch.file_path.clone()))?;
    if !patch.applies_to(&region) {
        return Err(FixerError::PatchMismatch(patch.file_path.clone()));
    }
    Ok(())
}
