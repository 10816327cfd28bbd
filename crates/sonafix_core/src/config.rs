//! Run configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{CoreResult, FixerError};

/// Backoff shape between retry attempts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Backoff {
    /// Same delay between every attempt.
    Fixed,
    /// Delay doubles after each attempt.
    Exponential,
}

/// Retry policy for Transient errors at external-call boundaries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryPolicy {
    /// Additional attempts after the first (a stage runs at most
    /// `attempts + 1` times).
    pub attempts: u32,
    /// Base delay between attempts.
    pub delay: Duration,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_secs(5),
            backoff: Backoff::Fixed,
        }
    }
}

impl RetryPolicy {
    /// Delay before re-attempting after the given 0-based attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.delay,
            Backoff::Exponential => self.delay * 2u32.saturating_pow(attempt),
        }
    }
}

/// Configuration for one orchestrator run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Maximum number of issues processed in one run.
    pub max_issues: usize,
    /// Worker pool size; 1 means sequential processing.
    pub workers: usize,
    pub retry: RetryPolicy,
    /// Context lines extracted before the finding.
    pub context_before: usize,
    /// Context lines extracted after the finding.
    pub context_after: usize,
    /// Branch pull requests target.
    pub target_branch: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_issues: 50,
            workers: 1,
            retry: RetryPolicy::default(),
            context_before: 10,
            context_after: 10,
            target_branch: "master".to_string(),
        }
    }
}

impl RunConfig {
    /// Validate the configuration. Errors here are Fatal: the run
    /// aborts before any issue is dispatched.
    pub fn validate(&self) -> CoreResult<()> {
        if self.workers == 0 {
            return Err(FixerError::Config("worker count must be at least 1".into()));
        }
        if self.max_issues == 0 {
            return Err(FixerError::Config("max issues per run must be at least 1".into()));
        }
        if self.target_branch.trim().is_empty() {
            return Err(FixerError::Config("target branch must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = RunConfig::default();
        assert_eq!(cfg.max_issues, 50);
        assert_eq!(cfg.workers, 1);
        assert_eq!(cfg.retry.attempts, 3);
        assert_eq!(cfg.context_before, 10);
        assert_eq!(cfg.context_after, 10);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_zero_workers_is_fatal() {
        let cfg = RunConfig { workers: 0, ..Default::default() };
        let err = cfg.validate().unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_backoff_shapes() {
        let fixed = RetryPolicy { attempts: 3, delay: Duration::from_secs(5), backoff: Backoff::Fixed };
        assert_eq!(fixed.delay_for(0), Duration::from_secs(5));
        assert_eq!(fixed.delay_for(2), Duration::from_secs(5));

        let exp = RetryPolicy { backoff: Backoff::Exponential, ..fixed };
        assert_eq!(exp.delay_for(0), Duration::from_secs(5));
        assert_eq!(exp.delay_for(1), Duration::from_secs(10));
        assert_eq!(exp.delay_for(2), Duration::from_secs(20));
    }
}
