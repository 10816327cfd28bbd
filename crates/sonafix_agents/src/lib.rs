//! # sonafix_agents
//!
//! Agent implementations for the sonafix remediation pipeline.
//!
//! Each agent implements one of the pipeline roles defined in
//! `sonafix_core`:
//!
//! - [`IssueAnalyzer`]: context extraction and strategy classification
//! - [`CodeFixer`]: fix generation with memory hints and feedback
//!   weights, plus patch validation
//! - [`PrCreator`]: deterministic pull-request rendering and creation
//!
//! The agents are deterministic glue; everything that touches the
//! outside world (scanner, repository, model, forge) comes in through
//! the client traits from `sonafix_core`, implemented in
//! `sonafix_adapters`.

pub mod analyzer;
pub mod fixer;
pub mod pr_creator;

pub use analyzer::IssueAnalyzer;
pub use fixer::CodeFixer;
pub use pr_creator::PrCreator;
