//! # sonafix_adapters
//!
//! Concrete implementations of the collaborator traits from
//! `sonafix_core`:
//!
//! - [`SonarScanner`] / [`FileIssueSource`]: issue sources (live
//!   SonarQube REST API, captured JSON file)
//! - [`FsContextProvider`]: code context from a local checkout
//! - [`HeuristicFixGenerator`]: deterministic comment-deletion fixes
//! - [`GitWorkspace`]: branches, commits and pushes via the `git`
//!   binary, one worktree per fix branch
//! - [`DevOpsPrClient`]: pull requests via the Azure DevOps REST API

pub mod devops;
pub mod file_source;
pub mod fs_context;
pub mod git;
pub mod heuristic;
pub mod sonar;

pub use devops::{DevOpsConfig, DevOpsPrClient};
pub use file_source::FileIssueSource;
pub use fs_context::FsContextProvider;
pub use git::GitWorkspace;
pub use heuristic::HeuristicFixGenerator;
pub use sonar::{SonarConfig, SonarScanner};
