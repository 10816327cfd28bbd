//! Error types for the core engine.

use thiserror::Error;

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, FixerError>;

/// Coarse error taxonomy driving retry and propagation decisions.
///
/// - `Transient` errors are retried up to the configured attempts.
/// - `Structural` errors fail the work item immediately, no retry.
/// - `Policy` errors fail the work item and are recorded distinctly
///   so the feedback loop can learn from refusals.
/// - `Fatal` errors abort the run before dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Transient,
    Structural,
    Policy,
    Fatal,
}

impl ErrorClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorClass::Transient => "transient",
            ErrorClass::Structural => "structural",
            ErrorClass::Policy => "policy",
            ErrorClass::Fatal => "fatal",
        }
    }
}

/// Errors that can occur while processing issues.
#[derive(Error, Debug)]
pub enum FixerError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Context not found: {path}:{line}")]
    ContextMissing { path: String, line: u32 },

    #[error("Patch does not apply cleanly to {0}")]
    PatchMismatch(String),

    #[error("Version-control conflict: {0}")]
    Conflict(String),

    #[error("Fix generation refused: {0}")]
    Refused(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl FixerError {
    /// Classify the error into the retry/propagation taxonomy.
    pub fn class(&self) -> ErrorClass {
        match self {
            FixerError::Network(_) | FixerError::RateLimited(_) => ErrorClass::Transient,
            FixerError::Auth(_) | FixerError::Config(_) => ErrorClass::Fatal,
            FixerError::ContextMissing { .. }
            | FixerError::PatchMismatch(_)
            | FixerError::Conflict(_)
            | FixerError::Io(_)
            | FixerError::Serialization(_) => ErrorClass::Structural,
            FixerError::Refused(_) => ErrorClass::Policy,
        }
    }

    /// Whether a stage hitting this error may be re-attempted.
    pub fn is_transient(&self) -> bool {
        self.class() == ErrorClass::Transient
    }

    pub fn is_fatal(&self) -> bool {
        self.class() == ErrorClass::Fatal
    }
}
