//! Error types for periodical runs.

use crate::task::TaskFault;

/// Top-level error type for a periodical invocation.
#[derive(Debug, thiserror::Error)]
pub enum PeriodicalError {
    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Ledger storage error (cannot create, read, or append).
    #[error("ledger error: {0}")]
    Ledger(String),

    /// Token rejected before any ledger access.
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// Task name cannot be used as a ledger identifier.
    #[error("invalid task name: {0:?}")]
    InvalidTaskName(String),

    /// Platform adapter failed while confirming or opening a file.
    #[error("platform error: {0}")]
    Platform(String),

    /// Platform adapter lacks a requested capability.
    #[error("not supported on this platform: {0}")]
    Unsupported(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Abnormal task fault, re-raised after the recovery hook ran.
    #[error("task fault: {0}")]
    Fault(TaskFault),

    /// The user cancelled the run.
    #[error("interrupted")]
    Interrupted,
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, PeriodicalError>;
