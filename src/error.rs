//! Error types for the chore workflow engine.

use crate::lifecycle::TransitionError;
use crate::store::StoreError;

/// Top-level error type for the chore workflow.
#[derive(Debug, thiserror::Error)]
pub enum ChoreError {
    /// Persistence backend error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Messaging transport error.
    #[error("channel error: {0}")]
    Channel(String),

    /// Referenced participant, task, category or assignment does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Lifecycle transition not applicable to the record's status.
    #[error("transition error: {0}")]
    Transition(#[from] TransitionError),

    /// Interactive session error.
    #[error("session error: {0}")]
    Session(String),

    /// Scheduler error (unknown trigger, state persistence).
    #[error("scheduler error: {0}")]
    Scheduler(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, ChoreError>;
