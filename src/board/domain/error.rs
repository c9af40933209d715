//! Error types for board domain validation.

use thiserror::Error;

/// Errors returned while constructing domain board values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BoardDomainError {
    /// The task name is empty after trimming.
    #[error("task name must not be empty")]
    EmptyTaskName,

    /// The stage name is empty after trimming.
    #[error("stage name must not be empty")]
    EmptyStageName,

    /// The task number is invalid.
    #[error("invalid task number {0}, expected a positive integer")]
    InvalidTaskNumber(u64),

    /// The ordering configuration is unusable.
    #[error("invalid ordering configuration: {0}")]
    InvalidConfig(String),
}
