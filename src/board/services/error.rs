//! Service-level errors for board ordering operations.

use crate::board::{
    domain::{BoardDomainError, StageId, TaskId},
    ports::PositionStoreError,
};
use std::time::Duration;
use thiserror::Error;

/// Errors returned by the move orchestrator, the rebalancer and the board
/// service.
#[derive(Debug, Error)]
pub enum OrderingError {
    /// A referenced task does not exist.
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),

    /// A referenced stage does not exist.
    #[error("stage not found: {0}")]
    StageNotFound(StageId),

    /// The requested placement cannot be honoured.
    #[error("invalid target: {reason}")]
    InvalidTarget {
        /// Why the target was rejected.
        reason: String,
    },

    /// An attempt did not commit before its deadline; nothing was applied.
    #[error("attempt timed out after {after:?}")]
    Timeout {
        /// Deadline that elapsed.
        after: Duration,
    },

    /// The stage kept running out of room after the allowed rebalances.
    #[error("stage {stage} still exhausted after {attempts} rebalances")]
    RebalanceLimitExceeded {
        /// Stage whose gaps kept collapsing.
        stage: StageId,
        /// Rebalances performed before giving up.
        attempts: u32,
    },

    /// Evenly spaced positions for the stage do not fit the key range.
    #[error("positions of stage {stage} overflow the sort key range")]
    PositionOverflow {
        /// Stage that could not be respaced.
        stage: StageId,
    },

    /// Domain validation failed.
    #[error(transparent)]
    Domain(#[from] BoardDomainError),

    /// The position store failed.
    #[error(transparent)]
    Store(PositionStoreError),
}

impl OrderingError {
    /// Creates an [`OrderingError::InvalidTarget`].
    #[must_use]
    pub fn invalid_target(reason: impl Into<String>) -> Self {
        Self::InvalidTarget {
            reason: reason.into(),
        }
    }

    /// Whether repeating the same call may succeed.
    ///
    /// Storage failures and timeouts are transient; missing entities,
    /// rejected targets, validation failures and exhausted rebalancing are
    /// terminal.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Store(_) | Self::Timeout { .. })
    }
}

impl From<PositionStoreError> for OrderingError {
    fn from(err: PositionStoreError) -> Self {
        match err {
            PositionStoreError::TaskNotFound(id) => Self::TaskNotFound(id),
            PositionStoreError::StageNotFound(id) => Self::StageNotFound(id),
            other => Self::Store(other),
        }
    }
}

/// Result type for board ordering services.
pub type OrderingResult<T> = Result<T, OrderingError>;
