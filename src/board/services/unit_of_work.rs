//! Commit, rollback and deadline plumbing shared by board services.

use super::{OrderingError, OrderingResult};
use crate::board::ports::PositionTransaction;
use std::future::Future;
use std::time::Duration;

/// Commits `tx` when `outcome` is a success, rolls it back otherwise.
pub(super) async fn finish<T, V>(tx: T, outcome: OrderingResult<V>) -> OrderingResult<V>
where
    T: PositionTransaction,
{
    match outcome {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            abandon(tx).await;
            Err(err)
        }
    }
}

/// Rolls `tx` back, logging rather than returning a rollback failure so the
/// original error reaches the caller.
pub(super) async fn abandon<T: PositionTransaction>(tx: T) {
    if let Err(err) = tx.rollback().await {
        tracing::warn!(error = %err, "rollback failed");
    }
}

/// Runs `attempt` under `deadline`.
///
/// On expiry the attempt future is dropped together with any open
/// transaction it owns, which rolls that transaction back.
pub(super) async fn with_deadline<F, V>(deadline: Duration, attempt: F) -> OrderingResult<V>
where
    F: Future<Output = OrderingResult<V>>,
{
    tokio::time::timeout(deadline, attempt).await.map_err(|_| {
        tracing::warn!(?deadline, "attempt exceeded its deadline");
        OrderingError::Timeout { after: deadline }
    })?
}
