//! Even respacing of every task in a stage.

use super::{
    OrderingError, OrderingResult,
    unit_of_work::{finish, with_deadline},
};
use crate::board::{
    domain::{OrderingConfig, Position, StageId, Task, TaskId},
    ports::{PositionStore, PositionTransaction},
};
use std::sync::Arc;

/// Restores insertion headroom by renumbering a stage.
///
/// The task at 1-based index `i` of the stage's current order (position,
/// then identifier) receives `i * increment`. Running it twice in a row
/// yields the same keys.
#[derive(Debug)]
pub struct StageRebalancer<S>
where
    S: PositionStore,
{
    store: Arc<S>,
    config: OrderingConfig,
}

impl<S> Clone for StageRebalancer<S>
where
    S: PositionStore,
{
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: self.config.clone(),
        }
    }
}

impl<S> StageRebalancer<S>
where
    S: PositionStore,
{
    /// Creates a rebalancer over `store`.
    #[must_use]
    pub const fn new(store: Arc<S>, config: OrderingConfig) -> Self {
        Self { store, config }
    }

    /// Respaces `stage` in its own transaction and commits it.
    ///
    /// Returns the stage's tasks in order with their new positions.
    ///
    /// # Errors
    ///
    /// Returns [`OrderingError::StageNotFound`] for an unknown stage,
    /// [`OrderingError::Timeout`] when the deadline elapses and
    /// [`OrderingError::Store`] on persistence failures. In every error case
    /// the stage keeps its previous positions.
    #[tracing::instrument(skip_all, fields(stage = %stage))]
    pub async fn rebalance_stage(&self, stage: StageId) -> OrderingResult<Vec<Task>> {
        with_deadline(self.config.attempt_timeout, async {
            let mut tx = self.store.begin().await?;
            let outcome = self.rebalance_locked(&mut tx, stage).await;
            finish(tx, outcome).await
        })
        .await
    }

    async fn rebalance_locked(
        &self,
        tx: &mut S::Transaction,
        stage: StageId,
    ) -> OrderingResult<Vec<Task>> {
        tx.lock_stage(stage).await?;
        if tx.find_stage(stage).await?.is_none() {
            return Err(OrderingError::StageNotFound(stage));
        }
        let tasks = respace(tx, stage, self.config.increment).await?;
        tracing::info!(tasks = tasks.len(), "stage rebalanced");
        Ok(tasks)
    }
}

/// Rewrites every position of `stage` inside `tx`.
pub(super) async fn respace<T>(
    tx: &mut T,
    stage: StageId,
    increment: i64,
) -> OrderingResult<Vec<Task>>
where
    T: PositionTransaction,
{
    let mut tasks = tx.find_all_ordered_by_position(stage).await?;
    let mut updates: Vec<(TaskId, Position)> = Vec::with_capacity(tasks.len());
    for (index, task) in tasks.iter_mut().enumerate() {
        let position = Position::spaced(index + 1, increment)
            .ok_or(OrderingError::PositionOverflow { stage })?;
        task.set_position(position);
        updates.push((task.id(), position));
    }
    tx.bulk_update_positions(stage, &updates).await?;
    Ok(tasks)
}
