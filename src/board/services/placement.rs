//! Move orchestration: relocating a task to a stage and a slot in one step.

use super::{
    OrderingError, OrderingResult, StageRebalancer,
    unit_of_work::{abandon, with_deadline},
};
use crate::board::{
    domain::{
        Allocation, BoardDomainError, OrderingConfig, SortKeyAllocator, StageId, Task, TaskId,
    },
    ports::{PositionStore, PositionTransaction},
};
use mockable::Clock;
use std::sync::Arc;

/// Request payload for moving a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveTaskRequest {
    task: TaskId,
    target_stage: StageId,
    preceding: Option<TaskId>,
    following: Option<TaskId>,
}

impl MoveTaskRequest {
    /// Moves `task` to the end of `target_stage`.
    #[must_use]
    pub const fn new(task: TaskId, target_stage: StageId) -> Self {
        Self {
            task,
            target_stage,
            preceding: None,
            following: None,
        }
    }

    /// Places the task immediately before `following`.
    #[must_use]
    pub const fn before(mut self, following: TaskId) -> Self {
        self.following = Some(following);
        self
    }

    /// Records the task the caller saw immediately before the drop point.
    ///
    /// Only used to detect no-op drags: when it equals the following task
    /// the move leaves storage untouched.
    #[must_use]
    pub const fn after(mut self, preceding: TaskId) -> Self {
        self.preceding = Some(preceding);
        self
    }

    /// Returns the task being moved.
    #[must_use]
    pub const fn task(&self) -> TaskId {
        self.task
    }

    /// Returns the destination stage.
    #[must_use]
    pub const fn target_stage(&self) -> StageId {
        self.target_stage
    }

    /// Returns the task that should follow the moved task, if any.
    #[must_use]
    pub const fn following(&self) -> Option<TaskId> {
        self.following
    }

    /// Returns the preceding task supplied by the caller, if any.
    #[must_use]
    pub const fn preceding(&self) -> Option<TaskId> {
        self.preceding
    }

    fn is_noop(&self) -> bool {
        let Some(following) = self.following else {
            return false;
        };
        self.preceding == Some(following) || following == self.task
    }
}

/// Result of one transactional move attempt.
enum Attempt {
    Placed(Task),
    NeedsRebalance,
    /// The task changed stage between the unlocked read and the lock.
    SourceMoved,
}

/// Public entry point for drag-and-drop moves.
///
/// Each attempt locks the task's current stage and the target stage, reads
/// the neighbours, allocates a key and writes the single moved row in one
/// transaction. Stages are always locked in identifier order, so two moves
/// between the same pair of stages cannot deadlock, and a rebalance of the
/// source stage cannot interleave with the task leaving it. When the target
/// gap is exhausted the attempt is rolled back, the stage is rebalanced in
/// its own committed transaction and the move restarts with fresh reads.
pub struct MoveOrchestrator<S, C>
where
    S: PositionStore,
    C: Clock + Send + Sync,
{
    store: Arc<S>,
    clock: Arc<C>,
    config: OrderingConfig,
    allocator: SortKeyAllocator,
    rebalancer: StageRebalancer<S>,
}

impl<S, C> Clone for MoveOrchestrator<S, C>
where
    S: PositionStore,
    C: Clock + Send + Sync,
{
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            clock: Arc::clone(&self.clock),
            config: self.config.clone(),
            allocator: self.allocator,
            rebalancer: self.rebalancer.clone(),
        }
    }
}

impl<S, C> MoveOrchestrator<S, C>
where
    S: PositionStore,
    C: Clock + Send + Sync,
{
    /// Creates an orchestrator with the default configuration.
    #[must_use]
    pub fn new(store: Arc<S>, clock: Arc<C>) -> Self {
        let config = OrderingConfig::default();
        Self {
            rebalancer: StageRebalancer::new(Arc::clone(&store), config.clone()),
            allocator: SortKeyAllocator::from_config(&config),
            store,
            clock,
            config,
        }
    }

    /// Replaces the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`BoardDomainError::InvalidConfig`] when the configuration
    /// fails validation.
    pub fn with_config(mut self, config: OrderingConfig) -> Result<Self, BoardDomainError> {
        config.validate()?;
        self.allocator = SortKeyAllocator::from_config(&config);
        self.rebalancer = StageRebalancer::new(Arc::clone(&self.store), config.clone());
        self.config = config;
        Ok(self)
    }

    /// Returns the active configuration.
    #[must_use]
    pub const fn config(&self) -> &OrderingConfig {
        &self.config
    }

    /// Moves a task into `target_stage`, before `following` or at the end.
    ///
    /// Returns the task as persisted. A no-op request (preceding equal to
    /// following, or a task asked to follow itself) returns the stored task
    /// without writing.
    ///
    /// # Errors
    ///
    /// - [`OrderingError::TaskNotFound`] / [`OrderingError::StageNotFound`]
    ///   when the moved task, the following task or the stage is missing.
    /// - [`OrderingError::InvalidTarget`] when the stage belongs to another
    ///   project or the following task is not in the target stage.
    /// - [`OrderingError::Timeout`] when an attempt misses its deadline.
    /// - [`OrderingError::RebalanceLimitExceeded`] when the stage is still
    ///   exhausted after the configured number of rebalances.
    /// - [`OrderingError::Store`] on persistence failures.
    #[tracing::instrument(
        skip_all,
        fields(task = %request.task, stage = %request.target_stage)
    )]
    pub async fn move_task(&self, request: MoveTaskRequest) -> OrderingResult<Task> {
        if request.is_noop() {
            tracing::debug!("no-op move");
            return self
                .store
                .find_by_id(request.task)
                .await?
                .ok_or(OrderingError::TaskNotFound(request.task));
        }

        let mut rebalances: u32 = 0;
        loop {
            let attempt = with_deadline(self.config.attempt_timeout, self.attempt(&request)).await?;
            match attempt {
                Attempt::Placed(task) => return Ok(task),
                Attempt::SourceMoved => {
                    tracing::debug!("task changed stage before its lock was taken, retrying");
                }
                Attempt::NeedsRebalance if rebalances >= self.config.max_rebalances => {
                    tracing::warn!(rebalances, "stage still exhausted after rebalancing");
                    return Err(OrderingError::RebalanceLimitExceeded {
                        stage: request.target_stage,
                        attempts: rebalances,
                    });
                }
                Attempt::NeedsRebalance => {
                    rebalances += 1;
                    self.rebalancer
                        .rebalance_stage(request.target_stage)
                        .await?;
                }
            }
        }
    }

    async fn attempt(&self, request: &MoveTaskRequest) -> OrderingResult<Attempt> {
        let mut tx = self.store.begin().await?;
        match self.place(&mut tx, request).await {
            Ok(Attempt::Placed(task)) => {
                tx.commit().await?;
                Ok(Attempt::Placed(task))
            }
            Ok(retry @ (Attempt::NeedsRebalance | Attempt::SourceMoved)) => {
                abandon(tx).await;
                Ok(retry)
            }
            Err(err) => {
                abandon(tx).await;
                Err(err)
            }
        }
    }

    async fn place(
        &self,
        tx: &mut S::Transaction,
        request: &MoveTaskRequest,
    ) -> OrderingResult<Attempt> {
        let source = tx
            .find_by_id(request.task)
            .await?
            .ok_or(OrderingError::TaskNotFound(request.task))?
            .stage();
        lock_in_order(tx, source, request.target_stage).await?;
        let mut task = tx
            .find_by_id(request.task)
            .await?
            .ok_or(OrderingError::TaskNotFound(request.task))?;
        if task.stage() != source && task.stage() != request.target_stage {
            return Ok(Attempt::SourceMoved);
        }
        let stage = tx
            .find_stage(request.target_stage)
            .await?
            .ok_or(OrderingError::StageNotFound(request.target_stage))?;
        if stage.project() != task.project() {
            return Err(OrderingError::invalid_target(format!(
                "stage {} belongs to project {}, task {} to project {}",
                stage.id(),
                stage.project(),
                task.id(),
                task.project()
            )));
        }

        let allocation = match request.following {
            Some(following_id) => {
                let following = tx
                    .find_by_id(following_id)
                    .await?
                    .ok_or(OrderingError::TaskNotFound(following_id))?;
                if following.stage() != stage.id() {
                    return Err(OrderingError::invalid_target(format!(
                        "following task {following_id} is not in stage {}",
                        stage.id()
                    )));
                }
                let predecessor = tx.find_predecessor(&following, Some(task.id())).await?;
                self.allocator.allocate(
                    predecessor.as_ref().map(Task::position),
                    Some(following.position()),
                )
            }
            None => {
                let last = tx.find_max_position(stage.id(), Some(task.id())).await?;
                self.allocator.allocate(last, None)
            }
        };

        let Allocation::Position(position) = allocation else {
            tracing::info!("target gap exhausted");
            return Ok(Attempt::NeedsRebalance);
        };
        tracing::debug!(%position, "allocated position");
        task.place(stage.id(), position, &*self.clock);
        tx.update_position(&task).await?;
        Ok(Attempt::Placed(task))
    }
}

/// Locks both stages, lower identifier first.
async fn lock_in_order<T>(tx: &mut T, source: StageId, target: StageId) -> OrderingResult<()>
where
    T: PositionTransaction,
{
    let (first, second) = if source <= target {
        (source, target)
    } else {
        (target, source)
    };
    tx.lock_stage(first).await?;
    if second != first {
        tx.lock_stage(second).await?;
    }
    Ok(())
}
