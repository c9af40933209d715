//! Position store port: transactional access to stages, tasks and their
//! sort keys.

use crate::board::domain::{Position, ProjectId, Stage, StageId, Task, TaskId, TaskNumber};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for position store operations.
pub type PositionStoreResult<T> = Result<T, PositionStoreError>;

/// Persistence contract for board ordering.
///
/// Reads on the store itself run outside any transaction and are meant for
/// rendering. Anything that decides a position must read and write through a
/// [`PositionTransaction`] obtained from [`PositionStore::begin`].
#[async_trait]
pub trait PositionStore: Send + Sync {
    /// Unit of work produced by [`PositionStore::begin`].
    type Transaction: PositionTransaction;

    /// Opens a transaction.
    ///
    /// # Errors
    ///
    /// Returns [`PositionStoreError::Persistence`] when the backing store
    /// cannot start a transaction.
    async fn begin(&self) -> PositionStoreResult<Self::Transaction>;

    /// Finds a task by identifier.
    async fn find_by_id(&self, id: TaskId) -> PositionStoreResult<Option<Task>>;

    /// Finds a stage by identifier.
    async fn find_stage(&self, id: StageId) -> PositionStoreResult<Option<Stage>>;

    /// Returns the tasks of `stage` ordered by position, then identifier.
    async fn find_all_ordered_by_position(&self, stage: StageId) -> PositionStoreResult<Vec<Task>>;

    /// Returns the stages of `project` ordered by column index.
    async fn list_stages(&self, project: ProjectId) -> PositionStoreResult<Vec<Stage>>;
}

/// A single transaction against the position store.
///
/// Writes become visible to other transactions only after
/// [`PositionTransaction::commit`]. Dropping a transaction without committing
/// rolls it back.
#[async_trait]
pub trait PositionTransaction: Send {
    /// Serialises this transaction with every other transaction that locks
    /// the same stage. The lock is held until commit or rollback.
    async fn lock_stage(&mut self, stage: StageId) -> PositionStoreResult<()>;

    /// Finds a task by identifier.
    async fn find_by_id(&mut self, id: TaskId) -> PositionStoreResult<Option<Task>>;

    /// Finds a stage by identifier.
    async fn find_stage(&mut self, id: StageId) -> PositionStoreResult<Option<Stage>>;

    /// Returns the largest position in `stage`, ignoring `excluding`.
    async fn find_max_position(
        &mut self,
        stage: StageId,
        excluding: Option<TaskId>,
    ) -> PositionStoreResult<Option<Position>>;

    /// Returns the task directly before `following` in its stage's
    /// `(position, id)` order, ignoring `excluding`.
    ///
    /// A task tied with `following` on position but with a smaller
    /// identifier counts as its predecessor.
    async fn find_predecessor(
        &mut self,
        following: &Task,
        excluding: Option<TaskId>,
    ) -> PositionStoreResult<Option<Task>>;

    /// Returns the tasks of `stage` ordered by position, then identifier.
    async fn find_all_ordered_by_position(
        &mut self,
        stage: StageId,
    ) -> PositionStoreResult<Vec<Task>>;

    /// Returns the highest task number used in `project`.
    async fn find_max_task_number(
        &mut self,
        project: ProjectId,
    ) -> PositionStoreResult<Option<TaskNumber>>;

    /// Returns the highest stage column index used in `project`.
    async fn find_max_stage_ordinal(
        &mut self,
        project: ProjectId,
    ) -> PositionStoreResult<Option<u32>>;

    /// Inserts a new task.
    ///
    /// # Errors
    ///
    /// Returns [`PositionStoreError::DuplicateTask`] when the identifier
    /// exists, [`PositionStoreError::DuplicateTaskNumber`] when the number is
    /// taken in the project, and [`PositionStoreError::StageNotFound`] when
    /// the stage does not exist.
    async fn insert_task(&mut self, task: &Task) -> PositionStoreResult<()>;

    /// Inserts a new stage.
    ///
    /// # Errors
    ///
    /// Returns [`PositionStoreError::DuplicateStage`] when the identifier
    /// exists.
    async fn insert_stage(&mut self, stage: &Stage) -> PositionStoreResult<()>;

    /// Writes the stage, position and modification time of one task.
    ///
    /// # Errors
    ///
    /// Returns [`PositionStoreError::TaskNotFound`] when the task does not
    /// exist.
    async fn update_position(&mut self, task: &Task) -> PositionStoreResult<()>;

    /// Rewrites the positions of several tasks of `stage`.
    ///
    /// Only rows still in `stage` are written, so a stale read cannot pull a
    /// task back from the stage it has since moved to.
    ///
    /// # Errors
    ///
    /// Returns [`PositionStoreError::TaskNotFound`] when any task does not
    /// exist and [`PositionStoreError::TaskLeftStage`] when one is no longer
    /// in `stage`, either now or by the time the transaction commits. No
    /// position is changed in those cases.
    async fn bulk_update_positions(
        &mut self,
        stage: StageId,
        updates: &[(TaskId, Position)],
    ) -> PositionStoreResult<()>;

    /// Makes every write of this transaction visible.
    ///
    /// # Errors
    ///
    /// Returns [`PositionStoreError::DuplicateTaskNumber`] when another
    /// transaction committed the same task number first, and
    /// [`PositionStoreError::TaskLeftStage`] when a task rewritten here was
    /// moved out of its stage meanwhile. Nothing is applied in those cases.
    async fn commit(self) -> PositionStoreResult<()>;

    /// Discards every write of this transaction.
    async fn rollback(self) -> PositionStoreResult<()>;
}

/// Errors returned by position store implementations.
#[derive(Debug, Clone, Error)]
pub enum PositionStoreError {
    /// The task was not found.
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),

    /// The stage was not found.
    #[error("stage not found: {0}")]
    StageNotFound(StageId),

    /// A task with the same identifier already exists.
    #[error("duplicate task identifier: {0}")]
    DuplicateTask(TaskId),

    /// A stage with the same identifier already exists.
    #[error("duplicate stage identifier: {0}")]
    DuplicateStage(StageId),

    /// The task number is already used in the project.
    #[error("task number {number} already used in project {project}")]
    DuplicateTaskNumber {
        /// Owning project.
        project: ProjectId,
        /// Conflicting number.
        number: TaskNumber,
    },

    /// A task read from a stage was moved elsewhere by another transaction.
    #[error("task {task} is no longer in stage {stage}")]
    TaskLeftStage {
        /// Task that moved.
        task: TaskId,
        /// Stage it was expected in.
        stage: StageId,
    },

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl PositionStoreError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
