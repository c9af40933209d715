//! Board bookkeeping: creating stages and tasks, and reading them back.

use super::{
    OrderingError, OrderingResult,
    rebalance::respace,
    unit_of_work::{finish, with_deadline},
};
use crate::board::{
    domain::{
        Allocation, BoardDomainError, OrderingConfig, ProjectId, SortKeyAllocator, Stage,
        StageId, StageName, Task, TaskId, TaskName, TaskNumber,
    },
    ports::{PositionStore, PositionTransaction},
};
use mockable::Clock;
use std::sync::Arc;

/// Request payload for adding a stage to a project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateStageRequest {
    project: ProjectId,
    name: String,
}

impl CreateStageRequest {
    /// Creates a request for a stage named `name` in `project`.
    #[must_use]
    pub fn new(project: ProjectId, name: impl Into<String>) -> Self {
        Self {
            project,
            name: name.into(),
        }
    }
}

/// Request payload for adding a task to the end of a stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTaskRequest {
    project: ProjectId,
    stage: StageId,
    name: String,
}

impl CreateTaskRequest {
    /// Creates a request for a task named `name` in `stage`.
    #[must_use]
    pub fn new(project: ProjectId, stage: StageId, name: impl Into<String>) -> Self {
        Self {
            project,
            stage,
            name: name.into(),
        }
    }
}

/// Stage and task creation plus read access for a board.
pub struct BoardService<S, C>
where
    S: PositionStore,
    C: Clock + Send + Sync,
{
    store: Arc<S>,
    clock: Arc<C>,
    config: OrderingConfig,
    allocator: SortKeyAllocator,
}

impl<S, C> Clone for BoardService<S, C>
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
        }
    }
}

impl<S, C> BoardService<S, C>
where
    S: PositionStore,
    C: Clock + Send + Sync,
{
    /// Creates a board service with the default configuration.
    #[must_use]
    pub fn new(store: Arc<S>, clock: Arc<C>) -> Self {
        let config = OrderingConfig::default();
        Self {
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
        self.config = config;
        Ok(self)
    }

    /// Appends a stage to the project's columns.
    ///
    /// # Errors
    ///
    /// Returns [`OrderingError::Domain`] for an empty name and
    /// [`OrderingError::Store`] when persistence fails.
    pub async fn create_stage(&self, request: CreateStageRequest) -> OrderingResult<Stage> {
        let CreateStageRequest { project, name } = request;
        let stage_name = StageName::new(name)?;
        with_deadline(self.config.attempt_timeout, async {
            let mut tx = self.store.begin().await?;
            let outcome = Self::insert_stage(&mut tx, project, stage_name, &*self.clock).await;
            finish(tx, outcome).await
        })
        .await
    }

    async fn insert_stage(
        tx: &mut S::Transaction,
        project: ProjectId,
        name: StageName,
        clock: &C,
    ) -> OrderingResult<Stage> {
        let ordinal = match tx.find_max_stage_ordinal(project).await? {
            Some(last) => last.checked_add(1).ok_or_else(|| {
                OrderingError::invalid_target(format!("project {project} has too many stages"))
            })?,
            None => 0,
        };
        let stage = Stage::new(project, name, ordinal, clock);
        tx.insert_stage(&stage).await?;
        tracing::debug!(stage = %stage.id(), ordinal, "stage created");
        Ok(stage)
    }

    /// Creates a task at the end of a stage with the project's next number.
    ///
    /// # Errors
    ///
    /// - [`OrderingError::Domain`] for an empty name or an exhausted number
    ///   sequence.
    /// - [`OrderingError::StageNotFound`] when the stage is missing.
    /// - [`OrderingError::InvalidTarget`] when the stage belongs to another
    ///   project.
    /// - [`OrderingError::Timeout`] / [`OrderingError::Store`] on deadline
    ///   or persistence failures.
    #[tracing::instrument(skip_all, fields(stage = %request.stage))]
    pub async fn create_task(&self, request: CreateTaskRequest) -> OrderingResult<Task> {
        let CreateTaskRequest {
            project,
            stage,
            name,
        } = request;
        let task_name = TaskName::new(name)?;
        with_deadline(self.config.attempt_timeout, async {
            let mut tx = self.store.begin().await?;
            let outcome = self.append_task(&mut tx, project, stage, task_name).await;
            finish(tx, outcome).await
        })
        .await
    }

    async fn append_task(
        &self,
        tx: &mut S::Transaction,
        project: ProjectId,
        stage_id: StageId,
        name: TaskName,
    ) -> OrderingResult<Task> {
        tx.lock_stage(stage_id).await?;
        let stage = tx
            .find_stage(stage_id)
            .await?
            .ok_or(OrderingError::StageNotFound(stage_id))?;
        if stage.project() != project {
            return Err(OrderingError::invalid_target(format!(
                "stage {stage_id} does not belong to project {project}"
            )));
        }

        let number = match tx.find_max_task_number(project).await? {
            Some(last) => last.next()?,
            None => TaskNumber::FIRST,
        };
        let last = tx.find_max_position(stage_id, None).await?;
        let position = match self.allocator.allocate(last, None) {
            Allocation::Position(position) => position,
            Allocation::NeedsRebalance => {
                tracing::info!("stage tail exhausted, respacing before append");
                let respaced = respace(tx, stage_id, self.allocator.increment()).await?;
                let tail = respaced.last().map(Task::position);
                self.allocator
                    .allocate(tail, None)
                    .position()
                    .ok_or(OrderingError::PositionOverflow { stage: stage_id })?
            }
        };

        let task = Task::new(project, stage_id, name, number, position, &*self.clock);
        tx.insert_task(&task).await?;
        tracing::debug!(task = %task.id(), %number, %position, "task created");
        Ok(task)
    }

    /// Lists a project's stages by column index.
    ///
    /// # Errors
    ///
    /// Returns [`OrderingError::Store`] when the lookup fails.
    pub async fn list_stages(&self, project: ProjectId) -> OrderingResult<Vec<Stage>> {
        Ok(self.store.list_stages(project).await?)
    }

    /// Lists a stage's tasks in display order.
    ///
    /// # Errors
    ///
    /// Returns [`OrderingError::StageNotFound`] for an unknown stage and
    /// [`OrderingError::Store`] when the lookup fails.
    pub async fn list_tasks(&self, stage: StageId) -> OrderingResult<Vec<Task>> {
        if self.store.find_stage(stage).await?.is_none() {
            return Err(OrderingError::StageNotFound(stage));
        }
        Ok(self.store.find_all_ordered_by_position(stage).await?)
    }

    /// Looks a task up by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`OrderingError::Store`] when the lookup fails.
    pub async fn find_task(&self, id: TaskId) -> OrderingResult<Option<Task>> {
        Ok(self.store.find_by_id(id).await?)
    }
}
