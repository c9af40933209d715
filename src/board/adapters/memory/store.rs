//! In-memory position store for tests and embedded use.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::board::{
    domain::{Position, ProjectId, Stage, StageId, Task, TaskId, TaskNumber},
    ports::{PositionStore, PositionStoreError, PositionStoreResult, PositionTransaction},
};

type StageLocks = Arc<Mutex<HashMap<StageId, Arc<AsyncMutex<()>>>>>;

/// Thread-safe in-memory position store.
///
/// Transactions buffer their writes and apply them atomically on commit.
/// Stage locks are real async mutexes, so concurrent moves against the same
/// stage serialise exactly as they would against `PostgreSQL`.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPositionStore {
    state: Arc<RwLock<InMemoryBoardState>>,
    stage_locks: StageLocks,
}

#[derive(Debug, Default)]
struct InMemoryBoardState {
    tasks: HashMap<TaskId, Task>,
    stages: HashMap<StageId, Stage>,
}

impl InMemoryPositionStore {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts tasks directly, bypassing transactions and numbering.
    ///
    /// Intended for seeding fixtures with exact positions.
    ///
    /// # Errors
    ///
    /// Returns [`PositionStoreError::DuplicateTask`] when a task already
    /// exists.
    pub fn seed_tasks(&self, tasks: impl IntoIterator<Item = Task>) -> PositionStoreResult<()> {
        let mut state = self.state.write().map_err(poisoned)?;
        for task in tasks {
            if state.tasks.contains_key(&task.id()) {
                return Err(PositionStoreError::DuplicateTask(task.id()));
            }
            state.tasks.insert(task.id(), task);
        }
        Ok(())
    }

    /// Inserts a stage directly, bypassing transactions.
    ///
    /// # Errors
    ///
    /// Returns [`PositionStoreError::DuplicateStage`] when the stage already
    /// exists.
    pub fn seed_stage(&self, stage: Stage) -> PositionStoreResult<()> {
        let mut state = self.state.write().map_err(poisoned)?;
        if state.stages.contains_key(&stage.id()) {
            return Err(PositionStoreError::DuplicateStage(stage.id()));
        }
        state.stages.insert(stage.id(), stage);
        Ok(())
    }
}

fn poisoned(err: impl std::fmt::Display) -> PositionStoreError {
    PositionStoreError::persistence(std::io::Error::other(err.to_string()))
}

fn order_by_position(mut tasks: Vec<Task>) -> Vec<Task> {
    tasks.sort_by(|a, b| {
        a.position()
            .cmp(&b.position())
            .then_with(|| a.id().cmp(&b.id()))
    });
    tasks
}

#[async_trait]
impl PositionStore for InMemoryPositionStore {
    type Transaction = InMemoryTransaction;

    async fn begin(&self) -> PositionStoreResult<Self::Transaction> {
        Ok(InMemoryTransaction {
            state: Arc::clone(&self.state),
            stage_locks: Arc::clone(&self.stage_locks),
            held_locks: HashMap::new(),
            pending_tasks: HashMap::new(),
            inserted_tasks: HashSet::new(),
            expected_stages: HashMap::new(),
            pending_stages: HashMap::new(),
        })
    }

    async fn find_by_id(&self, id: TaskId) -> PositionStoreResult<Option<Task>> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(state.tasks.get(&id).cloned())
    }

    async fn find_stage(&self, id: StageId) -> PositionStoreResult<Option<Stage>> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(state.stages.get(&id).cloned())
    }

    async fn find_all_ordered_by_position(&self, stage: StageId) -> PositionStoreResult<Vec<Task>> {
        let state = self.state.read().map_err(poisoned)?;
        let tasks = state
            .tasks
            .values()
            .filter(|task| task.stage() == stage)
            .cloned()
            .collect();
        Ok(order_by_position(tasks))
    }

    async fn list_stages(&self, project: ProjectId) -> PositionStoreResult<Vec<Stage>> {
        let state = self.state.read().map_err(poisoned)?;
        let mut stages: Vec<Stage> = state
            .stages
            .values()
            .filter(|stage| stage.project() == project)
            .cloned()
            .collect();
        stages.sort_by_key(|stage| (stage.ordinal(), stage.id()));
        Ok(stages)
    }
}

/// Buffered unit of work over an [`InMemoryPositionStore`].
///
/// Reads see the committed state overlaid with this transaction's own
/// writes. Dropping the transaction discards the writes and releases its
/// stage locks. Commit re-checks task numbers and the stage of every
/// rewritten task against the committed state, the way row constraints and
/// `WHERE` filters do in `PostgreSQL`.
#[derive(Debug)]
pub struct InMemoryTransaction {
    state: Arc<RwLock<InMemoryBoardState>>,
    stage_locks: StageLocks,
    held_locks: HashMap<StageId, OwnedMutexGuard<()>>,
    pending_tasks: HashMap<TaskId, Task>,
    inserted_tasks: HashSet<TaskId>,
    /// Stage each pre-existing rewritten task was in when first written.
    expected_stages: HashMap<TaskId, StageId>,
    pending_stages: HashMap<StageId, Stage>,
}

impl InMemoryTransaction {
    fn task(&self, id: TaskId) -> PositionStoreResult<Option<Task>> {
        if let Some(task) = self.pending_tasks.get(&id) {
            return Ok(Some(task.clone()));
        }
        let state = self.state.read().map_err(poisoned)?;
        Ok(state.tasks.get(&id).cloned())
    }

    fn stage(&self, id: StageId) -> PositionStoreResult<Option<Stage>> {
        if let Some(stage) = self.pending_stages.get(&id) {
            return Ok(Some(stage.clone()));
        }
        let state = self.state.read().map_err(poisoned)?;
        Ok(state.stages.get(&id).cloned())
    }

    /// All tasks as this transaction sees them.
    fn visible_tasks(&self) -> PositionStoreResult<Vec<Task>> {
        let state = self.state.read().map_err(poisoned)?;
        let mut tasks: Vec<Task> = state
            .tasks
            .values()
            .filter(|task| !self.pending_tasks.contains_key(&task.id()))
            .cloned()
            .collect();
        tasks.extend(self.pending_tasks.values().cloned());
        Ok(tasks)
    }

    fn stage_tasks(
        &self,
        stage: StageId,
        excluding: Option<TaskId>,
    ) -> PositionStoreResult<Vec<Task>> {
        let tasks = self
            .visible_tasks()?
            .into_iter()
            .filter(|task| task.stage() == stage && Some(task.id()) != excluding)
            .collect();
        Ok(order_by_position(tasks))
    }

    fn visible_stages(&self) -> PositionStoreResult<Vec<Stage>> {
        let state = self.state.read().map_err(poisoned)?;
        let mut stages: Vec<Stage> = state.stages.values().cloned().collect();
        stages.extend(self.pending_stages.values().cloned());
        Ok(stages)
    }

    fn expect_stage(&mut self, current: &Task) {
        if !self.inserted_tasks.contains(&current.id()) {
            self.expected_stages
                .entry(current.id())
                .or_insert(current.stage());
        }
    }

    fn check_number_free(&self, task: &Task) -> PositionStoreResult<()> {
        let taken = self.visible_tasks()?.iter().any(|existing| {
            existing.project() == task.project() && existing.number() == task.number()
        });
        if taken {
            return Err(PositionStoreError::DuplicateTaskNumber {
                project: task.project(),
                number: task.number(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl PositionTransaction for InMemoryTransaction {
    async fn lock_stage(&mut self, stage: StageId) -> PositionStoreResult<()> {
        if self.held_locks.contains_key(&stage) {
            return Ok(());
        }
        let mutex = {
            let mut locks = self.stage_locks.lock().map_err(poisoned)?;
            Arc::clone(locks.entry(stage).or_default())
        };
        let guard = mutex.lock_owned().await;
        self.held_locks.insert(stage, guard);
        Ok(())
    }

    async fn find_by_id(&mut self, id: TaskId) -> PositionStoreResult<Option<Task>> {
        self.task(id)
    }

    async fn find_stage(&mut self, id: StageId) -> PositionStoreResult<Option<Stage>> {
        self.stage(id)
    }

    async fn find_max_position(
        &mut self,
        stage: StageId,
        excluding: Option<TaskId>,
    ) -> PositionStoreResult<Option<Position>> {
        Ok(self
            .stage_tasks(stage, excluding)?
            .last()
            .map(Task::position))
    }

    async fn find_predecessor(
        &mut self,
        following: &Task,
        excluding: Option<TaskId>,
    ) -> PositionStoreResult<Option<Task>> {
        let key = (following.position(), following.id());
        Ok(self
            .stage_tasks(following.stage(), excluding)?
            .into_iter()
            .rev()
            .find(|task| (task.position(), task.id()) < key))
    }

    async fn find_all_ordered_by_position(
        &mut self,
        stage: StageId,
    ) -> PositionStoreResult<Vec<Task>> {
        self.stage_tasks(stage, None)
    }

    async fn find_max_task_number(
        &mut self,
        project: ProjectId,
    ) -> PositionStoreResult<Option<TaskNumber>> {
        Ok(self
            .visible_tasks()?
            .iter()
            .filter(|task| task.project() == project)
            .map(Task::number)
            .max())
    }

    async fn find_max_stage_ordinal(
        &mut self,
        project: ProjectId,
    ) -> PositionStoreResult<Option<u32>> {
        Ok(self
            .visible_stages()?
            .iter()
            .filter(|stage| stage.project() == project)
            .map(Stage::ordinal)
            .max())
    }

    async fn insert_task(&mut self, task: &Task) -> PositionStoreResult<()> {
        if self.task(task.id())?.is_some() {
            return Err(PositionStoreError::DuplicateTask(task.id()));
        }
        if self.stage(task.stage())?.is_none() {
            return Err(PositionStoreError::StageNotFound(task.stage()));
        }
        self.check_number_free(task)?;
        self.inserted_tasks.insert(task.id());
        self.pending_tasks.insert(task.id(), task.clone());
        Ok(())
    }

    async fn insert_stage(&mut self, stage: &Stage) -> PositionStoreResult<()> {
        if self.stage(stage.id())?.is_some() {
            return Err(PositionStoreError::DuplicateStage(stage.id()));
        }
        self.pending_stages.insert(stage.id(), stage.clone());
        Ok(())
    }

    async fn update_position(&mut self, task: &Task) -> PositionStoreResult<()> {
        let mut current = self
            .task(task.id())?
            .ok_or(PositionStoreError::TaskNotFound(task.id()))?;
        self.expect_stage(&current);
        current.relocate(task.stage(), task.position(), task.updated_at());
        self.pending_tasks.insert(current.id(), current);
        Ok(())
    }

    async fn bulk_update_positions(
        &mut self,
        stage: StageId,
        updates: &[(TaskId, Position)],
    ) -> PositionStoreResult<()> {
        let mut staged = Vec::with_capacity(updates.len());
        for (id, position) in updates {
            let mut current = self
                .task(*id)?
                .ok_or(PositionStoreError::TaskNotFound(*id))?;
            if current.stage() != stage {
                return Err(PositionStoreError::TaskLeftStage { task: *id, stage });
            }
            current.set_position(*position);
            staged.push(current);
        }
        for task in staged {
            self.expect_stage(&task);
            self.pending_tasks.insert(task.id(), task);
        }
        Ok(())
    }

    async fn commit(mut self) -> PositionStoreResult<()> {
        let mut state = self.state.write().map_err(poisoned)?;
        for id in &self.inserted_tasks {
            if state.tasks.contains_key(id) {
                return Err(PositionStoreError::DuplicateTask(*id));
            }
        }
        for task in self
            .inserted_tasks
            .iter()
            .filter_map(|id| self.pending_tasks.get(id))
        {
            let taken = state.tasks.values().any(|existing| {
                existing.project() == task.project() && existing.number() == task.number()
            });
            if taken {
                return Err(PositionStoreError::DuplicateTaskNumber {
                    project: task.project(),
                    number: task.number(),
                });
            }
        }
        for (id, stage) in &self.expected_stages {
            match state.tasks.get(id) {
                None => return Err(PositionStoreError::TaskNotFound(*id)),
                Some(current) if current.stage() != *stage => {
                    return Err(PositionStoreError::TaskLeftStage {
                        task: *id,
                        stage: *stage,
                    });
                }
                Some(_) => {}
            }
        }
        for id in self.pending_stages.keys() {
            if state.stages.contains_key(id) {
                return Err(PositionStoreError::DuplicateStage(*id));
            }
        }
        state.stages.extend(self.pending_stages.drain());
        state.tasks.extend(self.pending_tasks.drain());
        Ok(())
    }

    async fn rollback(self) -> PositionStoreResult<()> {
        Ok(())
    }
}
