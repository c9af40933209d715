//! Shared fixtures and a fault-injecting store for board service tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use crate::board::{
    adapters::memory::{InMemoryPositionStore, InMemoryTransaction},
    domain::{
        Position, ProjectId, Stage, StageId, StageName, Task, TaskId, TaskName, TaskNumber,
    },
    ports::{PositionStore, PositionStoreError, PositionStoreResult, PositionTransaction},
};
use async_trait::async_trait;
use mockable::DefaultClock;

/// A stage seeded with tasks at exact positions.
pub struct SeededStage {
    pub store: InMemoryPositionStore,
    pub project: ProjectId,
    pub stage: StageId,
    pub tasks: Vec<Task>,
}

impl SeededStage {
    /// Returns the identifier of the seeded task at `index`.
    pub fn id(&self, index: usize) -> TaskId {
        self.tasks
            .get(index)
            .map(Task::id)
            .expect("seeded task index should exist")
    }
}

/// Creates a stage in `project` on `store`.
pub fn seed_stage_in(store: &InMemoryPositionStore, project: ProjectId, ordinal: u32) -> StageId {
    let stage = Stage::new(
        project,
        StageName::new(format!("Stage {ordinal}")).expect("valid stage name"),
        ordinal,
        &DefaultClock,
    );
    let id = stage.id();
    store.seed_stage(stage).expect("stage seeding should succeed");
    id
}

/// Adds tasks named after their index at `positions` to `stage`.
pub fn seed_tasks_in(
    store: &InMemoryPositionStore,
    project: ProjectId,
    stage: StageId,
    first_number: u64,
    positions: &[i64],
) -> Vec<Task> {
    let tasks: Vec<Task> = positions
        .iter()
        .zip(first_number..)
        .map(|(position, number)| {
            Task::new(
                project,
                stage,
                TaskName::new(format!("Task {number}")).expect("valid task name"),
                TaskNumber::new(number).expect("valid task number"),
                Position::new(*position),
                &DefaultClock,
            )
        })
        .collect();
    store
        .seed_tasks(tasks.clone())
        .expect("task seeding should succeed");
    tasks
}

/// Builds a fresh store with one stage holding tasks at `positions`.
pub fn seeded_stage(positions: &[i64]) -> SeededStage {
    let store = InMemoryPositionStore::new();
    let project = ProjectId::new();
    let stage = seed_stage_in(&store, project, 0);
    let tasks = seed_tasks_in(&store, project, stage, 1, positions);
    SeededStage {
        store,
        project,
        stage,
        tasks,
    }
}

/// Reads `stage` back as `(id, position)` pairs in display order.
pub async fn ordered<S: PositionStore>(store: &S, stage: StageId) -> Vec<(TaskId, i64)> {
    store
        .find_all_ordered_by_position(stage)
        .await
        .expect("stage read should succeed")
        .iter()
        .map(|task| (task.id(), task.position().value()))
        .collect()
}

/// Switches controlling which operations of a [`FaultyStore`] misbehave.
#[derive(Debug, Default)]
pub struct Faults {
    fail_commit: AtomicBool,
    ignore_bulk_updates: AtomicBool,
    stall_locks: AtomicBool,
    bulk_updates: AtomicUsize,
    commits: AtomicUsize,
}

impl Faults {
    pub fn fail_commits(&self) {
        self.fail_commit.store(true, Ordering::SeqCst);
    }

    pub fn ignore_bulk_updates(&self) {
        self.ignore_bulk_updates.store(true, Ordering::SeqCst);
    }

    pub fn stall_locks(&self) {
        self.stall_locks.store(true, Ordering::SeqCst);
    }

    pub fn heal(&self) {
        self.fail_commit.store(false, Ordering::SeqCst);
        self.ignore_bulk_updates.store(false, Ordering::SeqCst);
        self.stall_locks.store(false, Ordering::SeqCst);
    }

    pub fn bulk_updates(&self) -> usize {
        self.bulk_updates.load(Ordering::SeqCst)
    }

    pub fn commits(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }
}

/// Wraps the in-memory store and injects failures on demand.
#[derive(Debug, Clone)]
pub struct FaultyStore {
    inner: InMemoryPositionStore,
    pub faults: Arc<Faults>,
}

impl FaultyStore {
    pub fn new(inner: InMemoryPositionStore) -> Self {
        Self {
            inner,
            faults: Arc::new(Faults::default()),
        }
    }
}

#[async_trait]
impl PositionStore for FaultyStore {
    type Transaction = FaultyTransaction;

    async fn begin(&self) -> PositionStoreResult<Self::Transaction> {
        Ok(FaultyTransaction {
            inner: self.inner.begin().await?,
            faults: Arc::clone(&self.faults),
        })
    }

    async fn find_by_id(&self, id: TaskId) -> PositionStoreResult<Option<Task>> {
        self.inner.find_by_id(id).await
    }

    async fn find_stage(&self, id: StageId) -> PositionStoreResult<Option<Stage>> {
        self.inner.find_stage(id).await
    }

    async fn find_all_ordered_by_position(&self, stage: StageId) -> PositionStoreResult<Vec<Task>> {
        self.inner.find_all_ordered_by_position(stage).await
    }

    async fn list_stages(&self, project: ProjectId) -> PositionStoreResult<Vec<Stage>> {
        self.inner.list_stages(project).await
    }
}

/// Transaction of a [`FaultyStore`].
#[derive(Debug)]
pub struct FaultyTransaction {
    inner: InMemoryTransaction,
    faults: Arc<Faults>,
}

#[async_trait]
impl PositionTransaction for FaultyTransaction {
    async fn lock_stage(&mut self, stage: StageId) -> PositionStoreResult<()> {
        self.inner.lock_stage(stage).await?;
        if self.faults.stall_locks.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        Ok(())
    }

    async fn find_by_id(&mut self, id: TaskId) -> PositionStoreResult<Option<Task>> {
        self.inner.find_by_id(id).await
    }

    async fn find_stage(&mut self, id: StageId) -> PositionStoreResult<Option<Stage>> {
        self.inner.find_stage(id).await
    }

    async fn find_max_position(
        &mut self,
        stage: StageId,
        excluding: Option<TaskId>,
    ) -> PositionStoreResult<Option<Position>> {
        self.inner.find_max_position(stage, excluding).await
    }

    async fn find_predecessor(
        &mut self,
        following: &Task,
        excluding: Option<TaskId>,
    ) -> PositionStoreResult<Option<Task>> {
        self.inner.find_predecessor(following, excluding).await
    }

    async fn find_all_ordered_by_position(
        &mut self,
        stage: StageId,
    ) -> PositionStoreResult<Vec<Task>> {
        self.inner.find_all_ordered_by_position(stage).await
    }

    async fn find_max_task_number(
        &mut self,
        project: ProjectId,
    ) -> PositionStoreResult<Option<TaskNumber>> {
        self.inner.find_max_task_number(project).await
    }

    async fn find_max_stage_ordinal(
        &mut self,
        project: ProjectId,
    ) -> PositionStoreResult<Option<u32>> {
        self.inner.find_max_stage_ordinal(project).await
    }

    async fn insert_task(&mut self, task: &Task) -> PositionStoreResult<()> {
        self.inner.insert_task(task).await
    }

    async fn insert_stage(&mut self, stage: &Stage) -> PositionStoreResult<()> {
        self.inner.insert_stage(stage).await
    }

    async fn update_position(&mut self, task: &Task) -> PositionStoreResult<()> {
        self.inner.update_position(task).await
    }

    async fn bulk_update_positions(
        &mut self,
        stage: StageId,
        updates: &[(TaskId, Position)],
    ) -> PositionStoreResult<()> {
        self.faults.bulk_updates.fetch_add(1, Ordering::SeqCst);
        if self.faults.ignore_bulk_updates.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.inner.bulk_update_positions(stage, updates).await
    }

    async fn commit(self) -> PositionStoreResult<()> {
        if self.faults.fail_commit.load(Ordering::SeqCst) {
            return Err(PositionStoreError::persistence(std::io::Error::other(
                "injected commit failure",
            )));
        }
        self.faults.commits.fetch_add(1, Ordering::SeqCst);
        self.inner.commit().await
    }

    async fn rollback(self) -> PositionStoreResult<()> {
        self.inner.rollback().await
    }
}
