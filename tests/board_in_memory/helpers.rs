//! Shared fixtures for in-memory board integration tests.

use std::sync::{Arc, Once};

use mockable::DefaultClock;
use rstest::fixture;
use taskboard::board::{
    adapters::memory::InMemoryPositionStore,
    domain::{
        OrderingConfig, Position, ProjectId, Stage, StageId, StageName, Task, TaskId, TaskName,
        TaskNumber,
    },
    ports::PositionStore,
    services::{BoardService, MoveOrchestrator, StageRebalancer},
};
use tracing_subscriber::{EnvFilter, fmt};

static TRACING: Once = Once::new();

/// Installs a test-captured subscriber once per test binary.
///
/// Rebalance and retry events show up for failing tests; widen with
/// `RUST_LOG=taskboard=debug`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        fmt().with_env_filter(filter).with_test_writer().init();
    });
}

/// Services wired to one shared in-memory store.
pub struct Board {
    pub store: InMemoryPositionStore,
    pub service: BoardService<InMemoryPositionStore, DefaultClock>,
    pub mover: MoveOrchestrator<InMemoryPositionStore, DefaultClock>,
    pub rebalancer: StageRebalancer<InMemoryPositionStore>,
    pub project: ProjectId,
}

impl Board {
    /// Wires services over `store` for a fresh project.
    pub fn over(store: InMemoryPositionStore) -> Self {
        let shared = Arc::new(store.clone());
        let clock = Arc::new(DefaultClock);
        Self {
            service: BoardService::new(Arc::clone(&shared), Arc::clone(&clock)),
            mover: MoveOrchestrator::new(Arc::clone(&shared), clock),
            rebalancer: StageRebalancer::new(shared, OrderingConfig::default()),
            store,
            project: ProjectId::new(),
        }
    }

    /// Seeds a stage holding tasks at exact `positions`.
    ///
    /// Task numbers start at `first_number` so several seeded stages of the
    /// same project do not collide.
    pub fn seed(
        &self,
        ordinal: u32,
        first_number: u64,
        positions: &[i64],
    ) -> (StageId, Vec<TaskId>) {
        let stage = Stage::new(
            self.project,
            StageName::new(format!("Stage {ordinal}")).expect("valid stage name"),
            ordinal,
            &DefaultClock,
        );
        let stage_id = stage.id();
        self.store.seed_stage(stage).expect("stage seeding should succeed");
        let tasks: Vec<Task> = positions
            .iter()
            .zip(first_number..)
            .map(|(position, number)| {
                Task::new(
                    self.project,
                    stage_id,
                    TaskName::new(format!("Task {number}")).expect("valid task name"),
                    TaskNumber::new(number).expect("valid task number"),
                    Position::new(*position),
                    &DefaultClock,
                )
            })
            .collect();
        let ids = tasks.iter().map(Task::id).collect();
        self.store.seed_tasks(tasks).expect("task seeding should succeed");
        (stage_id, ids)
    }

    /// Reads a stage as `(id, position)` pairs in display order.
    pub async fn ordered(&self, stage: StageId) -> Vec<(TaskId, i64)> {
        self.store
            .find_all_ordered_by_position(stage)
            .await
            .expect("stage read should succeed")
            .iter()
            .map(|task| (task.id(), task.position().value()))
            .collect()
    }

    /// Reads a stage's task identifiers in display order.
    pub async fn order(&self, stage: StageId) -> Vec<TaskId> {
        self.ordered(stage).await.into_iter().map(|(id, _)| id).collect()
    }
}

/// Provides a board over an empty in-memory store.
#[fixture]
pub fn board() -> Board {
    init_tracing();
    Board::over(InMemoryPositionStore::new())
}
