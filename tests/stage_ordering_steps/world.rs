//! Shared world state for stage ordering BDD scenarios.

use std::collections::HashMap;
use std::sync::Arc;

use mockable::DefaultClock;
use rstest::fixture;
use taskboard::board::{
    adapters::memory::InMemoryPositionStore,
    domain::{ProjectId, StageId, Task, TaskId},
    services::{MoveOrchestrator, OrderingError},
};

/// Orchestrator type used by the BDD world.
pub type TestMover = MoveOrchestrator<InMemoryPositionStore, DefaultClock>;

/// Scenario world for stage ordering behaviour tests.
pub struct OrderingWorld {
    pub store: InMemoryPositionStore,
    pub mover: TestMover,
    pub project: ProjectId,
    pub stages: HashMap<String, StageId>,
    pub tasks: HashMap<String, TaskId>,
    pub current_stage: Option<StageId>,
    pub next_number: u64,
    pub last_move_result: Option<Result<Task, OrderingError>>,
}

impl OrderingWorld {
    /// Creates a world over an empty store.
    #[must_use]
    pub fn new() -> Self {
        let store = InMemoryPositionStore::new();
        let mover = MoveOrchestrator::new(Arc::new(store.clone()), Arc::new(DefaultClock));
        Self {
            store,
            mover,
            project: ProjectId::new(),
            stages: HashMap::new(),
            tasks: HashMap::new(),
            current_stage: None,
            next_number: 1,
            last_move_result: None,
        }
    }

    /// Resolves a stage name used in a step.
    pub fn stage(&self, name: &str) -> Result<StageId, eyre::Report> {
        self.stages
            .get(name)
            .copied()
            .ok_or_else(|| eyre::eyre!("unknown stage {name:?} in scenario world"))
    }

    /// Resolves a task name used in a step.
    pub fn task(&self, name: &str) -> Result<TaskId, eyre::Report> {
        self.tasks
            .get(name)
            .copied()
            .ok_or_else(|| eyre::eyre!("unknown task {name:?} in scenario world"))
    }

    /// Maps a task identifier back to its scenario name.
    pub fn name_of(&self, id: TaskId) -> Option<&str> {
        self.tasks
            .iter()
            .find(|(_, task)| **task == id)
            .map(|(name, _)| name.as_str())
    }
}

impl Default for OrderingWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixture that creates a new scenario world.
#[fixture]
pub fn world() -> OrderingWorld {
    OrderingWorld::default()
}

/// Runs an async operation within sync step definitions.
pub fn run_async<T>(future: impl std::future::Future<Output = T>) -> T {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}
