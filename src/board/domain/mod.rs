//! Domain model for board ordering.
//!
//! Tasks, stages and the sparse integer sort keys that order tasks within a
//! stage. The allocator lives here because it is pure: it decides keys from
//! neighbour positions and never touches storage.

mod allocator;
mod config;
mod error;
mod ids;
mod position;
mod stage;
mod task;

pub use allocator::{Allocation, SortKeyAllocator};
pub use config::OrderingConfig;
pub use error::BoardDomainError;
pub use ids::{ProjectId, StageId, TaskId, TaskNumber};
pub use position::Position;
pub use stage::{PersistedStageData, Stage, StageName};
pub use task::{PersistedTaskData, Task, TaskName};
