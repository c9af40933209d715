//! Application services for board ordering.

mod board;
mod error;
mod placement;
mod rebalance;
mod unit_of_work;

pub use board::{BoardService, CreateStageRequest, CreateTaskRequest};
pub use error::{OrderingError, OrderingResult};
pub use placement::{MoveOrchestrator, MoveTaskRequest};
pub use rebalance::StageRebalancer;
