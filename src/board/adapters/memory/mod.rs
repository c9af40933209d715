//! In-memory adapters for board ordering.

mod store;

pub use store::{InMemoryPositionStore, InMemoryTransaction};
