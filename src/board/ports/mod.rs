//! Port contracts for board ordering.
//!
//! Ports define infrastructure-agnostic interfaces used by board services.

pub mod store;

pub use store::{PositionStore, PositionStoreError, PositionStoreResult, PositionTransaction};
