//! Kanban board ordering.
//!
//! Tasks live in stages and are ordered inside a stage by a sparse integer
//! sort key. Moving a task rewrites only that task's key; when two
//! neighbours sit too close together the stage is evenly respaced and the
//! move is retried. The module follows hexagonal architecture:
//!
//! - Domain types and the pure key allocator in [`domain`]
//! - Port contracts in [`ports`]
//! - In-memory and `PostgreSQL` adapters in [`adapters`]
//! - Move orchestration, rebalancing and board bookkeeping in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;
