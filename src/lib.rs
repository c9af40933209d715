//! Taskboard: ordering engine for Kanban boards.
//!
//! This crate keeps tasks in a user-defined order inside board stages and
//! lets callers move a task between stages or within one, touching as few
//! rows as possible.
//!
//! # Architecture
//!
//! Taskboard follows hexagonal architecture principles:
//!
//! - **Domain**: Pure ordering logic with no infrastructure dependencies
//! - **Ports**: Abstract trait interfaces for storage and transactions
//! - **Adapters**: Concrete implementations of ports (in-memory, `PostgreSQL`)
//!
//! # Modules
//!
//! - [`board`]: Stages, tasks, sort-key allocation and task moves

pub mod board;
