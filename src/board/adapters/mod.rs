//! Adapter implementations for board ordering ports.

pub mod memory;
pub mod postgres;
