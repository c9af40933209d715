//! Diesel row models for board persistence.

use super::schema::{stages, tasks};
use chrono::{DateTime, Utc};
use diesel::prelude::*;

/// Query result row for task records.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = tasks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TaskRow {
    /// Task identifier.
    pub id: uuid::Uuid,
    /// Owning project.
    pub project_id: uuid::Uuid,
    /// Stage currently holding the task.
    pub stage_id: uuid::Uuid,
    /// Sort key within the stage.
    pub position: i64,
    /// Per-project sequence number.
    pub task_number: i64,
    /// Display name.
    pub name: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Insert model for task records.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = tasks)]
pub struct NewTaskRow {
    /// Task identifier.
    pub id: uuid::Uuid,
    /// Owning project.
    pub project_id: uuid::Uuid,
    /// Stage holding the task.
    pub stage_id: uuid::Uuid,
    /// Sort key within the stage.
    pub position: i64,
    /// Per-project sequence number.
    pub task_number: i64,
    /// Display name.
    pub name: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Query result row for stage records.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = stages)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct StageRow {
    /// Stage identifier.
    pub id: uuid::Uuid,
    /// Owning project.
    pub project_id: uuid::Uuid,
    /// Column title.
    pub name: String,
    /// Column index on the board.
    pub ordinal: i32,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Insert model for stage records.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = stages)]
pub struct NewStageRow {
    /// Stage identifier.
    pub id: uuid::Uuid,
    /// Owning project.
    pub project_id: uuid::Uuid,
    /// Column title.
    pub name: String,
    /// Column index on the board.
    pub ordinal: i32,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}
