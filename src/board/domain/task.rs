//! Task aggregate: a card placed at one position in one stage.

use super::{BoardDomainError, Position, ProjectId, StageId, TaskId, TaskNumber};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Validated, trimmed task name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskName(String);

impl TaskName {
    /// Creates a task name.
    ///
    /// # Errors
    ///
    /// Returns [`BoardDomainError::EmptyTaskName`] when the value is empty
    /// after trimming.
    pub fn new(value: impl Into<String>) -> Result<Self, BoardDomainError> {
        let raw = value.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(BoardDomainError::EmptyTaskName);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the name as `str`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Task aggregate root.
///
/// A task is always in exactly one stage at exactly one position; moving it
/// rewrites both fields together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    id: TaskId,
    project: ProjectId,
    stage: StageId,
    position: Position,
    number: TaskNumber,
    name: TaskName,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Parameter object for reconstructing a persisted task aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedTaskData {
    /// Persisted task identifier.
    pub id: TaskId,
    /// Owning project.
    pub project: ProjectId,
    /// Stage currently holding the task.
    pub stage: StageId,
    /// Sort key within the stage.
    pub position: Position,
    /// Per-project sequence number.
    pub number: TaskNumber,
    /// Display name.
    pub name: TaskName,
    /// Persisted creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Persisted latest modification timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Creates a task placed at `position` in `stage`.
    #[must_use]
    pub fn new(
        project: ProjectId,
        stage: StageId,
        name: TaskName,
        number: TaskNumber,
        position: Position,
        clock: &impl Clock,
    ) -> Self {
        let timestamp = clock.utc();
        Self {
            id: TaskId::new(),
            project,
            stage,
            position,
            number,
            name,
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    /// Reconstructs a task from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedTaskData) -> Self {
        Self {
            id: data.id,
            project: data.project,
            stage: data.stage,
            position: data.position,
            number: data.number,
            name: data.name,
            created_at: data.created_at,
            updated_at: data.updated_at,
        }
    }

    /// Returns the task identifier.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// Returns the owning project.
    #[must_use]
    pub const fn project(&self) -> ProjectId {
        self.project
    }

    /// Returns the stage currently holding the task.
    #[must_use]
    pub const fn stage(&self) -> StageId {
        self.stage
    }

    /// Returns the sort key within the stage.
    #[must_use]
    pub const fn position(&self) -> Position {
        self.position
    }

    /// Returns the per-project sequence number.
    #[must_use]
    pub const fn number(&self) -> TaskNumber {
        self.number
    }

    /// Returns the display name.
    #[must_use]
    pub const fn name(&self) -> &TaskName {
        &self.name
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the latest modification timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Places the task at `position` in `stage`.
    pub fn place(&mut self, stage: StageId, position: Position, clock: &impl Clock) {
        self.relocate(stage, position, clock.utc());
    }

    /// Places the task at `position` in `stage` with an explicit
    /// modification time, as read back from storage.
    pub const fn relocate(&mut self, stage: StageId, position: Position, at: DateTime<Utc>) {
        self.stage = stage;
        self.position = position;
        self.updated_at = at;
    }

    /// Overwrites the sort key without touching the stage or timestamps.
    ///
    /// Used when a rebalance rewrites keys that callers already hold.
    pub const fn set_position(&mut self, position: Position) {
        self.position = position;
    }
}
