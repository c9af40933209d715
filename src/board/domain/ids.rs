//! Identifier and validated scalar types for the board domain.

use super::BoardDomainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a task (a card on the board).
///
/// Identifiers are totally ordered so they can break ties between tasks
/// that share a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Creates a new random task identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a task identifier from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the wrapped UUID.
    #[must_use]
    pub const fn into_inner(self) -> Uuid {
        self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl AsRef<Uuid> for TaskId {
    fn as_ref(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a stage (a column on the board).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StageId(Uuid);

impl StageId {
    /// Creates a new random stage identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a stage identifier from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the wrapped UUID.
    #[must_use]
    pub const fn into_inner(self) -> Uuid {
        self.0
    }
}

impl Default for StageId {
    fn default() -> Self {
        Self::new()
    }
}

impl AsRef<Uuid> for StageId {
    fn as_ref(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of the project (board) that owns stages and tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(Uuid);

impl ProjectId {
    /// Creates a new random project identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a project identifier from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the wrapped UUID.
    #[must_use]
    pub const fn into_inner(self) -> Uuid {
        self.0
    }
}

impl Default for ProjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-project task sequence number, shown to users as `#<number>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskNumber(u64);

impl TaskNumber {
    /// Largest task number representable in the current `PostgreSQL` schema.
    const MAX_PERSISTED_VALUE: u64 = i64::MAX as u64;

    /// The number assigned to the first task of a project.
    pub const FIRST: Self = Self(1);

    /// Creates a validated task number.
    ///
    /// # Errors
    ///
    /// Returns [`BoardDomainError::InvalidTaskNumber`] when the value is zero
    /// or exceeds the schema-backed maximum (`i64::MAX`).
    pub const fn new(value: u64) -> Result<Self, BoardDomainError> {
        if value == 0 || value > Self::MAX_PERSISTED_VALUE {
            return Err(BoardDomainError::InvalidTaskNumber(value));
        }
        Ok(Self(value))
    }

    /// Returns the number following this one.
    ///
    /// # Errors
    ///
    /// Returns [`BoardDomainError::InvalidTaskNumber`] when the sequence is
    /// exhausted.
    pub const fn next(self) -> Result<Self, BoardDomainError> {
        match self.0.checked_add(1) {
            Some(value) => Self::new(value),
            None => Err(BoardDomainError::InvalidTaskNumber(u64::MAX)),
        }
    }

    /// Returns the underlying numeric value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
