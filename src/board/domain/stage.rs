//! Stage aggregate: a column of the board.

use super::{BoardDomainError, ProjectId, StageId};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Validated, trimmed stage name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StageName(String);

impl StageName {
    /// Creates a stage name.
    ///
    /// # Errors
    ///
    /// Returns [`BoardDomainError::EmptyStageName`] when the value is empty
    /// after trimming.
    pub fn new(value: impl Into<String>) -> Result<Self, BoardDomainError> {
        let raw = value.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(BoardDomainError::EmptyStageName);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the name as `str`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stage aggregate root.
///
/// The tasks of a stage are never stored on the stage; they are derived by
/// querying tasks by stage and sorting them by position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    id: StageId,
    project: ProjectId,
    name: StageName,
    ordinal: u32,
    created_at: DateTime<Utc>,
}

/// Parameter object for reconstructing a persisted stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedStageData {
    /// Persisted stage identifier.
    pub id: StageId,
    /// Owning project.
    pub project: ProjectId,
    /// Column title.
    pub name: StageName,
    /// Column index on the board.
    pub ordinal: u32,
    /// Persisted creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Stage {
    /// Creates a stage at column index `ordinal`.
    #[must_use]
    pub fn new(project: ProjectId, name: StageName, ordinal: u32, clock: &impl Clock) -> Self {
        Self {
            id: StageId::new(),
            project,
            name,
            ordinal,
            created_at: clock.utc(),
        }
    }

    /// Reconstructs a stage from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedStageData) -> Self {
        Self {
            id: data.id,
            project: data.project,
            name: data.name,
            ordinal: data.ordinal,
            created_at: data.created_at,
        }
    }

    /// Returns the stage identifier.
    #[must_use]
    pub const fn id(&self) -> StageId {
        self.id
    }

    /// Returns the owning project.
    #[must_use]
    pub const fn project(&self) -> ProjectId {
        self.project
    }

    /// Returns the column title.
    #[must_use]
    pub const fn name(&self) -> &StageName {
        &self.name
    }

    /// Returns the column index on the board.
    #[must_use]
    pub const fn ordinal(&self) -> u32 {
        self.ordinal
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
