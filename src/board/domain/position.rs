//! Integer sort key that orders tasks inside a stage.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Sort key of a task within its stage.
///
/// Positions carry no meaning beyond ordering comparisons between tasks of
/// the same stage. Values are sparse so new keys can usually be placed
/// between two neighbours without renumbering the stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Position(i64);

impl Position {
    /// Position of a task placed in front of every other task.
    pub const HEAD: Self = Self(0);

    /// Creates a position from its raw value.
    #[must_use]
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the raw sort key.
    #[must_use]
    pub const fn value(self) -> i64 {
        self.0
    }

    /// Adds `step`, returning `None` on overflow.
    #[must_use]
    pub const fn checked_add(self, step: i64) -> Option<Self> {
        match self.0.checked_add(step) {
            Some(value) => Some(Self(value)),
            None => None,
        }
    }

    /// Floor of the arithmetic mean of `self` and `other`.
    ///
    /// Computed as `low + (high - low) / 2` so that large keys do not
    /// overflow; `None` only when the distance itself overflows.
    #[must_use]
    pub fn midpoint(self, other: Self) -> Option<Self> {
        let (low, high) = if self <= other {
            (self.0, other.0)
        } else {
            (other.0, self.0)
        };
        let half_gap = high.checked_sub(low)?.div_euclid(2);
        low.checked_add(half_gap).map(Self)
    }

    /// Position of the task at `ordinal` (1-based) after an even respacing
    /// with the given `increment`.
    #[must_use]
    pub fn spaced(ordinal: usize, increment: i64) -> Option<Self> {
        let index = i64::try_from(ordinal).ok()?;
        index.checked_mul(increment).map(Self)
    }
}

impl From<i64> for Position {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
