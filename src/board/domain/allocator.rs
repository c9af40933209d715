//! Pure sort-key allocation between two neighbouring positions.

use super::{OrderingConfig, Position};

/// Outcome of a sort-key allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Allocation {
    /// A usable key strictly inside the requested gap.
    Position(Position),
    /// The gap is exhausted; the stage must be respaced before retrying.
    NeedsRebalance,
}

impl Allocation {
    /// Returns the allocated position, if any.
    #[must_use]
    pub const fn position(self) -> Option<Position> {
        match self {
            Self::Position(position) => Some(position),
            Self::NeedsRebalance => None,
        }
    }
}

/// Computes new sort keys from neighbour positions.
///
/// The allocator performs no I/O: callers look the neighbours up and pass
/// their positions in.
///
/// # Examples
///
/// ```
/// use taskboard::board::domain::{Allocation, Position, SortKeyAllocator};
///
/// let allocator = SortKeyAllocator::default();
/// let between = allocator.allocate(Some(Position::new(100_000)), Some(Position::new(200_000)));
/// assert_eq!(between, Allocation::Position(Position::new(150_000)));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKeyAllocator {
    increment: i64,
    min_gap: i64,
}

impl SortKeyAllocator {
    /// Creates an allocator with explicit spacing parameters.
    #[must_use]
    pub const fn new(increment: i64, min_gap: i64) -> Self {
        Self { increment, min_gap }
    }

    /// Creates an allocator from the engine configuration.
    #[must_use]
    pub const fn from_config(config: &OrderingConfig) -> Self {
        Self::new(config.increment, config.min_gap)
    }

    /// Returns the append spacing.
    #[must_use]
    pub const fn increment(&self) -> i64 {
        self.increment
    }

    /// Allocates a key after `left` and before `right`.
    ///
    /// - No `right`: append after `left` (or start the stage at one increment).
    /// - No `left` but a `right`: the new first element gets [`Position::HEAD`].
    /// - Both: the floor of their mean.
    ///
    /// A midpoint below the minimum gap, or any key that would not sort
    /// strictly between its neighbours, yields [`Allocation::NeedsRebalance`].
    #[must_use]
    pub fn allocate(&self, left: Option<Position>, right: Option<Position>) -> Allocation {
        match (left, right) {
            (None, None) => Allocation::Position(Position::new(self.increment)),
            (Some(left), None) => left
                .checked_add(self.increment)
                .map_or(Allocation::NeedsRebalance, Allocation::Position),
            (None, Some(right)) => {
                if Position::HEAD < right {
                    Allocation::Position(Position::HEAD)
                } else {
                    Allocation::NeedsRebalance
                }
            }
            (Some(left), Some(right)) => self.between(left, right),
        }
    }

    fn between(&self, left: Position, right: Position) -> Allocation {
        let Some(candidate) = left.midpoint(right) else {
            return Allocation::NeedsRebalance;
        };
        if candidate.value() < self.min_gap || candidate <= left || candidate >= right {
            return Allocation::NeedsRebalance;
        }
        Allocation::Position(candidate)
    }
}

impl Default for SortKeyAllocator {
    fn default() -> Self {
        Self::new(OrderingConfig::DEFAULT_INCREMENT, OrderingConfig::DEFAULT_MIN_GAP)
    }
}
