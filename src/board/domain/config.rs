//! Tunables for sort-key allocation, rebalancing and move deadlines.

use super::BoardDomainError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Ordering engine configuration.
///
/// Deserialises from the embedding service's configuration; missing fields
/// fall back to [`OrderingConfig::default`].
///
/// # Examples
///
/// ```
/// use taskboard::board::domain::OrderingConfig;
///
/// let config: OrderingConfig =
///     serde_json::from_str(r#"{"attempt_timeout_ms": 500}"#).expect("valid config");
/// assert_eq!(config.increment, 65_536);
/// assert_eq!(config.attempt_timeout.as_millis(), 500);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderingConfig {
    /// Distance between consecutive tasks after an append or a rebalance.
    pub increment: i64,
    /// Midpoint keys below this value mean the stage has run out of room.
    pub min_gap: i64,
    /// Rebalances a single move may trigger before giving up.
    pub max_rebalances: u32,
    /// Deadline applied to each move attempt and each rebalance.
    #[serde(rename = "attempt_timeout_ms", with = "duration_millis")]
    pub attempt_timeout: Duration,
}

impl OrderingConfig {
    /// Default spacing between tasks.
    pub const DEFAULT_INCREMENT: i64 = 65_536;

    /// Default exhaustion threshold.
    pub const DEFAULT_MIN_GAP: i64 = 50;

    /// Creates a configuration with small spacing, useful to exercise
    /// rebalancing in tests with few moves.
    #[must_use]
    pub fn compact() -> Self {
        Self {
            increment: 64,
            min_gap: 4,
            ..Self::default()
        }
    }

    /// Returns a copy with a different per-attempt deadline.
    #[must_use]
    pub const fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Returns a copy with a different rebalance ceiling.
    #[must_use]
    pub const fn with_max_rebalances(mut self, max_rebalances: u32) -> Self {
        self.max_rebalances = max_rebalances;
        self
    }

    /// Checks that the values can drive the allocator.
    ///
    /// # Errors
    ///
    /// Returns [`BoardDomainError::InvalidConfig`] for a non-positive
    /// increment, a negative minimum gap, a minimum gap not smaller than the
    /// increment, or a zero deadline.
    pub fn validate(&self) -> Result<(), BoardDomainError> {
        if self.increment <= 0 {
            return Err(BoardDomainError::InvalidConfig(format!(
                "increment must be positive, got {}",
                self.increment
            )));
        }
        if self.min_gap < 0 || self.min_gap >= self.increment {
            return Err(BoardDomainError::InvalidConfig(format!(
                "min_gap must be within 0..{}, got {}",
                self.increment, self.min_gap
            )));
        }
        if self.attempt_timeout.is_zero() {
            return Err(BoardDomainError::InvalidConfig(
                "attempt_timeout must be non-zero".to_owned(),
            ));
        }
        Ok(())
    }
}

impl Default for OrderingConfig {
    fn default() -> Self {
        Self {
            increment: Self::DEFAULT_INCREMENT,
            min_gap: Self::DEFAULT_MIN_GAP,
            max_rebalances: 2,
            attempt_timeout: Duration::from_secs(2),
        }
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let millis = u64::try_from(value.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(millis)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
