//! Simulation configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::car::HoldTime;
use crate::error::ConfigError;

/// Everything the launcher needs to run one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Number of slots in the lot.
    pub capacity: usize,
    /// Number of cars in the batch.
    pub car_count: usize,
    /// Shortest time a car stays parked.
    pub min_hold_ms: u64,
    /// Width of the random extra on top of `min_hold_ms`.
    pub hold_span_ms: u64,
    /// Seed for hold-time sampling; `None` draws from OS entropy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            capacity: Self::DEFAULT_CAPACITY,
            car_count: Self::DEFAULT_CAR_COUNT,
            min_hold_ms: Self::DEFAULT_MIN_HOLD_MS,
            hold_span_ms: Self::DEFAULT_HOLD_SPAN_MS,
            seed: None,
        }
    }
}

impl SimulationConfig {
    pub const DEFAULT_CAPACITY: usize = 3;
    pub const DEFAULT_CAR_COUNT: usize = 7;
    pub const DEFAULT_MIN_HOLD_MS: u64 = 1_000;
    pub const DEFAULT_HOLD_SPAN_MS: u64 = 3_000;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_car_count(mut self, car_count: usize) -> Self {
        self.car_count = car_count;
        self
    }

    pub fn with_hold(mut self, min_hold_ms: u64, hold_span_ms: u64) -> Self {
        self.min_hold_ms = min_hold_ms;
        self.hold_span_ms = hold_span_ms;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn hold_time(&self) -> HoldTime {
        HoldTime::new(
            Duration::from_millis(self.min_hold_ms),
            Duration::from_millis(self.hold_span_ms),
        )
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::InvalidCapacity(self.capacity));
        }
        if self.car_count == 0 {
            return Err(ConfigError::InvalidCarCount(self.car_count));
        }
        Ok(())
    }
}
