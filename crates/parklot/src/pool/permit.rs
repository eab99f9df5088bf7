//! The value a car holds while parked.

use std::sync::Arc;

use super::SlotPool;
use crate::status::StatusEvent;

/// Proof of one occupied slot.
///
/// `release` consumes the permit, so a slot is given back at most once.
/// Dropping an unreleased permit gives the slot back too (logged as a warning).
#[must_use = "dropping a permit releases its slot immediately"]
pub struct SlotPermit {
    pool: Arc<SlotPool>,
    car: String,
    waited: bool,
    released: bool,
}

impl SlotPermit {
    pub(super) fn new(pool: Arc<SlotPool>, car: &str, waited: bool) -> Self {
        Self {
            pool,
            car: car.to_string(),
            waited,
            released: false,
        }
    }

    pub fn car(&self) -> &str {
        &self.car
    }

    /// `true` if the car was queued before it got this slot.
    pub fn waited(&self) -> bool {
        self.waited
    }

    /// Leave the lot. Returns the `LEAVES` event that was emitted.
    pub fn release(mut self) -> StatusEvent {
        self.released = true;
        self.pool.release_slot(&self.car)
    }
}

impl Drop for SlotPermit {
    fn drop(&mut self) {
        if !self.released {
            tracing::warn!(car = %self.car, "SlotPermit dropped without release - returning slot");
            self.pool.release_slot(&self.car);
        }
    }
}

impl std::fmt::Debug for SlotPermit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlotPermit")
            .field("car", &self.car)
            .field("waited", &self.waited)
            .finish()
    }
}
