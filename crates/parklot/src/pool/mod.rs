//! Bounded slot pool with strict FIFO admission.
//!
//! Admission rules:
//! - `try_acquire` only succeeds when a slot is free AND nobody is queued
//! - `acquire` queues a ticket when it cannot enter at once
//! - `release` hands the freed slot straight to the oldest ticket, so a later
//!   arrival can never overtake a queued car
//!
//! A held slot is represented by a [`SlotPermit`]; releasing consumes it.

mod permit;
mod slot_pool;

pub use permit::SlotPermit;
pub use slot_pool::SlotPool;
