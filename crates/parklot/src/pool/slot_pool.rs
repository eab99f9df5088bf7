//! SlotPool implementation: a mutex-protected counter plus an explicit ticket queue.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use super::SlotPermit;
use crate::error::{AcquireError, PoolError};
use crate::status::{Action, PoolSnapshot, StatusEvent, StatusSink, TracingSink};

/// A car blocked in `acquire`, in arrival order.
struct Waiter {
    ticket: u64,
    car: String,
    grant: oneshot::Sender<()>,
}

struct PoolState {
    occupied: usize,
    queue: VecDeque<Waiter>,
    next_ticket: u64,
    next_seq: u64,
}

/// Fixed-capacity pool of parking slots.
///
/// All mutation of `occupied` and the queue happens under one lock, and every
/// status event is built and delivered under that same lock.
pub struct SlotPool {
    capacity: usize,
    state: StdMutex<PoolState>,
    sink: Arc<dyn StatusSink>,
}

impl SlotPool {
    /// Create a pool that reports through the tracing sink.
    pub fn new(capacity: usize) -> Result<Arc<Self>, PoolError> {
        Self::with_sink(capacity, Arc::new(TracingSink))
    }

    pub fn with_sink(capacity: usize, sink: Arc<dyn StatusSink>) -> Result<Arc<Self>, PoolError> {
        if capacity == 0 {
            return Err(PoolError::InvalidCapacity);
        }

        Ok(Arc::new(Self {
            capacity,
            state: StdMutex::new(PoolState {
                occupied: 0,
                queue: VecDeque::with_capacity(capacity),
                next_ticket: 0,
                next_seq: 0,
            }),
            sink,
        }))
    }

    /// Claim a slot without waiting.
    ///
    /// Fails when the lot is full or when any car is already queued.
    pub fn try_acquire(self: &Arc<Self>, car: &str) -> Option<SlotPermit> {
        let mut state = self.lock_state();
        if !self.can_enter(&state) {
            return None;
        }

        state.occupied += 1;
        self.emit(&mut state, car, Action::Enters);
        drop(state);

        Some(SlotPermit::new(Arc::clone(self), car, false))
    }

    /// Claim a slot, queueing behind earlier cars when the lot is full.
    ///
    /// Returns `AcquireError::Cancelled` if `cancel` fires before the slot is
    /// handed over. A hand-over that already happened wins over a later
    /// cancellation: the caller then owns the permit and must release it.
    pub async fn acquire(
        self: &Arc<Self>,
        car: &str,
        cancel: &CancellationToken,
    ) -> Result<SlotPermit, AcquireError> {
        let mut queued = {
            let mut state = self.lock_state();
            if self.can_enter(&state) {
                state.occupied += 1;
                self.emit(&mut state, car, Action::Enters);
                return Ok(SlotPermit::new(Arc::clone(self), car, false));
            }

            let (tx, rx) = oneshot::channel();
            let ticket = state.next_ticket;
            state.next_ticket += 1;
            state.queue.push_back(Waiter {
                ticket,
                car: car.to_string(),
                grant: tx,
            });
            self.emit(&mut state, car, Action::Waits);

            QueuedTicket {
                pool: self.as_ref(),
                car,
                ticket,
                grant: rx,
                armed: true,
            }
        };

        tokio::select! {
            biased;

            granted = &mut queued.grant => {
                queued.armed = false;
                match granted {
                    Ok(()) => Ok(SlotPermit::new(Arc::clone(self), car, true)),
                    Err(_) => {
                        tracing::error!(car, ticket = queued.ticket, "Ticket dropped without a grant");
                        self.withdraw(queued.ticket);
                        Err(AcquireError::Cancelled)
                    }
                }
            }

            _ = cancel.cancelled() => {
                queued.armed = false;
                if self.withdraw(queued.ticket) {
                    tracing::debug!(car, ticket = queued.ticket, "Cancelled while queued");
                    Err(AcquireError::Cancelled)
                } else {
                    tracing::debug!(car, ticket = queued.ticket, "Cancelled after hand-over, keeping slot");
                    Ok(SlotPermit::new(Arc::clone(self), car, true))
                }
            }
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn occupied(&self) -> usize {
        self.lock_state().occupied
    }

    pub fn free(&self) -> usize {
        self.capacity - self.occupied()
    }

    pub fn waiting(&self) -> usize {
        self.lock_state().queue.len()
    }

    /// All counts taken under a single lock.
    pub fn snapshot(&self) -> PoolSnapshot {
        let state = self.lock_state();
        self.snapshot_of(&state)
    }

    /// Give back one slot on behalf of `car`, then hand it to the oldest ticket.
    pub(super) fn release_slot(&self, car: &str) -> StatusEvent {
        let mut state = self.lock_state();
        debug_assert!(state.occupied > 0, "release with no occupied slot");
        state.occupied = state.occupied.saturating_sub(1);
        let event = self.emit(&mut state, car, Action::Leaves);
        self.hand_off(&mut state);
        event
    }

    /// Remove a ticket from the queue. `false` means it was already granted.
    fn withdraw(&self, ticket: u64) -> bool {
        let mut state = self.lock_state();
        match state.queue.iter().position(|w| w.ticket == ticket) {
            Some(idx) => {
                state.queue.remove(idx);
                true
            }
            None => false,
        }
    }

    fn hand_off(&self, state: &mut PoolState) {
        while state.occupied < self.capacity {
            let Some(waiter) = state.queue.pop_front() else {
                break;
            };

            state.occupied += 1;
            self.emit(state, &waiter.car, Action::Enters);

            if waiter.grant.send(()).is_err() {
                tracing::error!(car = %waiter.car, ticket = waiter.ticket, "Queued car vanished before hand-over");
                state.occupied -= 1;
                self.emit(state, &waiter.car, Action::Leaves);
            }
        }
    }

    fn can_enter(&self, state: &PoolState) -> bool {
        state.occupied < self.capacity && state.queue.is_empty()
    }

    fn snapshot_of(&self, state: &PoolState) -> PoolSnapshot {
        PoolSnapshot {
            capacity: self.capacity,
            occupied: state.occupied,
            free: self.capacity - state.occupied,
            waiting: state.queue.len(),
        }
    }

    fn emit(&self, state: &mut PoolState, car: &str, action: Action) -> StatusEvent {
        let seq = state.next_seq;
        state.next_seq += 1;
        let event = StatusEvent::new(seq, car, action, self.snapshot_of(state));
        self.sink.emit(&event);
        event
    }

    /// On poison: logs error and keeps going with the inner state.
    fn lock_state(&self) -> MutexGuard<'_, PoolState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!("Slot pool mutex poisoned - continuing with inner state");
                poisoned.into_inner()
            }
        }
    }
}

/// A ticket sitting in the queue for the duration of one `acquire`.
///
/// If the acquire future is dropped mid-wait, the ticket leaves the queue; if
/// the slot was already handed over, it is released again so it is not lost.
struct QueuedTicket<'a> {
    pool: &'a SlotPool,
    car: &'a str,
    ticket: u64,
    grant: oneshot::Receiver<()>,
    armed: bool,
}

impl Drop for QueuedTicket<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        if self.pool.withdraw(self.ticket) {
            tracing::debug!(car = self.car, ticket = self.ticket, "Acquire dropped while queued");
        } else {
            tracing::warn!(car = self.car, ticket = self.ticket, "Acquire dropped after hand-over - returning slot");
            self.pool.release_slot(self.car);
        }
    }
}
