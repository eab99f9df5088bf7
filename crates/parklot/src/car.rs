//! Car driver: one concurrent participant competing for a slot.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::AcquireError;
use crate::pool::SlotPool;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CarState {
    Waiting,
    Admitted,
    Parked,
    Departed,
    Interrupted,
}

impl CarState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Departed | Self::Interrupted)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Admitted => "admitted",
            Self::Parked => "parked",
            Self::Departed => "departed",
            Self::Interrupted => "interrupted",
        }
    }
}

/// How a car's run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CarOutcome {
    /// Parked for the full hold time, then left.
    Departed,
    /// Cancelled in the queue; never held a slot.
    InterruptedWaiting,
    /// Cancelled while parked; the slot was still released.
    InterruptedParked,
}

impl CarOutcome {
    pub fn is_interrupted(&self) -> bool {
        !matches!(self, Self::Departed)
    }

    pub fn final_state(&self) -> CarState {
        match self {
            Self::Departed => CarState::Departed,
            Self::InterruptedWaiting | Self::InterruptedParked => CarState::Interrupted,
        }
    }
}

/// Summary of one finished car.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CarReport {
    pub car: String,
    pub outcome: CarOutcome,
    /// Whether the car had to queue before entering.
    pub waited: bool,
    pub hold_ms: u64,
    /// Time from arrival to admission (or to cancellation).
    pub wait_ms: u64,
}

/// Hold-time distribution: `min + U[0, span)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HoldTime {
    min: Duration,
    span: Duration,
}

impl HoldTime {
    pub fn new(min: Duration, span: Duration) -> Self {
        Self { min, span }
    }

    pub fn min(&self) -> Duration {
        self.min
    }

    pub fn span(&self) -> Duration {
        self.span
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        if self.span.is_zero() {
            return self.min;
        }
        self.min + rng.random_range(Duration::ZERO..self.span)
    }
}

/// A car with a fixed label and a hold time drawn once up front.
///
/// Its state is published on a watch channel so observers can follow the
/// car after `run` has taken ownership of it.
#[derive(Debug)]
pub struct Car {
    id: String,
    hold: Duration,
    state: watch::Sender<CarState>,
}

impl Car {
    pub fn new(id: impl Into<String>, hold: Duration) -> Self {
        Self {
            id: id.into(),
            hold,
            state: watch::Sender::new(CarState::Waiting),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn hold(&self) -> Duration {
        self.hold
    }

    pub fn state(&self) -> CarState {
        *self.state.borrow()
    }

    /// Follow this car's state transitions.
    pub fn subscribe(&self) -> watch::Receiver<CarState> {
        self.state.subscribe()
    }

    fn set_state(&self, state: CarState) {
        self.state.send_replace(state);
    }

    /// Drive the car to a terminal state.
    ///
    /// `cancel` interrupts both the queue wait and the parked sleep. A car
    /// interrupted while parked still releases its slot.
    pub async fn run(self, pool: Arc<SlotPool>, cancel: CancellationToken) -> CarReport {
        let arrived = Instant::now();

        let permit = match pool.try_acquire(&self.id) {
            Some(permit) => permit,
            None => match pool.acquire(&self.id, &cancel).await {
                Ok(permit) => permit,
                Err(AcquireError::Cancelled) => {
                    self.set_state(CarState::Interrupted);
                    tracing::warn!(car = %self.id, "Interrupted before it could park");
                    return self.report(CarOutcome::InterruptedWaiting, true, arrived.elapsed());
                }
            },
        };

        self.set_state(CarState::Admitted);
        let waited = permit.waited();
        let wait_time = arrived.elapsed();
        tracing::debug!(car = %self.id, waited, hold = ?self.hold, "Admitted");

        self.set_state(CarState::Parked);
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => CarOutcome::InterruptedParked,
            _ = tokio::time::sleep(self.hold) => CarOutcome::Departed,
        };

        permit.release();
        self.set_state(outcome.final_state());
        if outcome.is_interrupted() {
            tracing::warn!(car = %self.id, "Interrupted while parked - slot released");
        } else {
            tracing::debug!(car = %self.id, "Departed");
        }

        self.report(outcome, waited, wait_time)
    }

    fn report(&self, outcome: CarOutcome, waited: bool, wait_time: Duration) -> CarReport {
        CarReport {
            car: self.id.clone(),
            outcome,
            waited,
            hold_ms: millis(self.hold),
            wait_ms: millis(wait_time),
        }
    }
}

/// Whole milliseconds, saturating at `u64::MAX`.
fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::status::{Action, RecordingSink};

    fn recording_pool(capacity: usize) -> (Arc<SlotPool>, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::new());
        let pool = SlotPool::with_sink(capacity, sink.clone()).unwrap();
        (pool, sink)
    }

    fn actions(sink: &RecordingSink, car: &str) -> Vec<Action> {
        sink.events_for(car).into_iter().map(|e| e.action).collect()
    }

    #[test]
    fn state_is_terminal() {
        assert!(!CarState::Waiting.is_terminal());
        assert!(!CarState::Admitted.is_terminal());
        assert!(!CarState::Parked.is_terminal());
        assert!(CarState::Departed.is_terminal());
        assert!(CarState::Interrupted.is_terminal());
    }

    #[test]
    fn new_car_starts_waiting() {
        let car = Car::new("Car-1", Duration::from_millis(5));
        assert_eq!(car.id(), "Car-1");
        assert_eq!(car.hold(), Duration::from_millis(5));
        assert_eq!(car.state(), CarState::Waiting);
        assert_eq!(car.state().as_str(), "waiting");
    }

    #[test]
    fn hold_time_stays_in_range() {
        let hold = HoldTime::new(Duration::from_millis(1_000), Duration::from_millis(3_000));
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..1_000 {
            let d = hold.sample(&mut rng);
            assert!(d >= Duration::from_millis(1_000));
            assert!(d < Duration::from_millis(4_000));
        }
    }

    #[test]
    fn zero_span_is_exact() {
        let hold = HoldTime::new(Duration::from_millis(250), Duration::ZERO);
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(hold.sample(&mut rng), Duration::from_millis(250));
    }

    #[test]
    fn outcome_maps_to_terminal_state() {
        assert_eq!(CarOutcome::Departed.final_state(), CarState::Departed);
        assert_eq!(
            CarOutcome::InterruptedWaiting.final_state(),
            CarState::Interrupted
        );
        assert!(CarOutcome::InterruptedParked.is_interrupted());
        assert!(!CarOutcome::Departed.is_interrupted());
    }

    #[tokio::test(start_paused = true)]
    async fn car_parks_then_departs() {
        let (pool, sink) = recording_pool(1);
        let car = Car::new("Car-1", Duration::from_millis(1_500));

        let report = car.run(Arc::clone(&pool), CancellationToken::new()).await;

        assert_eq!(report.outcome, CarOutcome::Departed);
        assert!(!report.waited);
        assert_eq!(report.hold_ms, 1_500);
        assert_eq!(actions(&sink, "Car-1"), vec![Action::Enters, Action::Leaves]);
        assert_eq!(pool.occupied(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn car_waits_when_lot_is_full() {
        let (pool, sink) = recording_pool(1);
        let holder = pool.try_acquire("Car-0").unwrap();

        let task = tokio::spawn(
            Car::new("Car-1", Duration::from_millis(100)).run(Arc::clone(&pool), CancellationToken::new()),
        );
        while pool.waiting() == 0 {
            tokio::task::yield_now().await;
        }

        tokio::time::sleep(Duration::from_millis(400)).await;
        holder.release();

        let report = task.await.unwrap();
        assert_eq!(report.outcome, CarOutcome::Departed);
        assert!(report.waited);
        assert_eq!(report.wait_ms, 400);
        assert_eq!(
            actions(&sink, "Car-1"),
            vec![Action::Waits, Action::Enters, Action::Leaves]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_in_queue_never_takes_a_slot() {
        let (pool, sink) = recording_pool(1);
        let holder = pool.try_acquire("Car-0").unwrap();
        let cancel = CancellationToken::new();

        let task = tokio::spawn(
            Car::new("Car-1", Duration::from_millis(100)).run(Arc::clone(&pool), cancel.clone()),
        );
        while pool.waiting() == 0 {
            tokio::task::yield_now().await;
        }

        cancel.cancel();
        let report = task.await.unwrap();

        assert_eq!(report.outcome, CarOutcome::InterruptedWaiting);
        assert_eq!(report.outcome.final_state(), CarState::Interrupted);
        assert_eq!(actions(&sink, "Car-1"), vec![Action::Waits]);
        assert_eq!(pool.occupied(), 1);
        assert_eq!(pool.waiting(), 0);

        holder.release();
        assert_eq!(pool.occupied(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_while_parked_still_releases() {
        let (pool, sink) = recording_pool(1);
        let cancel = CancellationToken::new();

        let task = tokio::spawn(
            Car::new("Car-1", Duration::from_secs(60)).run(Arc::clone(&pool), cancel.clone()),
        );
        while pool.occupied() == 0 {
            tokio::task::yield_now().await;
        }

        tokio::time::sleep(Duration::from_secs(1)).await;
        cancel.cancel();
        let report = task.await.unwrap();

        assert_eq!(report.outcome, CarOutcome::InterruptedParked);
        assert_eq!(actions(&sink, "Car-1"), vec![Action::Enters, Action::Leaves]);
        assert_eq!(pool.occupied(), 0);
    }

    #[test]
    fn millis_saturate_instead_of_wrapping() {
        assert_eq!(millis(Duration::from_millis(2_100)), 2_100);
        assert_eq!(millis(Duration::from_millis(u64::MAX)), u64::MAX);
        assert_eq!(millis(Duration::MAX), u64::MAX);
    }

    #[test]
    fn huge_hold_is_reported_without_truncation() {
        let hold = Duration::from_millis(u64::MAX) + Duration::from_secs(1);
        let car = Car::new("Car-1", hold);

        let report = car.report(CarOutcome::InterruptedParked, true, Duration::MAX);
        assert_eq!(report.hold_ms, u64::MAX);
        assert_eq!(report.wait_ms, u64::MAX);
    }

    #[tokio::test(start_paused = true)]
    async fn state_follows_the_car_through_the_lot() {
        let (pool, _sink) = recording_pool(1);
        let holder = pool.try_acquire("Car-0").unwrap();

        let car = Car::new("Car-1", Duration::from_millis(300));
        let mut state = car.subscribe();
        let task = tokio::spawn(car.run(Arc::clone(&pool), CancellationToken::new()));

        while pool.waiting() == 0 {
            tokio::task::yield_now().await;
        }
        assert_eq!(*state.borrow(), CarState::Waiting);

        holder.release();
        state.wait_for(|s| *s == CarState::Parked).await.unwrap();
        assert_eq!(pool.occupied(), 1);

        let report = task.await.unwrap();
        assert_eq!(*state.borrow(), CarState::Departed);
        assert_eq!(*state.borrow(), report.outcome.final_state());
    }

    #[tokio::test(start_paused = true)]
    async fn state_ends_interrupted_when_cancelled_in_queue() {
        let (pool, _sink) = recording_pool(1);
        let _holder = pool.try_acquire("Car-0").unwrap();
        let cancel = CancellationToken::new();

        let car = Car::new("Car-1", Duration::from_millis(300));
        let state = car.subscribe();
        let task = tokio::spawn(car.run(Arc::clone(&pool), cancel.clone()));
        while pool.waiting() == 0 {
            tokio::task::yield_now().await;
        }

        cancel.cancel();
        task.await.unwrap();
        assert_eq!(*state.borrow(), CarState::Interrupted);
    }

    #[test]
    fn report_serializes() {
        let report = CarReport {
            car: "Car-3".to_string(),
            outcome: CarOutcome::InterruptedParked,
            waited: true,
            hold_ms: 2_100,
            wait_ms: 900,
        };
        insta::assert_json_snapshot!(report, @r#"
        {
          "car": "Car-3",
          "outcome": "interrupted_parked",
          "waited": true,
          "hold_ms": 2100,
          "wait_ms": 900
        }
        "#);
    }
}
