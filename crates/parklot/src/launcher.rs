//! Launcher - builds the lot, spawns a batch of cars, and waits for them.
//!
//! Flow:
//! 1. Validate config, create the SlotPool
//! 2. Draw every car's hold time, spawn one task per car
//! 3. Join cars in spawn order until all are terminal
//! 4. If the wait itself is cancelled: stop joining, leave cars running

use std::sync::Arc;

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::car::{Car, CarOutcome, CarReport, CarState};
use crate::config::SimulationConfig;
use crate::error::LauncherError;
use crate::pool::SlotPool;
use crate::status::{PoolSnapshot, StatusSink, TracingSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Completion {
    /// Every car reached a terminal state.
    AllFinished,
    /// The wait was cancelled; some cars may still be running.
    WaitInterrupted,
}

/// Outcome of one batch.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub completion: Completion,
    /// Reports of the cars joined before the wait ended, in spawn order.
    pub cars: Vec<CarReport>,
    pub departed: usize,
    pub interrupted: usize,
    pub waited: usize,
    /// Car tasks that panicked or were aborted.
    pub crashed: usize,
    /// Cars still running when the wait was interrupted.
    pub pending: usize,
    pub final_snapshot: PoolSnapshot,
    pub started_at: String,
    pub finished_at: String,
}

impl BatchReport {
    pub fn is_complete(&self) -> bool {
        self.completion == Completion::AllFinished
    }

    pub fn banner(&self) -> &'static str {
        match self.completion {
            Completion::AllFinished => "Simulation completed.",
            Completion::WaitInterrupted => "Waiting for completion was interrupted.",
        }
    }

    pub fn report_for(&self, car: &str) -> Option<&CarReport> {
        self.cars.iter().find(|r| r.car == car)
    }
}

/// A spawned car: its label, its cancellation token and its task.
pub struct CarHandle {
    id: String,
    cancel: CancellationToken,
    state: watch::Receiver<CarState>,
    join: JoinHandle<CarReport>,
}

impl CarHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Latest state the car published.
    pub fn state(&self) -> CarState {
        *self.state.borrow()
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

/// A batch whose cars are running.
pub struct RunningBatch {
    pool: Arc<SlotPool>,
    cars: Vec<CarHandle>,
    started_at: String,
}

impl RunningBatch {
    pub fn pool(&self) -> &Arc<SlotPool> {
        &self.pool
    }

    pub fn car_ids(&self) -> Vec<&str> {
        self.cars.iter().map(|c| c.id()).collect()
    }

    pub fn car_state(&self, id: &str) -> Option<CarState> {
        self.cars.iter().find(|c| c.id == id).map(CarHandle::state)
    }

    /// Interrupt one car. Returns `false` for an unknown id.
    pub fn cancel_car(&self, id: &str) -> bool {
        match self.cars.iter().find(|c| c.id == id) {
            Some(car) => {
                tracing::info!(car = id, "Cancelling car");
                car.cancel();
                true
            }
            None => {
                tracing::warn!(car = id, "Attempted to cancel unknown car");
                false
            }
        }
    }

    /// Join every car in spawn order.
    ///
    /// If `cancel` fires first, joining stops. Cars that already finished are
    /// still reported; the rest are left running: their tasks are detached,
    /// not aborted, and counted as `pending`.
    pub async fn wait(self, cancel: &CancellationToken) -> BatchReport {
        let total = self.cars.len();
        let mut reports = Vec::with_capacity(total);
        let mut crashed = 0;
        let mut pending = 0;

        let mut cars = self.cars.into_iter();
        while let Some(mut handle) = cars.next() {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    for rest in std::iter::once(handle).chain(cars.by_ref()) {
                        if rest.is_finished() {
                            // Output is already stored, so this resolves at once.
                            let joined = rest.join.await;
                            collect(&rest.id, joined, &mut reports, &mut crashed);
                        } else {
                            pending += 1;
                        }
                    }
                    tracing::warn!(pending, "Wait for cars interrupted");
                    break;
                }

                joined = &mut handle.join => collect(&handle.id, joined, &mut reports, &mut crashed),
            }
        }

        let completion = if pending == 0 {
            Completion::AllFinished
        } else {
            Completion::WaitInterrupted
        };

        let departed = reports
            .iter()
            .filter(|r| r.outcome == CarOutcome::Departed)
            .count();
        let interrupted = reports.iter().filter(|r| r.outcome.is_interrupted()).count();
        let waited = reports.iter().filter(|r| r.waited).count();

        let report = BatchReport {
            completion,
            departed,
            interrupted,
            waited,
            crashed,
            pending,
            cars: reports,
            final_snapshot: self.pool.snapshot(),
            started_at: self.started_at,
            finished_at: chrono::Utc::now().to_rfc3339(),
        };

        tracing::info!(
            completion = ?report.completion,
            departed,
            interrupted,
            crashed,
            pending,
            "Batch finished"
        );
        report
    }
}

fn collect(
    id: &str,
    joined: Result<CarReport, tokio::task::JoinError>,
    reports: &mut Vec<CarReport>,
    crashed: &mut usize,
) {
    match joined {
        Ok(report) => reports.push(report),
        Err(e) => {
            tracing::error!(car = %id, error = %e, "Car task failed");
            *crashed += 1;
        }
    }
}

/// Builds the lot and drives one batch of cars through it.
pub struct Launcher {
    config: SimulationConfig,
    sink: Arc<dyn StatusSink>,
}

impl Launcher {
    pub fn new(config: SimulationConfig) -> Self {
        Self::with_sink(config, Arc::new(TracingSink))
    }

    pub fn with_sink(config: SimulationConfig, sink: Arc<dyn StatusSink>) -> Self {
        Self { config, sink }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Create the pool and spawn every car. Must be called inside a tokio runtime.
    pub fn spawn(&self) -> Result<RunningBatch, LauncherError> {
        self.config.validate()?;

        let pool = SlotPool::with_sink(self.config.capacity, Arc::clone(&self.sink))?;
        let hold = self.config.hold_time();
        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let started_at = chrono::Utc::now().to_rfc3339();
        let cars = (1..=self.config.car_count)
            .map(|i| {
                let car = Car::new(format!("Car-{i}"), hold.sample(&mut rng));
                let id = car.id().to_string();
                let cancel = CancellationToken::new();
                let state = car.subscribe();
                tracing::debug!(car = %id, hold = ?car.hold(), "Spawning car");
                let join = tokio::spawn(car.run(Arc::clone(&pool), cancel.clone()));
                CarHandle {
                    id,
                    cancel,
                    state,
                    join,
                }
            })
            .collect();

        tracing::info!(
            capacity = self.config.capacity,
            cars = self.config.car_count,
            "Batch launched"
        );

        Ok(RunningBatch {
            pool,
            cars,
            started_at,
        })
    }

    /// Spawn the batch and wait for it.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<BatchReport, LauncherError> {
        Ok(self.spawn()?.wait(cancel).await)
    }
}
