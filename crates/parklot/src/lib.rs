//! parklot: a FIFO-fair bounded slot pool and a parking-lot simulation built on it.

pub mod car;
pub mod config;
pub mod error;
pub mod launcher;
pub mod pool;
pub mod status;

pub use car::{Car, CarOutcome, CarReport, CarState, HoldTime};
pub use config::SimulationConfig;
pub use error::{AcquireError, ConfigError, LauncherError, PoolError};
pub use launcher::{BatchReport, CarHandle, Completion, Launcher, RunningBatch};
pub use pool::{SlotPermit, SlotPool};
pub use status::{
    Action, ConsoleFormat, ConsoleSink, PoolSnapshot, RecordingSink, StatusEvent, StatusSink,
    TracingSink,
};

/// Re-exported so callers can build tokens without a direct tokio-util dependency.
pub use tokio_util::sync::CancellationToken;
