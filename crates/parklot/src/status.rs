//! Status events emitted by the slot pool, and the sinks that receive them.
//!
//! Events are built and delivered while the pool lock is held, so a sink
//! observes them in exactly the order the pool mutated. Sinks must therefore
//! be quick and must never call back into the pool: a sink that blocks (for
//! example on a full stdout pipe) stalls every car waiting on the lock,
//! including the runtime worker threads they run on.

use std::fmt;
use std::io::Write;
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

/// What a car did at the moment the event was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    /// Queued behind a full lot.
    Waits,
    /// Admitted to a slot.
    Enters,
    /// Released its slot.
    Leaves,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Waits => "WAITS",
            Self::Enters => "ENTERS",
            Self::Leaves => "LEAVES",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Occupancy counts sampled together under the pool lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSnapshot {
    pub capacity: usize,
    pub occupied: usize,
    pub free: usize,
    pub waiting: usize,
}

impl PoolSnapshot {
    pub fn is_full(&self) -> bool {
        self.free == 0
    }

    pub fn is_idle(&self) -> bool {
        self.occupied == 0 && self.waiting == 0
    }
}

/// One admission, wait or departure, with the counts it produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEvent {
    /// Position of this event in the pool's total order.
    pub seq: u64,
    pub car: String,
    pub action: Action,
    pub occupied: usize,
    pub free: usize,
    pub capacity: usize,
    pub waiting: usize,
}

impl StatusEvent {
    pub(crate) fn new(seq: u64, car: &str, action: Action, snapshot: PoolSnapshot) -> Self {
        Self {
            seq,
            car: car.to_string(),
            action,
            occupied: snapshot.occupied,
            free: snapshot.free,
            capacity: snapshot.capacity,
            waiting: snapshot.waiting,
        }
    }

    pub fn snapshot(&self) -> PoolSnapshot {
        PoolSnapshot {
            capacity: self.capacity,
            occupied: self.occupied,
            free: self.free,
            waiting: self.waiting,
        }
    }
}

impl fmt::Display for StatusEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[Slots {}/{} | Waiting {}] {:<8} {:<6} | Occupied: {:<2} | Free: {:<2}",
            self.occupied,
            self.capacity,
            self.waiting,
            self.car,
            self.action,
            self.occupied,
            self.free
        )
    }
}

/// Receives every status event the pool emits.
pub trait StatusSink: Send + Sync {
    fn emit(&self, event: &StatusEvent);
}

/// Default sink: one structured `info` record per event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl StatusSink for TracingSink {
    fn emit(&self, event: &StatusEvent) {
        tracing::info!(
            seq = event.seq,
            car = %event.car,
            action = %event.action,
            occupied = event.occupied,
            free = event.free,
            waiting = event.waiting,
            "{}",
            event
        );
    }
}

/// How [`ConsoleSink`] renders a line.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleFormat {
    #[default]
    Text,
    Json,
}

/// Prints one line per event, on stdout unless another writer is given.
///
/// Writes are synchronous and happen under the pool lock. Point it at a
/// writer that does not block for long; a reader that stops draining a
/// stdout pipe freezes the lot.
pub struct ConsoleSink {
    format: ConsoleFormat,
    out: Mutex<Box<dyn Write + Send>>,
}

impl fmt::Debug for ConsoleSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsoleSink")
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}

impl ConsoleSink {
    pub fn new(format: ConsoleFormat) -> Self {
        Self::with_writer(format, Box::new(std::io::stdout()))
    }

    pub fn with_writer(format: ConsoleFormat, out: Box<dyn Write + Send>) -> Self {
        Self {
            format,
            out: Mutex::new(out),
        }
    }

    pub fn render(&self, event: &StatusEvent) -> String {
        match self.format {
            ConsoleFormat::Text => event.to_string(),
            ConsoleFormat::Json => match serde_json::to_string(event) {
                Ok(line) => line,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to serialize status event");
                    event.to_string()
                }
            },
        }
    }
}

impl StatusSink for ConsoleSink {
    fn emit(&self, event: &StatusEvent) {
        let line = self.render(event);
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = writeln!(out, "{line}").and_then(|()| out.flush()) {
            tracing::warn!(error = %e, "Failed to write status line");
        }
    }
}

/// Keeps every event in memory, in emission order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<StatusEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<StatusEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn events_for(&self, car: &str) -> Vec<StatusEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.car == car)
            .collect()
    }

    pub fn count(&self, action: Action) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|e| e.action == action)
            .count()
    }

    /// Sequence number of the first `action` event for `car`.
    pub fn position(&self, car: &str, action: Action) -> Option<u64> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|e| e.car == car && e.action == action)
            .map(|e| e.seq)
    }
}

impl StatusSink for RecordingSink {
    fn emit(&self, event: &StatusEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}
