use std::sync::Arc;
use std::time::{Duration, Instant};

/// Source of monotonic readings, measured from an arbitrary fixed origin.
pub trait Clock: Send + Sync {
    fn now(&self) -> Duration;
}

/// Monotonic clock anchored at the moment it was created.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

pub type SharedClock = Arc<dyn Clock>;

/// Round a reading to the nearest whole millisecond, halves rounding up.
pub fn round_millis(reading: Duration) -> u64 {
    ((reading.as_nanos() + 500_000) / 1_000_000) as u64
}

/// Start reading of a single request, already rounded to milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestTimer {
    start_ms: u64,
}

impl RequestTimer {
    pub fn start(clock: &dyn Clock) -> Self {
        Self {
            start_ms: round_millis(clock.now()),
        }
    }

    pub fn start_ms(&self) -> u64 {
        self.start_ms
    }

    /// Elapsed whole milliseconds. Both endpoints are rounded before the
    /// subtraction, so a 1.2ms request can report 1 or 2 depending on where
    /// it started.
    pub fn elapsed_ms(&self, clock: &dyn Clock) -> u64 {
        round_millis(clock.now()).saturating_sub(self.start_ms)
    }
}
