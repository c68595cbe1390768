//! Time source for the capture coordinator.

use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

/// Monotonic time plus the ability to wait on it.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

/// Wall clock backed by [`Instant::now`] and [`thread::sleep`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Clock that only moves when told to.
///
/// `sleep` advances the clock instantly and records the requested duration,
/// so a test can assert both how long the coordinator waited and what time it
/// observed afterward.
#[derive(Debug)]
pub struct ManualClock {
    base: Instant,
    state: Mutex<ManualState>,
}

#[derive(Debug, Default)]
struct ManualState {
    offset: Duration,
    sleeps: Vec<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        ManualClock {
            base: Instant::now(),
            state: Mutex::new(ManualState::default()),
        }
    }

    /// Move time forward without recording a sleep.
    pub fn advance(&self, by: Duration) {
        if let Ok(mut state) = self.state.lock() {
            state.offset += by;
        }
    }

    /// Total time elapsed since construction.
    pub fn elapsed(&self) -> Duration {
        self.state.lock().map(|s| s.offset).unwrap_or_default()
    }

    /// Every sleep requested so far, in order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.state
            .lock()
            .map(|s| s.sleeps.clone())
            .unwrap_or_default()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + self.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        if let Ok(mut state) = self.state.lock() {
            state.offset += duration;
            state.sleeps.push(duration);
        }
    }
}
