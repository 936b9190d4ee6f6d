use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;

/// Time source for the engine's auto-advance timer.
pub trait Clock: Send {
    fn now(&self) -> Instant;
}

/// Reads tokio's clock, so paused test runtimes drive the timer too.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<Instant>>,
}

impl ManualClock {
    pub fn new(start: Instant) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// The single auto-advance timer, held as an optional deadline.
///
/// Re-arming replaces the previous deadline, so there is never more than one
/// pending tick.
#[derive(Debug, Default)]
pub struct AdvanceTimer {
    deadline: Option<Instant>,
    arms: u64,
}

impl AdvanceTimer {
    pub fn arm(&mut self, now: Instant, period: Duration) {
        self.deadline = Some(now + period);
        self.arms += 1;
    }

    pub fn disarm(&mut self) {
        self.deadline = None;
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| now >= deadline)
    }

    /// How many times the timer has been (re)started.
    pub fn arm_count(&self) -> u64 {
        self.arms
    }
}
