//! Wait bounds for job completion polling
//!
//! Polling sleeps for the server-suggested interval but never past the
//! caller's deadline. Time is read through a [`Clock`] so tests can run
//! the polling loop against virtual time:
//! - `SystemClock`: real monotonic time and `thread::sleep`
//! - `ManualClock`: sleeping advances `now` instantly
//!
//! There is no cancellation token. Once a sleep starts it runs to the end.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Default upper bound on `is_completed` waits (24 hours)
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(24 * 60 * 60);

/// Shortest sleep between status checks
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Source of monotonic time and sleeping
pub trait Clock: Send + Sync {
    /// Time elapsed since the clock's origin
    fn now(&self) -> Duration;

    fn sleep(&self, duration: Duration);
}

/// Real time
#[derive(Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Virtual time for tests
///
/// `sleep` returns immediately after advancing `now` by the requested
/// duration. Every sleep is recorded so tests can assert on the schedule.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    inner: Arc<Mutex<ManualClockState>>,
}

#[derive(Debug, Default)]
struct ManualClockState {
    now: Duration,
    sleeps: Vec<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move time forward without recording a sleep
    pub fn advance(&self, duration: Duration) {
        let mut state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        state.now += duration;
    }

    /// Sleeps taken so far, in order
    pub fn sleeps(&self) -> Vec<Duration> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).sleeps.clone()
    }

    pub fn total_slept(&self) -> Duration {
        self.sleeps().iter().sum()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).now
    }

    fn sleep(&self, duration: Duration) {
        let mut state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        state.now += duration;
        state.sleeps.push(duration);
    }
}

/// Deadline for one `is_completed` call
#[derive(Debug, Clone, Copy)]
pub struct PollDeadline {
    /// Clock reading when the wait started
    start: Duration,
    max_wait: Duration,
}

impl PollDeadline {
    pub fn start(clock: &dyn Clock, max_wait: Duration) -> Self {
        Self {
            start: clock.now(),
            max_wait,
        }
    }

    pub fn max_wait(&self) -> Duration {
        self.max_wait
    }

    pub fn elapsed(&self, clock: &dyn Clock) -> Duration {
        clock.now().saturating_sub(self.start)
    }

    /// Time left before the deadline
    pub fn remaining(&self, clock: &dyn Clock) -> Duration {
        self.max_wait.saturating_sub(self.elapsed(clock))
    }

    pub fn expired(&self, clock: &dyn Clock) -> bool {
        self.remaining(clock).is_zero()
    }

    /// Shorten `wait` so it ends no later than the deadline
    pub fn clamp(&self, clock: &dyn Clock, wait: Duration) -> Duration {
        wait.min(self.remaining(clock))
    }
}

/// Sleep interval suggested by a status document.
///
/// Missing, non-finite, zero and negative values all fall back to the
/// one-second minimum. Values too large for a `Duration` saturate; the
/// deadline clamps them.
pub fn poll_interval(seconds_to_wait: Option<f64>) -> Duration {
    match seconds_to_wait {
        Some(seconds) if seconds.is_finite() && seconds > 0.0 => Duration::try_from_secs_f64(seconds)
            .unwrap_or(Duration::MAX)
            .max(MIN_POLL_INTERVAL),
        _ => MIN_POLL_INTERVAL,
    }
}
