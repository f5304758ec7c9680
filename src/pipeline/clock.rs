use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Time source driving the refresh cadence.
pub trait RefreshClock {
    fn now(&self) -> Instant;

    /// Block until `deadline`. Returns immediately when it has already passed.
    fn wait_until(&self, deadline: Instant);
}

/// Wall clock; waits by sleeping the calling thread.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl RefreshClock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn wait_until(&self, deadline: Instant) {
        let now = Instant::now();
        if deadline > now {
            std::thread::sleep(deadline - now);
        }
    }
}

/// Virtual clock for tests. Waiting jumps time forward instead of sleeping.
///
/// Clones share the same timeline, so a test can hand one clone to the loop and
/// another to a stub detector that simulates inference latency.
#[derive(Clone, Debug)]
pub struct ManualClock {
    origin: Instant,
    elapsed: Arc<Mutex<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            elapsed: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    /// Move time forward by `by`.
    pub fn advance(&self, by: Duration) {
        let mut elapsed = self.elapsed.lock().unwrap_or_else(|e| e.into_inner());
        *elapsed += by;
    }

    /// Virtual time since the clock was created.
    pub fn elapsed(&self) -> Duration {
        *self.elapsed.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl RefreshClock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }

    fn wait_until(&self, deadline: Instant) {
        let mut elapsed = self.elapsed.lock().unwrap_or_else(|e| e.into_inner());
        let target = deadline.saturating_duration_since(self.origin);
        if target > *elapsed {
            *elapsed = target;
        }
    }
}
