use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of the current wall-clock time, in milliseconds since the Unix
/// epoch.
///
/// The scheduler samples the clock exactly once per operation and never
/// sleeps on it; injecting the clock at construction keeps every timing
/// decision deterministic under test.
pub trait Clock: Send + Sync {
    /// Current time in milliseconds since the Unix epoch
    fn epoch_millis(&self) -> i64;
}

/// The system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn epoch_millis(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as i64)
            .unwrap_or(0)
    }
}

/// A clock that only moves when told to.
///
/// Intended for tests that assert on politeness windows and deadlines.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: AtomicI64,
}

impl ManualClock {
    /// Create a clock parked at the given instant
    pub fn new(now_ms: i64) -> Self {
        Self {
            now_ms: AtomicI64::new(now_ms),
        }
    }

    /// Move the clock to an absolute instant
    pub fn set(&self, now_ms: i64) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }

    /// Move the clock forward by `delta_ms`
    pub fn advance(&self, delta_ms: i64) {
        self.now_ms.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn epoch_millis(&self) -> i64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}
