//! Time sources for the metrics engine.
//!
//! Every metric reads time through a [`Clock`]: `tick()` is a monotonic
//! nanosecond counter used for durations and rate math, `time()` is wall-clock
//! milliseconds used for bucket alignment and cache expiry. Tests substitute a
//! [`ManualClock`] to step across bucket boundaries deterministically.

use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Source of monotonic ticks and wall-clock time
pub trait Clock: Send + Sync {
    /// Monotonic nanoseconds since an arbitrary origin
    fn tick(&self) -> u64;

    /// Wall-clock milliseconds since the Unix epoch
    fn time(&self) -> i64;
}

/// Clock backed by `Instant` and `SystemTime`
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
    #[inline]
    fn tick(&self) -> u64 {
        self.origin.elapsed().as_nanos() as u64
    }

    #[inline]
    fn time(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0)
    }
}

static DEFAULT_CLOCK: Lazy<Arc<dyn Clock>> = Lazy::new(|| Arc::new(SystemClock::new()));

/// Process-wide system clock shared by metrics that are not given one
pub fn default_clock() -> Arc<dyn Clock> {
    Arc::clone(&DEFAULT_CLOCK)
}

/// Clock that only moves when told to.
///
/// `tick` and `time` advance together so duration math and bucket alignment
/// stay consistent.
#[derive(Debug, Default)]
pub struct ManualClock {
    tick: AtomicU64,
    time: AtomicI64,
}

impl ManualClock {
    /// Create a clock frozen at the given wall-clock millisecond
    pub fn new(time_ms: i64) -> Self {
        Self {
            tick: AtomicU64::new(0),
            time: AtomicI64::new(time_ms),
        }
    }

    /// Move both time sources forward
    pub fn advance(&self, by: Duration) {
        self.tick.fetch_add(by.as_nanos() as u64, Ordering::SeqCst);
        self.time.fetch_add(by.as_millis() as i64, Ordering::SeqCst);
    }

    /// Move both time sources forward by whole milliseconds
    pub fn advance_millis(&self, ms: u64) {
        self.advance(Duration::from_millis(ms));
    }

    /// Jump wall-clock time without touching the tick counter
    pub fn set_time(&self, time_ms: i64) {
        self.time.store(time_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn tick(&self) -> u64 {
        self.tick.load(Ordering::SeqCst)
    }

    fn time(&self) -> i64 {
        self.time.load(Ordering::SeqCst)
    }
}
