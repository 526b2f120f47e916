//! Point-in-time values read on demand.
//!
//! A gauge that cannot produce a value reports `None` ("unavailable"); lookup
//! failures are logged and never escape to the caller.

use crate::core::Clock;
use arc_swap::ArcSwapOption;
use parking_lot::Mutex;
use std::fmt::Display;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Value sampled when read
pub trait Gauge: Send + Sync {
    /// Current value, `None` when it cannot be obtained
    fn value(&self) -> Option<f64>;
}

/// Gauge computed by a fallible closure
pub struct FnGauge<F> {
    read: F,
}

impl<F, E> FnGauge<F>
where
    F: Fn() -> std::result::Result<f64, E> + Send + Sync,
    E: Display,
{
    pub fn new(read: F) -> Self {
        Self { read }
    }
}

impl<F, E> Gauge for FnGauge<F>
where
    F: Fn() -> std::result::Result<f64, E> + Send + Sync,
    E: Display,
{
    fn value(&self) -> Option<f64> {
        match (self.read)() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(error = %e, "gauge lookup failed, reporting unavailable");
                None
            },
        }
    }
}

/// Gauge whose loader runs at most once per `ttl`.
///
/// A valid cached value is returned without locking. Once it expires, the
/// first reader to take the lock reloads it; readers queued behind that lock
/// re-check the expiry and reuse the fresh value.
pub struct CachedGauge<T, F> {
    load: F,
    cached: ArcSwapOption<T>,
    reload_at: AtomicI64,
    ttl_ms: i64,
    reload_lock: Mutex<()>,
    clock: Arc<dyn Clock>,
}

impl<T, F> CachedGauge<T, F>
where
    T: Send + Sync,
    F: Fn() -> Option<T> + Send + Sync,
{
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>, load: F) -> Self {
        Self {
            load,
            cached: ArcSwapOption::empty(),
            reload_at: AtomicI64::new(i64::MIN),
            ttl_ms: ttl.as_millis().min(i64::MAX as u128) as i64,
            reload_lock: Mutex::new(()),
            clock,
        }
    }

    /// Cached value, reloading it if the TTL has passed
    pub fn get(&self) -> Option<Arc<T>> {
        let now = self.clock.time();
        if now < self.reload_at.load(Ordering::Acquire) {
            return self.cached.load_full();
        }

        let _guard = self.reload_lock.lock();
        if now < self.reload_at.load(Ordering::Acquire) {
            return self.cached.load_full();
        }

        let fresh = (self.load)().map(Arc::new);
        self.cached.store(fresh);
        self.reload_at
            .store(now.saturating_add(self.ttl_ms), Ordering::Release);
        self.cached.load_full()
    }
}

impl<F> Gauge for CachedGauge<f64, F>
where
    F: Fn() -> Option<f64> + Send + Sync,
{
    fn value(&self) -> Option<f64> {
        self.get().map(|v| *v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ManualClock;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_fn_gauge_success_and_failure() {
        let ok = FnGauge::new(|| Ok::<f64, String>(0.75));
        assert_eq!(ok.value(), Some(0.75));

        let failing = FnGauge::new(|| Err::<f64, _>("attribute not found"));
        assert_eq!(failing.value(), None);
    }

    #[test]
    fn test_cached_gauge_reloads_once_per_ttl() {
        let clock = Arc::new(ManualClock::new(1_000));
        let loads = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&loads);
        let gauge = CachedGauge::new(
            Duration::from_secs(10),
            Arc::clone(&clock) as Arc<dyn Clock>,
            move || Some(counter.fetch_add(1, Ordering::SeqCst) as f64),
        );

        assert_eq!(gauge.value(), Some(0.0));
        assert_eq!(gauge.value(), Some(0.0));
        clock.advance_millis(9_999);
        assert_eq!(gauge.value(), Some(0.0));
        clock.advance_millis(1);
        assert_eq!(gauge.value(), Some(1.0));
        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_cached_gauge_caches_unavailable() {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(0));
        let gauge: CachedGauge<f64, _> = CachedGauge::new(Duration::from_secs(1), clock, || None);
        assert_eq!(gauge.value(), None);
    }

    #[test]
    fn test_cached_gauge_single_reload_under_contention() {
        use std::thread;

        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(0));
        let loads = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&loads);
        let gauge = Arc::new(CachedGauge::new(Duration::from_secs(60), clock, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Some(42.0)
        }));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let gauge = Arc::clone(&gauge);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        assert_eq!(gauge.value(), Some(42.0));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }
}
