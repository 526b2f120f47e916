//! Exponentially weighted moving average, the classic load-average decay.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

const SECONDS_PER_MINUTE: f64 = 60.0;

/// Moving rate fed by `update` and folded in on every `tick`
#[derive(Debug)]
pub struct Ewma {
    /// Events per nanosecond, stored as `f64` bits
    rate: AtomicU64,
    initialized: AtomicBool,
    uncounted: AtomicU64,
    alpha: f64,
    interval_nanos: f64,
}

impl Ewma {
    /// Average over `minutes`, ticked every `tick_interval`
    pub fn over_minutes(minutes: f64, tick_interval: Duration) -> Self {
        let alpha = 1.0 - (-tick_interval.as_secs_f64() / SECONDS_PER_MINUTE / minutes).exp();
        Self::new(alpha, tick_interval)
    }

    pub fn one_minute(tick_interval: Duration) -> Self {
        Self::over_minutes(1.0, tick_interval)
    }

    pub fn five_minute(tick_interval: Duration) -> Self {
        Self::over_minutes(5.0, tick_interval)
    }

    pub fn fifteen_minute(tick_interval: Duration) -> Self {
        Self::over_minutes(15.0, tick_interval)
    }

    pub fn new(alpha: f64, tick_interval: Duration) -> Self {
        Self {
            rate: AtomicU64::new(0f64.to_bits()),
            initialized: AtomicBool::new(false),
            uncounted: AtomicU64::new(0),
            alpha,
            interval_nanos: tick_interval.as_nanos() as f64,
        }
    }

    /// Buffer `n` events until the next tick
    #[inline]
    pub fn update(&self, n: u64) {
        self.uncounted.fetch_add(n, Ordering::Relaxed);
    }

    /// Fold the buffered events into the rate.
    ///
    /// Callers serialize ticks (the meter lets only the CAS winner tick).
    pub fn tick(&self) {
        let count = self.uncounted.swap(0, Ordering::Relaxed);
        let instant_rate = count as f64 / self.interval_nanos;
        if self.initialized.load(Ordering::Acquire) {
            let rate = f64::from_bits(self.rate.load(Ordering::Relaxed));
            let next = rate + self.alpha * (instant_rate - rate);
            self.rate.store(next.to_bits(), Ordering::Relaxed);
        } else {
            self.rate.store(instant_rate.to_bits(), Ordering::Relaxed);
            self.initialized.store(true, Ordering::Release);
        }
    }

    /// Rate in events per `unit`
    pub fn rate(&self, unit: Duration) -> f64 {
        f64::from_bits(self.rate.load(Ordering::Relaxed)) * unit.as_nanos() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TICK: Duration = Duration::from_secs(5);

    fn elapse_minute(ewma: &Ewma) {
        for _ in 0..12 {
            ewma.tick();
        }
    }

    #[test]
    fn test_first_tick_sets_rate() {
        let ewma = Ewma::one_minute(TICK);
        ewma.update(3);
        ewma.tick();
        assert!((ewma.rate(Duration::from_secs(1)) - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_one_minute_decay() {
        let ewma = Ewma::one_minute(TICK);
        ewma.update(3);
        ewma.tick();

        elapse_minute(&ewma);
        assert!((ewma.rate(Duration::from_secs(1)) - 0.22072766).abs() < 1e-6);
    }

    #[test]
    fn test_fifteen_minute_decays_slower() {
        let m1 = Ewma::one_minute(TICK);
        let m15 = Ewma::fifteen_minute(TICK);
        for ewma in [&m1, &m15] {
            ewma.update(3);
            ewma.tick();
            elapse_minute(ewma);
        }
        assert!(m15.rate(Duration::from_secs(1)) > m1.rate(Duration::from_secs(1)));
        assert!((m15.rate(Duration::from_secs(1)) - 0.56130419).abs() < 1e-6);
    }
}
