//! Event rates: lifetime count, per-bucket instant counts and moving averages.

use crate::core::config::{BucketConfig, MeterConfig};
use crate::core::{Clock, MetricsError, Result};
use crate::metrics::bucket_counter::BucketCounter;
use crate::metrics::ewma::Ewma;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

const PER_SECOND: Duration = Duration::from_secs(1);

/// Read side shared by meters, timers and compasses
pub trait Metered: Send + Sync {
    /// Events recorded since creation
    fn count(&self) -> u64;

    /// Events per live bucket, keyed by aligned timestamp
    fn instant_count(&self) -> BTreeMap<i64, u64> {
        self.instant_count_since(i64::MIN)
    }

    /// Events per live bucket at or after `start_time`
    fn instant_count_since(&self, start_time: i64) -> BTreeMap<i64, u64>;

    /// Width of the buckets behind `instant_count`
    fn instant_count_interval(&self) -> Duration;

    /// Events per second, averaged over the last minute
    fn one_minute_rate(&self) -> f64;

    fn five_minute_rate(&self) -> f64;

    fn fifteen_minute_rate(&self) -> f64;

    /// Events per second since creation
    fn mean_rate(&self) -> f64;
}

/// Records events
pub trait Meter: Metered {
    fn mark(&self) {
        self.mark_by(1);
    }

    fn mark_by(&self, n: u64);
}

/// [`Meter`] with 1/5/15 minute moving averages.
///
/// The averages are ticked lazily by whichever caller first notices that a
/// tick interval has passed, so no background thread is needed.
pub struct EwmaMeter {
    m1: Ewma,
    m5: Ewma,
    m15: Ewma,
    buckets: BucketCounter,
    start_tick: u64,
    last_tick: AtomicU64,
    tick_interval_nanos: u64,
    clock: Arc<dyn Clock>,
}

impl EwmaMeter {
    pub fn new(bucket: &BucketConfig, meter: &MeterConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let tick_interval_nanos = u64::try_from(meter.tick_interval.as_nanos()).unwrap_or(u64::MAX);
        if tick_interval_nanos == 0 {
            return Err(MetricsError::invalid_parameter(
                "tick_interval",
                "must be greater than 0",
            ));
        }

        let buckets = BucketCounter::new(bucket.interval, bucket.bucket_count, Arc::clone(&clock))?;
        let start_tick = clock.tick();
        Ok(Self {
            m1: Ewma::one_minute(meter.tick_interval),
            m5: Ewma::five_minute(meter.tick_interval),
            m15: Ewma::fifteen_minute(meter.tick_interval),
            buckets,
            start_tick,
            last_tick: AtomicU64::new(start_tick),
            tick_interval_nanos,
            clock,
        })
    }

    /// Catch the averages up with every tick interval that has elapsed
    fn tick_if_necessary(&self) {
        let old_tick = self.last_tick.load(Ordering::Acquire);
        let new_tick = self.clock.tick();
        let age = new_tick.saturating_sub(old_tick);
        if age <= self.tick_interval_nanos {
            return;
        }

        let aligned = new_tick - age % self.tick_interval_nanos;
        if self
            .last_tick
            .compare_exchange(old_tick, aligned, Ordering::AcqRel, Ordering::Relaxed)
            .is_ok()
        {
            let required = age / self.tick_interval_nanos;
            for _ in 0..required {
                self.m1.tick();
                self.m5.tick();
                self.m15.tick();
            }
        }
    }
}

impl Meter for EwmaMeter {
    #[inline]
    fn mark_by(&self, n: u64) {
        self.tick_if_necessary();
        self.buckets.update_by(n);
        self.m1.update(n);
        self.m5.update(n);
        self.m15.update(n);
    }
}

impl Metered for EwmaMeter {
    fn count(&self) -> u64 {
        self.buckets.count()
    }

    fn instant_count_since(&self, start_time: i64) -> BTreeMap<i64, u64> {
        self.buckets.bucket_counts_since(start_time)
    }

    fn instant_count_interval(&self) -> Duration {
        self.buckets.bucket_interval()
    }

    fn one_minute_rate(&self) -> f64 {
        self.tick_if_necessary();
        self.m1.rate(PER_SECOND)
    }

    fn five_minute_rate(&self) -> f64 {
        self.tick_if_necessary();
        self.m5.rate(PER_SECOND)
    }

    fn fifteen_minute_rate(&self) -> f64 {
        self.tick_if_necessary();
        self.m15.rate(PER_SECOND)
    }

    fn mean_rate(&self) -> f64 {
        let count = self.count();
        let elapsed = self.clock.tick().saturating_sub(self.start_tick);
        if count == 0 || elapsed == 0 {
            return 0.0;
        }
        count as f64 / Duration::from_nanos(elapsed).as_secs_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ManualClock;

    fn meter(clock: &Arc<ManualClock>) -> EwmaMeter {
        let bucket = BucketConfig {
            interval: Duration::from_secs(1),
            bucket_count: 10,
        };
        EwmaMeter::new(&bucket, &MeterConfig::default(), Arc::clone(clock) as Arc<dyn Clock>)
            .unwrap()
    }

    #[test]
    fn test_count_and_instant_count() {
        let clock = Arc::new(ManualClock::new(0));
        let meter = meter(&clock);

        meter.mark();
        meter.mark_by(4);
        clock.advance_millis(1_000);
        meter.mark_by(2);

        assert_eq!(meter.count(), 7);
        let instant = meter.instant_count();
        assert_eq!(instant.into_iter().collect::<Vec<_>>(), vec![(0, 5), (1_000, 2)]);
        assert_eq!(meter.instant_count_since(1_000).len(), 1);
        assert_eq!(meter.instant_count_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_rates_start_at_zero() {
        let clock = Arc::new(ManualClock::new(0));
        let meter = meter(&clock);

        assert_eq!(meter.mean_rate(), 0.0);
        assert_eq!(meter.one_minute_rate(), 0.0);
        assert_eq!(meter.fifteen_minute_rate(), 0.0);
    }

    #[test]
    fn test_rates_after_tick() {
        let clock = Arc::new(ManualClock::new(0));
        let meter = meter(&clock);

        meter.mark_by(10);
        clock.advance(Duration::from_secs(10));

        // Two tick intervals elapsed: the first sees 10 events over 5s, the
        // second none.
        let alpha = 1.0 - (-5.0f64 / 60.0).exp();
        let expected = 2.0 * (1.0 - alpha);
        assert!((meter.one_minute_rate() - expected).abs() < 1e-9);
        assert!(meter.five_minute_rate() > meter.one_minute_rate());
        assert!((meter.mean_rate() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_rejects_zero_tick_interval() {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(0));
        let config = MeterConfig {
            tick_interval: Duration::ZERO,
        };
        assert!(EwmaMeter::new(&BucketConfig::default(), &config, clock).is_err());
    }
}
