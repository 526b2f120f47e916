//! Timer extended with success, error code and addon accounting.
//!
//! Error codes and addons are open-ended keys, so their counters are created
//! on first use and capped; keys past the cap are dropped.

use crate::core::config::{BucketConfig, CompassConfig, MeterConfig};
use crate::core::{Clock, Result};
use crate::metrics::bucket_counter::BucketCounter;
use crate::metrics::histogram::Sampling;
use crate::metrics::keyed::KeyedCounters;
use crate::metrics::meter::Metered;
use crate::metrics::reservoir::Reservoir;
use crate::metrics::snapshot::Snapshot;
use crate::metrics::timer::{SampledTimer, Timer};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Timer that also tracks outcomes of the timed calls
pub trait Compass: Metered + Sampling {
    /// Record timing only, leaving the outcome counters untouched
    fn update(&self, duration: Duration) {
        self.update_with(duration, false, None, None);
    }

    /// Record a call and its outcome
    fn update_with(
        &self,
        duration: Duration,
        success: bool,
        error_code: Option<&str>,
        addon: Option<&str>,
    );

    /// Successful calls since creation
    fn success_count(&self) -> u64;

    /// `success_count / count`, NaN before the first call
    fn success_rate(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            return f64::NAN;
        }
        self.success_count() as f64 / count as f64
    }

    /// Successful calls per time bucket
    fn bucket_success_count(&self) -> Arc<BucketCounter>;

    /// Counter per error code seen so far
    fn error_code_counts(&self) -> BTreeMap<String, Arc<BucketCounter>>;

    /// Counter per addon seen so far
    fn addon_counts(&self) -> BTreeMap<String, Arc<BucketCounter>>;

    /// Monotonic tick of the compass's clock
    fn tick(&self) -> u64;
}

impl dyn Compass + '_ {
    /// Start timing a call
    pub fn time(&self) -> CompassContext<'_> {
        CompassContext::new(self)
    }
}

/// In-flight call measured by a [`Compass`].
///
/// A context reports failure unless [`success`](Self::success) is called.
pub struct CompassContext<'a> {
    compass: &'a dyn Compass,
    start: u64,
    success: bool,
    error_code: Option<String>,
    addon: Option<String>,
}

impl<'a> CompassContext<'a> {
    pub fn new(compass: &'a dyn Compass) -> Self {
        Self {
            start: compass.tick(),
            compass,
            success: false,
            error_code: None,
            addon: None,
        }
    }

    pub fn success(&mut self) {
        self.success = true;
    }

    /// Mark the call failed with `code`
    pub fn error(&mut self, code: impl Into<String>) {
        self.success = false;
        self.error_code = Some(code.into());
    }

    pub fn mark_addon(&mut self, addon: impl Into<String>) {
        self.addon = Some(addon.into());
    }

    /// Record the call and return the elapsed nanoseconds since start
    pub fn stop(&self) -> u64 {
        let elapsed = self.compass.tick().saturating_sub(self.start);
        self.compass.update_with(
            Duration::from_nanos(elapsed),
            self.success,
            self.error_code.as_deref(),
            self.addon.as_deref(),
        );
        elapsed
    }
}

/// [`Compass`] over a [`SampledTimer`] and bucket counters
pub struct BucketCompass {
    timer: SampledTimer,
    success: Arc<BucketCounter>,
    error_codes: KeyedCounters,
    addons: KeyedCounters,
    bucket: BucketConfig,
    clock: Arc<dyn Clock>,
}

impl BucketCompass {
    pub fn new(
        bucket: &BucketConfig,
        meter: &MeterConfig,
        compass: &CompassConfig,
        reservoir: Box<dyn Reservoir>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let timer = SampledTimer::new(bucket, meter, reservoir, Arc::clone(&clock))?;
        let success = BucketCounter::new(bucket.interval, bucket.bucket_count, Arc::clone(&clock))?;
        Ok(Self {
            timer,
            success: Arc::new(success),
            error_codes: KeyedCounters::new(compass.max_error_codes, "error_code"),
            addons: KeyedCounters::new(compass.max_addons, "addon"),
            bucket: bucket.clone(),
            clock,
        })
    }

    pub fn time(&self) -> CompassContext<'_> {
        CompassContext::new(self)
    }

    fn new_counter(&self) -> Result<BucketCounter> {
        BucketCounter::new(
            self.bucket.interval,
            self.bucket.bucket_count,
            Arc::clone(&self.clock),
        )
    }
}

impl Compass for BucketCompass {
    fn update_with(
        &self,
        duration: Duration,
        success: bool,
        error_code: Option<&str>,
        addon: Option<&str>,
    ) {
        self.timer.update(duration);
        if success {
            self.success.update();
        }
        if let Some(code) = error_code {
            self.error_codes.update_by(code, 1, || self.new_counter());
        }
        if let Some(addon) = addon {
            self.addons.update_by(addon, 1, || self.new_counter());
        }
    }

    fn success_count(&self) -> u64 {
        self.success.count()
    }

    fn bucket_success_count(&self) -> Arc<BucketCounter> {
        Arc::clone(&self.success)
    }

    fn error_code_counts(&self) -> BTreeMap<String, Arc<BucketCounter>> {
        self.error_codes.snapshot()
    }

    fn addon_counts(&self) -> BTreeMap<String, Arc<BucketCounter>> {
        self.addons.snapshot()
    }

    fn tick(&self) -> u64 {
        self.clock.tick()
    }
}

impl Metered for BucketCompass {
    fn count(&self) -> u64 {
        self.timer.count()
    }

    fn instant_count_since(&self, start_time: i64) -> BTreeMap<i64, u64> {
        self.timer.instant_count_since(start_time)
    }

    fn instant_count_interval(&self) -> Duration {
        self.timer.instant_count_interval()
    }

    fn one_minute_rate(&self) -> f64 {
        self.timer.one_minute_rate()
    }

    fn five_minute_rate(&self) -> f64 {
        self.timer.five_minute_rate()
    }

    fn fifteen_minute_rate(&self) -> f64 {
        self.timer.fifteen_minute_rate()
    }

    fn mean_rate(&self) -> f64 {
        self.timer.mean_rate()
    }
}

impl Sampling for BucketCompass {
    fn snapshot(&self) -> Box<dyn Snapshot> {
        self.timer.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ManualClock;
    use crate::metrics::reservoir::UniformReservoir;

    fn compass_with(clock: &Arc<ManualClock>, config: &CompassConfig) -> BucketCompass {
        let bucket = BucketConfig {
            interval: Duration::from_secs(1),
            bucket_count: 5,
        };
        BucketCompass::new(
            &bucket,
            &MeterConfig::default(),
            config,
            Box::new(UniformReservoir::new(100).unwrap()),
            Arc::clone(clock) as Arc<dyn Clock>,
        )
        .unwrap()
    }

    fn compass(clock: &Arc<ManualClock>) -> BucketCompass {
        compass_with(clock, &CompassConfig::default())
    }

    #[test]
    fn test_outcomes_are_tracked() {
        let clock = Arc::new(ManualClock::new(0));
        let compass = compass(&clock);

        compass.update_with(Duration::from_millis(10), true, None, Some("hit"));
        compass.update_with(Duration::from_millis(20), false, Some("E1"), None);

        assert_eq!(compass.count(), 2);
        assert_eq!(compass.success_count(), 1);
        assert_eq!(compass.success_rate(), 0.5);

        let errors = compass.error_code_counts();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors["E1"].count(), 1);
        assert_eq!(errors["E1"].bucket_counts().get(&0), Some(&1));

        let addons = compass.addon_counts();
        assert_eq!(addons["hit"].count(), 1);

        let bucket_success = compass.bucket_success_count();
        assert_eq!(bucket_success.bucket_counts().get(&0), Some(&1));
    }

    #[test]
    fn test_plain_update_records_timing_only() {
        let clock = Arc::new(ManualClock::new(0));
        let compass = compass(&clock);

        compass.update(Duration::from_millis(4));

        assert_eq!(compass.count(), 1);
        assert_eq!(compass.success_count(), 0);
        assert!(compass.error_code_counts().is_empty());
        assert_eq!(compass.snapshot().max(), 4_000_000);
    }

    #[test]
    fn test_success_rate_before_first_call() {
        let clock = Arc::new(ManualClock::new(0));
        assert!(compass(&clock).success_rate().is_nan());
    }

    #[test]
    fn test_error_codes_are_capped() {
        let clock = Arc::new(ManualClock::new(0));
        let config = CompassConfig {
            max_error_codes: 2,
            ..CompassConfig::default()
        };
        let compass = compass_with(&clock, &config);

        for code in ["E1", "E2", "E3", "E1"] {
            compass.update_with(Duration::from_millis(1), false, Some(code), None);
        }

        let errors = compass.error_code_counts();
        assert_eq!(errors.keys().map(String::as_str).collect::<Vec<_>>(), vec!["E1", "E2"]);
        assert_eq!(errors["E1"].count(), 2);
        assert_eq!(compass.count(), 4);
    }

    #[test]
    fn test_context_defaults_to_failure() {
        let clock = Arc::new(ManualClock::new(0));
        let compass = compass(&clock);

        let context = compass.time();
        clock.advance_millis(3);
        assert_eq!(context.stop(), 3_000_000);

        let mut context = compass.time();
        context.success();
        context.mark_addon("cache");
        context.stop();

        let mut context = compass.time();
        context.error("timeout");
        context.stop();

        assert_eq!(compass.count(), 3);
        assert_eq!(compass.success_count(), 1);
        assert_eq!(compass.addon_counts()["cache"].count(), 1);
        assert_eq!(compass.error_code_counts()["timeout"].count(), 1);
    }

    #[test]
    fn test_context_stopped_twice_records_twice() {
        let clock = Arc::new(ManualClock::new(0));
        let compass = compass(&clock);

        let mut context = compass.time();
        context.success();
        context.mark_addon("retry");
        clock.advance_millis(2);
        assert_eq!(context.stop(), 2_000_000);
        clock.advance_millis(3);
        assert_eq!(context.stop(), 5_000_000);

        assert_eq!(compass.count(), 2);
        assert_eq!(compass.success_count(), 2);
        assert_eq!(compass.addon_counts()["retry"].count(), 2);
        assert_eq!(compass.snapshot().values(), vec![2_000_000, 5_000_000]);
    }

    #[test]
    fn test_trait_object_context() {
        let clock = Arc::new(ManualClock::new(0));
        let compass: Arc<dyn Compass> = Arc::new(compass(&clock));

        let mut context = compass.time();
        context.success();
        clock.advance_millis(2);
        context.stop();

        assert_eq!(compass.success_count(), 1);
        assert_eq!(compass.snapshot().max(), 2_000_000);
    }
}
