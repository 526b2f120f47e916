//! Builds metrics from a [`Config`].
//!
//! All construction-time validation happens here, so the returned metrics can
//! record without ever failing. With `enabled: false` every builder hands out
//! the no-op implementation of the requested kind.

use crate::core::config::{BucketConfig, ReservoirConfig};
use crate::core::{default_clock, Clock, Config, Result};
use crate::metrics::{
    AtomicCounter, BoundedClusterHistogram, BucketCompass, CachedGauge, ClusterHistogram, Compass,
    Counter, EwmaMeter, FastCompass, FnGauge, Gauge, Histogram, Meter, NopClusterHistogram,
    NopCompass, NopCounter, NopFastCompass, NopGauge, NopHistogram, NopMeter, NopTimer,
    PackedFastCompass, Reservoir, ReservoirType, SampledHistogram, SampledTimer, Timer,
};
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Builds every metric kind against one configuration and clock
pub struct MetricFactory {
    config: Config,
    clock: Arc<dyn Clock>,
}

impl MetricFactory {
    /// Factory on the process-wide system clock
    pub fn new(config: Config) -> Result<Self> {
        Self::with_clock(config, default_clock())
    }

    pub fn with_clock(config: Config, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;
        if !config.enabled {
            info!("metrics disabled, handing out no-op implementations");
        }
        Ok(Self { config, clock })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    fn reservoir(&self, kind: ReservoirType) -> Result<Box<dyn Reservoir>> {
        let reservoir = ReservoirConfig {
            kind,
            ..self.config.reservoir.clone()
        };
        kind.build(&reservoir, &self.config.bucket, Arc::clone(&self.clock))
    }

    fn bucket(&self) -> &BucketConfig {
        &self.config.bucket
    }

    pub fn counter(&self) -> Arc<dyn Counter> {
        if !self.is_enabled() {
            return Arc::new(NopCounter);
        }
        Arc::new(AtomicCounter::new())
    }

    /// Gauge reading `read` on every call
    pub fn gauge<F, E>(&self, read: F) -> Arc<dyn Gauge>
    where
        F: Fn() -> std::result::Result<f64, E> + Send + Sync + 'static,
        E: Display + 'static,
    {
        if !self.is_enabled() {
            return Arc::new(NopGauge);
        }
        Arc::new(FnGauge::new(read))
    }

    /// Gauge running `load` at most once per `ttl`
    pub fn cached_gauge<F>(&self, ttl: Duration, load: F) -> Arc<dyn Gauge>
    where
        F: Fn() -> Option<f64> + Send + Sync + 'static,
    {
        if !self.is_enabled() {
            return Arc::new(NopGauge);
        }
        Arc::new(CachedGauge::new(ttl, Arc::clone(&self.clock), load))
    }

    pub fn meter(&self) -> Result<Arc<dyn Meter>> {
        if !self.is_enabled() {
            return Ok(Arc::new(NopMeter));
        }
        Ok(Arc::new(EwmaMeter::new(
            self.bucket(),
            &self.config.meter,
            Arc::clone(&self.clock),
        )?))
    }

    /// Histogram with the configured reservoir
    pub fn histogram(&self) -> Result<Arc<dyn Histogram>> {
        self.histogram_with(self.config.reservoir.kind)
    }

    pub fn histogram_with(&self, kind: ReservoirType) -> Result<Arc<dyn Histogram>> {
        if !self.is_enabled() {
            return Ok(Arc::new(NopHistogram));
        }
        Ok(Arc::new(SampledHistogram::new(self.reservoir(kind)?)))
    }

    /// Timer with the configured reservoir
    pub fn timer(&self) -> Result<Arc<dyn Timer>> {
        self.timer_with(self.config.reservoir.kind)
    }

    pub fn timer_with(&self, kind: ReservoirType) -> Result<Arc<dyn Timer>> {
        if !self.is_enabled() {
            return Ok(Arc::new(NopTimer));
        }
        Ok(Arc::new(SampledTimer::new(
            self.bucket(),
            &self.config.meter,
            self.reservoir(kind)?,
            Arc::clone(&self.clock),
        )?))
    }

    /// Compass with the configured reservoir
    pub fn compass(&self) -> Result<Arc<dyn Compass>> {
        self.compass_with(self.config.reservoir.kind)
    }

    pub fn compass_with(&self, kind: ReservoirType) -> Result<Arc<dyn Compass>> {
        if !self.is_enabled() {
            return Ok(Arc::new(NopCompass));
        }
        Ok(Arc::new(BucketCompass::new(
            self.bucket(),
            &self.config.meter,
            &self.config.compass,
            self.reservoir(kind)?,
            Arc::clone(&self.clock),
        )?))
    }

    pub fn fast_compass(&self) -> Result<Arc<dyn FastCompass>> {
        if !self.is_enabled() {
            return Ok(Arc::new(NopFastCompass));
        }
        Ok(Arc::new(PackedFastCompass::new(
            &self.config.fast_compass,
            Arc::clone(&self.clock),
        )?))
    }

    /// Cluster histogram over `boundaries`, validated even when disabled
    pub fn cluster_histogram(&self, boundaries: &[i64]) -> Result<Arc<dyn ClusterHistogram>> {
        let config = &self.config.cluster_histogram;
        let histogram = BoundedClusterHistogram::new(
            boundaries,
            config.interval,
            config.bucket_count,
            Arc::clone(&self.clock),
        )?;
        if !self.is_enabled() {
            return Ok(Arc::new(NopClusterHistogram));
        }
        Ok(Arc::new(histogram))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ConfigBuilder, ManualClock};
    use crate::metrics::{Metered, Sampling};

    fn factory(enabled: bool) -> MetricFactory {
        let config = ConfigBuilder::new().enabled(enabled).build().unwrap();
        MetricFactory::with_clock(config, Arc::new(ManualClock::new(0))).unwrap()
    }

    #[test]
    fn test_enabled_factory_records() {
        let factory = factory(true);

        let compass = factory.compass().unwrap();
        compass.update_with(Duration::from_millis(10), true, None, None);
        compass.update_with(Duration::from_millis(20), false, Some("E1"), None);
        assert_eq!(compass.count(), 2);
        assert_eq!(compass.success_rate(), 0.5);

        let fast = factory.fast_compass().unwrap();
        fast.record(Duration::from_millis(3), "ok");
        assert_eq!(fast.method_count_per_category()["ok"][&0], 1);

        let counter = factory.counter();
        counter.inc();
        assert_eq!(counter.count(), 1);
    }

    #[test]
    fn test_disabled_factory_hands_out_nops() {
        let factory = factory(false);

        let timer = factory.timer().unwrap();
        timer.update(Duration::from_millis(5));
        assert_eq!(timer.count(), 0);

        let meter = factory.meter().unwrap();
        meter.mark();
        assert_eq!(meter.count(), 0);

        let gauge = factory.gauge(|| Ok::<f64, String>(1.0));
        assert_eq!(gauge.value(), None);
    }

    #[test]
    fn test_cluster_boundaries_validated_when_disabled() {
        let factory = factory(false);
        assert!(factory.cluster_histogram(&[]).is_err());
        assert!(factory.cluster_histogram(&[10, 100]).is_ok());
    }

    #[test]
    fn test_every_reservoir_kind() {
        let factory = factory(true);
        for kind in [
            ReservoirType::ExponentiallyDecaying,
            ReservoirType::SlidingTimeWindow,
            ReservoirType::SlidingWindow,
            ReservoirType::Uniform,
            ReservoirType::Bucket,
        ] {
            let histogram = factory.histogram_with(kind).unwrap();
            histogram.update(42);
            assert_eq!(histogram.count(), 1);
            assert_eq!(histogram.snapshot().size(), 1, "{}", kind);
        }
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = Config::default();
        config.bucket.bucket_count = 0;
        assert!(MetricFactory::new(config).is_err());
    }
}
