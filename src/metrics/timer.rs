//! Call rate plus latency distribution.

use crate::core::config::{BucketConfig, MeterConfig};
use crate::core::{Clock, Result};
use crate::metrics::histogram::{Histogram, SampledHistogram, Sampling};
use crate::metrics::meter::{EwmaMeter, Meter, Metered};
use crate::metrics::reservoir::Reservoir;
use crate::metrics::snapshot::Snapshot;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Times operations. Snapshot values are nanoseconds.
pub trait Timer: Metered + Sampling {
    fn update(&self, duration: Duration);

    /// Monotonic tick of the timer's clock, the start point of a context
    fn tick(&self) -> u64;
}

impl dyn Timer + '_ {
    /// Start timing; call [`TimerContext::stop`] when done
    pub fn time(&self) -> TimerContext<'_> {
        TimerContext::new(self)
    }

    /// Time a closure and return its result
    pub fn time_fn<T>(&self, f: impl FnOnce() -> T) -> T {
        let context = self.time();
        let result = f();
        context.stop();
        result
    }
}

/// In-flight measurement handed out by `time()`
pub struct TimerContext<'a> {
    timer: &'a dyn Timer,
    start: u64,
}

impl<'a> TimerContext<'a> {
    pub fn new(timer: &'a dyn Timer) -> Self {
        Self {
            start: timer.tick(),
            timer,
        }
    }

    /// Record the time since start and return it in nanoseconds.
    ///
    /// Each call records again, measured from the same start.
    pub fn stop(&self) -> u64 {
        let elapsed = self.timer.tick().saturating_sub(self.start);
        self.timer.update(Duration::from_nanos(elapsed));
        elapsed
    }
}

/// [`Timer`] built from an [`EwmaMeter`] and a [`SampledHistogram`]
pub struct SampledTimer {
    meter: EwmaMeter,
    histogram: SampledHistogram,
    clock: Arc<dyn Clock>,
}

impl SampledTimer {
    pub fn new(
        bucket: &BucketConfig,
        meter: &MeterConfig,
        reservoir: Box<dyn Reservoir>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        Ok(Self {
            meter: EwmaMeter::new(bucket, meter, Arc::clone(&clock))?,
            histogram: SampledHistogram::new(reservoir),
            clock,
        })
    }

    pub fn time(&self) -> TimerContext<'_> {
        TimerContext::new(self)
    }
}

#[inline]
pub(crate) fn duration_nanos(duration: Duration) -> i64 {
    i64::try_from(duration.as_nanos()).unwrap_or(i64::MAX)
}

impl Timer for SampledTimer {
    #[inline]
    fn update(&self, duration: Duration) {
        self.histogram.update(duration_nanos(duration));
        self.meter.mark();
    }

    fn tick(&self) -> u64 {
        self.clock.tick()
    }
}

impl Metered for SampledTimer {
    fn count(&self) -> u64 {
        self.meter.count()
    }

    fn instant_count_since(&self, start_time: i64) -> BTreeMap<i64, u64> {
        self.meter.instant_count_since(start_time)
    }

    fn instant_count_interval(&self) -> Duration {
        self.meter.instant_count_interval()
    }

    fn one_minute_rate(&self) -> f64 {
        self.meter.one_minute_rate()
    }

    fn five_minute_rate(&self) -> f64 {
        self.meter.five_minute_rate()
    }

    fn fifteen_minute_rate(&self) -> f64 {
        self.meter.fifteen_minute_rate()
    }

    fn mean_rate(&self) -> f64 {
        self.meter.mean_rate()
    }
}

impl Sampling for SampledTimer {
    fn snapshot(&self) -> Box<dyn Snapshot> {
        self.histogram.snapshot()
    }
}
