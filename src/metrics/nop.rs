//! No-op metrics handed out when collection is disabled.
//!
//! Every write is discarded and every read is empty or zero, so callers never
//! need to branch on whether metrics are on.

use crate::core::default_clock;
use crate::metrics::bucket_counter::BucketCounter;
use crate::metrics::cluster_histogram::{ClusterHistogram, INFINITY_BOUNDARY};
use crate::metrics::compass::Compass;
use crate::metrics::counter::Counter;
use crate::metrics::fast_compass::{CountAndRt, FastCompass};
use crate::metrics::gauge::Gauge;
use crate::metrics::histogram::{Histogram, Sampling};
use crate::metrics::meter::{Meter, Metered};
use crate::metrics::snapshot::{Snapshot, UniformSnapshot};
use crate::metrics::timer::Timer;
use once_cell::sync::Lazy;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

static EMPTY_BUCKETS: Lazy<Arc<BucketCounter>> =
    Lazy::new(|| Arc::new(BucketCounter::disabled(default_clock())));

static NOP_BOUNDARIES: [i64; 1] = [INFINITY_BOUNDARY];

const NOP_INTERVAL: Duration = Duration::from_secs(60);

fn empty_snapshot() -> Box<dyn Snapshot> {
    Box::new(UniformSnapshot::default())
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NopCounter;

impl Counter for NopCounter {
    fn inc_by(&self, _n: i64) {}

    fn count(&self) -> i64 {
        0
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NopGauge;

impl Gauge for NopGauge {
    fn value(&self) -> Option<f64> {
        None
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NopHistogram;

impl Histogram for NopHistogram {
    fn update(&self, _value: i64) {}

    fn count(&self) -> u64 {
        0
    }
}

impl Sampling for NopHistogram {
    fn snapshot(&self) -> Box<dyn Snapshot> {
        empty_snapshot()
    }
}

macro_rules! nop_metered {
    ($ty:ty) => {
        impl Metered for $ty {
            fn count(&self) -> u64 {
                0
            }

            fn instant_count_since(&self, _start_time: i64) -> BTreeMap<i64, u64> {
                BTreeMap::new()
            }

            fn instant_count_interval(&self) -> Duration {
                NOP_INTERVAL
            }

            fn one_minute_rate(&self) -> f64 {
                0.0
            }

            fn five_minute_rate(&self) -> f64 {
                0.0
            }

            fn fifteen_minute_rate(&self) -> f64 {
                0.0
            }

            fn mean_rate(&self) -> f64 {
                0.0
            }
        }
    };
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NopMeter;

nop_metered!(NopMeter);

impl Meter for NopMeter {
    fn mark_by(&self, _n: u64) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NopTimer;

nop_metered!(NopTimer);

impl Timer for NopTimer {
    fn update(&self, _duration: Duration) {}

    fn tick(&self) -> u64 {
        0
    }
}

impl Sampling for NopTimer {
    fn snapshot(&self) -> Box<dyn Snapshot> {
        empty_snapshot()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NopCompass;

nop_metered!(NopCompass);

impl Compass for NopCompass {
    fn update_with(
        &self,
        _duration: Duration,
        _success: bool,
        _error_code: Option<&str>,
        _addon: Option<&str>,
    ) {
    }

    fn success_count(&self) -> u64 {
        0
    }

    fn success_rate(&self) -> f64 {
        0.0
    }

    fn bucket_success_count(&self) -> Arc<BucketCounter> {
        Arc::clone(&EMPTY_BUCKETS)
    }

    fn error_code_counts(&self) -> BTreeMap<String, Arc<BucketCounter>> {
        BTreeMap::new()
    }

    fn addon_counts(&self) -> BTreeMap<String, Arc<BucketCounter>> {
        BTreeMap::new()
    }

    fn tick(&self) -> u64 {
        0
    }
}

impl Sampling for NopCompass {
    fn snapshot(&self) -> Box<dyn Snapshot> {
        empty_snapshot()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NopFastCompass;

impl FastCompass for NopFastCompass {
    fn record(&self, _duration: Duration, _sub_category: &str) {}

    fn method_count_per_category_since(
        &self,
        _start_time: i64,
    ) -> BTreeMap<String, BTreeMap<i64, u64>> {
        BTreeMap::new()
    }

    fn method_rt_per_category_since(
        &self,
        _start_time: i64,
    ) -> BTreeMap<String, BTreeMap<i64, u64>> {
        BTreeMap::new()
    }

    fn count_and_rt_per_category_since(
        &self,
        _start_time: i64,
    ) -> BTreeMap<String, BTreeMap<i64, CountAndRt>> {
        BTreeMap::new()
    }

    fn bucket_interval(&self) -> Duration {
        NOP_INTERVAL
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NopClusterHistogram;

impl ClusterHistogram for NopClusterHistogram {
    fn update(&self, _value: i64) {}

    fn bucket_values(&self, _start_time: i64) -> BTreeMap<i64, BTreeMap<i64, u64>> {
        BTreeMap::new()
    }

    fn boundaries(&self) -> &[i64] {
        &NOP_BOUNDARIES
    }

    fn bucket_interval(&self) -> Duration {
        NOP_INTERVAL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writes_are_discarded() {
        let counter = NopCounter;
        counter.inc_by(5);
        assert_eq!(counter.count(), 0);

        let meter = NopMeter;
        meter.mark_by(3);
        assert_eq!(meter.count(), 0);
        assert!(meter.instant_count().is_empty());

        let timer: Arc<dyn Timer> = Arc::new(NopTimer);
        assert_eq!(timer.time_fn(|| 1 + 1), 2);
        assert_eq!(timer.count(), 0);
        assert_eq!(timer.snapshot().size(), 0);
    }

    #[test]
    fn test_compass_reads_are_empty() {
        let compass = NopCompass;
        compass.update_with(Duration::from_millis(5), false, Some("E1"), Some("x"));

        assert_eq!(compass.success_count(), 0);
        assert_eq!(compass.success_rate(), 0.0);
        assert!(compass.error_code_counts().is_empty());
        assert!(compass.bucket_success_count().bucket_counts().is_empty());
    }

    #[test]
    fn test_success_buckets_are_not_shared() {
        NopCompass.bucket_success_count().update_by(5);
        NopCompass.bucket_success_count().update();

        let other = NopCompass.bucket_success_count();
        assert_eq!(other.sum_since(i64::MIN), 0);
        assert!(other.bucket_counts().is_empty());
    }

    #[test]
    fn test_fast_compass_and_cluster_histogram() {
        let fast = NopFastCompass;
        fast.record(Duration::from_millis(1), "a");
        assert!(fast.count_and_rt_per_category().is_empty());

        let cluster = NopClusterHistogram;
        cluster.update(42);
        assert!(cluster.bucket_values(0).is_empty());
        assert_eq!(cluster.boundaries(), &[INFINITY_BOUNDARY]);
    }
}
