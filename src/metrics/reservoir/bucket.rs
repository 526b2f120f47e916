//! Reservoir that counts values into fixed ranges per time bucket.
//!
//! Memory is constant regardless of call rate. Percentiles are resolved to
//! the upper boundary of the range holding the rank; the mean is exact.

use super::Reservoir;
use crate::core::{Clock, Result};
use crate::metrics::bucket_counter::BucketCounter;
use crate::metrics::cluster_histogram::{BoundedClusterHistogram, ClusterHistogram};
use crate::metrics::snapshot::{BucketSnapshot, Snapshot};
use std::sync::Arc;
use std::time::Duration;

/// Powers of two from 1 to 2^40
fn default_boundaries() -> Vec<i64> {
    (0..=40).map(|shift| 1i64 << shift).collect()
}

/// Time-bucketed range counts standing in for sampled values
pub struct BucketReservoir {
    histogram: BoundedClusterHistogram,
    total_value: BucketCounter,
    interval_ms: i64,
    clock: Arc<dyn Clock>,
}

impl BucketReservoir {
    /// Reservoir with power-of-two value ranges
    pub fn new(interval: Duration, bucket_count: usize, clock: Arc<dyn Clock>) -> Result<Self> {
        Self::with_boundaries(&default_boundaries(), interval, bucket_count, clock)
    }

    pub fn with_boundaries(
        boundaries: &[i64],
        interval: Duration,
        bucket_count: usize,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let histogram =
            BoundedClusterHistogram::new(boundaries, interval, bucket_count, Arc::clone(&clock))?;
        let total_value =
            BucketCounter::with_total(interval, bucket_count, Arc::clone(&clock), false)?;
        Ok(Self {
            histogram,
            total_value,
            interval_ms: interval.as_millis() as i64,
            clock,
        })
    }

    /// Previous complete bucket plus the one being filled
    fn window_start(&self) -> i64 {
        let now = self.clock.time();
        now - now.rem_euclid(self.interval_ms) - self.interval_ms
    }
}

impl Reservoir for BucketReservoir {
    fn size(&self) -> usize {
        self.histogram
            .totals_since(self.window_start())
            .iter()
            .sum::<u64>() as usize
    }

    fn update(&self, value: i64) {
        self.histogram.update(value);
        self.total_value.update_by(value.max(0) as u64);
    }

    fn snapshot(&self) -> Box<dyn Snapshot> {
        let start = self.window_start();
        let counts = self.histogram.totals_since(start);
        let sum = self.total_value.sum_since(start);
        Box::new(BucketSnapshot::new(
            self.histogram.boundaries().to_vec(),
            counts,
            sum,
        ))
    }
}
