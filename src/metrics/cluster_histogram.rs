//! Fixed-boundary histogram bucketed by time.
//!
//! Counts from many hosts can be summed boundary by boundary, which is what
//! makes cluster-wide quantiles possible. A value is counted against the
//! first boundary `>=` it; an implicit `i64::MAX` boundary catches the rest.

use crate::core::{Clock, MetricsError, Result};
use crate::metrics::bucket_counter::BucketCounter;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Most boundaries a cluster histogram accepts, sentinel excluded
pub const MAX_BUCKET_COUNT: usize = 100;

/// Boundary standing for `+∞`
pub const INFINITY_BOUNDARY: i64 = i64::MAX;

/// Histogram over fixed value ranges, kept per time bucket
pub trait ClusterHistogram: Send + Sync {
    /// Count `value` against the first boundary `>=` it
    fn update(&self, value: i64);

    /// Per live time bucket (at or after `start_time`), the count of each
    /// boundary. A boundary `b` stands for the range `(previous, b]`.
    fn bucket_values(&self, start_time: i64) -> BTreeMap<i64, BTreeMap<i64, u64>>;

    /// Sorted boundaries including the `+∞` sentinel
    fn boundaries(&self) -> &[i64];

    fn bucket_interval(&self) -> Duration;
}

/// [`ClusterHistogram`] with one bucket counter per boundary
pub struct BoundedClusterHistogram {
    boundaries: Vec<i64>,
    counters: Vec<BucketCounter>,
    interval: Duration,
}

impl BoundedClusterHistogram {
    pub fn new(
        boundaries: &[i64],
        interval: Duration,
        bucket_count: usize,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        if boundaries.is_empty() {
            return Err(MetricsError::invalid_boundaries("at least one boundary is required"));
        }
        if boundaries.len() > MAX_BUCKET_COUNT {
            return Err(MetricsError::invalid_boundaries(format!(
                "at most {} boundaries are allowed, got {}",
                MAX_BUCKET_COUNT,
                boundaries.len()
            )));
        }

        let mut sorted = boundaries.to_vec();
        sorted.push(INFINITY_BOUNDARY);
        sorted.sort_unstable();
        sorted.dedup();

        let counters = sorted
            .iter()
            .map(|_| BucketCounter::with_total(interval, bucket_count, Arc::clone(&clock), false))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            boundaries: sorted,
            counters,
            interval,
        })
    }

    #[inline]
    fn index_of(&self, value: i64) -> usize {
        // The sentinel guarantees a match
        self.boundaries.partition_point(|&b| b < value)
    }

    /// Counts per boundary summed over live buckets at or after `start_time`
    pub fn totals_since(&self, start_time: i64) -> Vec<u64> {
        self.counters
            .iter()
            .map(|counter| counter.sum_since(start_time))
            .collect()
    }
}

impl ClusterHistogram for BoundedClusterHistogram {
    #[inline]
    fn update(&self, value: i64) {
        self.counters[self.index_of(value)].update();
    }

    fn bucket_values(&self, start_time: i64) -> BTreeMap<i64, BTreeMap<i64, u64>> {
        let mut values: BTreeMap<i64, BTreeMap<i64, u64>> = BTreeMap::new();
        for (&boundary, counter) in self.boundaries.iter().zip(&self.counters) {
            for (timestamp, count) in counter.bucket_counts_since(start_time) {
                values
                    .entry(timestamp)
                    .or_insert_with(|| self.boundaries.iter().map(|&b| (b, 0)).collect())
                    .insert(boundary, count);
            }
        }
        values
    }

    fn boundaries(&self) -> &[i64] {
        &self.boundaries
    }

    fn bucket_interval(&self) -> Duration {
        self.interval
    }
}
