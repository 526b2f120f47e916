//! Fixed-interval counter with bounded retention.
//!
//! Buckets live in a ring of `bucket_count` cache-padded slots. A slot is
//! keyed by the aligned timestamp `t - t % interval`; the writer that first
//! reaches a new interval reclaims the slot holding the oldest bucket, so
//! eviction is lazy and never touches readers. The hot path is one load plus
//! one `fetch_add` while the slot already belongs to the current interval.

use crate::core::{Clock, MetricsError, Result};
use crossbeam::utils::CachePadded;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Slot has never been written
const VACANT: i64 = i64::MIN;
/// Slot is being reset by the writer that won the claim
const CLAIMING: i64 = i64::MIN + 1;

#[derive(Debug)]
struct Bucket {
    timestamp: AtomicI64,
    count: AtomicU64,
}

impl Bucket {
    fn vacant() -> Self {
        Self {
            timestamp: AtomicI64::new(VACANT),
            count: AtomicU64::new(0),
        }
    }
}

/// Counts events per time bucket plus a lifetime total that outlives eviction
pub struct BucketCounter {
    buckets: Box<[CachePadded<Bucket>]>,
    interval_ms: i64,
    total: AtomicU64,
    update_total: bool,
    /// Drops every write; set only on the shared no-op counter
    discard: bool,
    clock: Arc<dyn Clock>,
}

impl BucketCounter {
    /// Create a counter keeping `bucket_count` buckets of width `interval`
    pub fn new(interval: Duration, bucket_count: usize, clock: Arc<dyn Clock>) -> Result<Self> {
        Self::with_total(interval, bucket_count, clock, true)
    }

    /// Create a counter, optionally without the lifetime total.
    ///
    /// Without the total, `count()` stays at zero and an update in the current
    /// bucket costs a single atomic add.
    pub fn with_total(
        interval: Duration,
        bucket_count: usize,
        clock: Arc<dyn Clock>,
        update_total: bool,
    ) -> Result<Self> {
        let interval_ms = interval.as_millis();
        if interval_ms == 0 || interval_ms > i64::MAX as u128 {
            return Err(MetricsError::invalid_parameter(
                "interval",
                format!("must be at least 1ms, got {:?}", interval),
            ));
        }
        if bucket_count == 0 {
            return Err(MetricsError::invalid_parameter(
                "bucket_count",
                "must be greater than 0",
            ));
        }

        Ok(Self::build(interval_ms as i64, bucket_count, clock, update_total))
    }

    /// Single-bucket counter handed out by disabled metrics. Writes are
    /// discarded, so it stays empty however many callers share it.
    pub(crate) fn disabled(clock: Arc<dyn Clock>) -> Self {
        Self {
            discard: true,
            ..Self::build(60_000, 1, clock, false)
        }
    }

    fn build(interval_ms: i64, bucket_count: usize, clock: Arc<dyn Clock>, update_total: bool) -> Self {
        let buckets = (0..bucket_count)
            .map(|_| CachePadded::new(Bucket::vacant()))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            buckets,
            interval_ms,
            total: AtomicU64::new(0),
            update_total,
            discard: false,
            clock,
        }
    }

    /// Count one event in the current bucket
    #[inline]
    pub fn update(&self) {
        self.update_by(1);
    }

    /// Count `n` events in the current bucket
    #[inline]
    pub fn update_by(&self, n: u64) {
        if self.discard {
            return;
        }
        if self.update_total {
            self.total.fetch_add(n, Ordering::Relaxed);
        }
        self.add_to_bucket(self.align(self.clock.time()), n);
    }

    #[inline]
    fn add_to_bucket(&self, aligned: i64, n: u64) {
        let bucket = &self.buckets[self.slot(aligned)];
        loop {
            let ts = bucket.timestamp.load(Ordering::Acquire);
            if ts == aligned {
                bucket.count.fetch_add(n, Ordering::Relaxed);
                return;
            }
            if ts == CLAIMING {
                std::hint::spin_loop();
                continue;
            }
            if ts > aligned {
                // A newer interval already owns the slot; this write belongs
                // to a bucket that has been evicted.
                return;
            }
            if bucket
                .timestamp
                .compare_exchange(ts, CLAIMING, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                bucket.count.store(n, Ordering::Relaxed);
                bucket.timestamp.store(aligned, Ordering::Release);
                return;
            }
        }
    }

    #[inline]
    fn align(&self, time_ms: i64) -> i64 {
        time_ms - time_ms.rem_euclid(self.interval_ms)
    }

    #[inline]
    fn slot(&self, aligned: i64) -> usize {
        (aligned / self.interval_ms).rem_euclid(self.buckets.len() as i64) as usize
    }

    /// All live buckets, keyed by aligned timestamp
    pub fn bucket_counts(&self) -> BTreeMap<i64, u64> {
        self.bucket_counts_since(i64::MIN)
    }

    /// Live buckets whose timestamp is at or after `start_time`
    pub fn bucket_counts_since(&self, start_time: i64) -> BTreeMap<i64, u64> {
        let current = self.align(self.clock.time());
        let oldest = current - (self.buckets.len() as i64 - 1) * self.interval_ms;
        let lower = oldest.max(start_time);

        let mut counts = BTreeMap::new();
        for bucket in self.buckets.iter() {
            let ts = bucket.timestamp.load(Ordering::Acquire);
            if ts < lower || ts > current {
                continue;
            }
            let count = bucket.count.load(Ordering::Relaxed);
            // Skip a slot that was reclaimed while we read it
            if bucket.timestamp.load(Ordering::Acquire) == ts {
                counts.insert(ts, count);
            }
        }
        counts
    }

    /// Sum of live bucket counts at or after `start_time`
    pub fn sum_since(&self, start_time: i64) -> u64 {
        self.bucket_counts_since(start_time).values().sum()
    }

    /// Lifetime total, never decreased by eviction
    pub fn count(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    pub fn bucket_interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms as u64)
    }

    /// Maximum number of buckets retained
    pub fn bucket_capacity(&self) -> usize {
        self.buckets.len()
    }

    pub(crate) fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }
}

impl std::fmt::Debug for BucketCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BucketCounter")
            .field("interval_ms", &self.interval_ms)
            .field("buckets", &self.buckets.len())
            .field("total", &self.count())
            .finish()
    }
}
