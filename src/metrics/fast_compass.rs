//! Per-category call count and total latency with one atomic add per call.
//!
//! Each record packs `1 << COUNT_OFFSET | millis` into a single `u64` and adds
//! it to the category's current bucket. The upper bits accumulate the call
//! count and the lower bits the summed milliseconds. A record's own duration
//! is clamped to the lower field; a bucket whose summed duration overflows
//! the field carries into the count, so totals past the field width are
//! approximate.

use crate::core::config::FastCompassConfig;
use crate::core::{Clock, Result};
use crate::metrics::bucket_counter::BucketCounter;
use crate::metrics::keyed::KeyedCounters;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Bit position of the count field
pub const COUNT_OFFSET: u32 = 38;
/// Lower field holding summed milliseconds
pub const DURATION_MASK: u64 = (1 << COUNT_OFFSET) - 1;

/// Calls and their summed latency within one bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CountAndRt {
    pub count: u64,
    /// Total milliseconds
    pub rt: u64,
}

impl CountAndRt {
    #[inline]
    pub fn unpack(packed: u64) -> Self {
        Self {
            count: packed >> COUNT_OFFSET,
            rt: packed & DURATION_MASK,
        }
    }

    #[inline]
    pub fn pack(duration: Duration) -> u64 {
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        (1 << COUNT_OFFSET) | millis.min(DURATION_MASK)
    }
}

/// Per-bucket, per-category timings at minimal recording cost
pub trait FastCompass: Send + Sync {
    /// Record one call of `sub_category` taking `duration`
    fn record(&self, duration: Duration, sub_category: &str);

    /// Calls per category per live bucket at or after `start_time`
    fn method_count_per_category_since(&self, start_time: i64)
        -> BTreeMap<String, BTreeMap<i64, u64>>;

    /// Summed milliseconds per category per live bucket at or after `start_time`
    fn method_rt_per_category_since(&self, start_time: i64) -> BTreeMap<String, BTreeMap<i64, u64>>;

    /// Both of the above from one read of each bucket
    fn count_and_rt_per_category_since(
        &self,
        start_time: i64,
    ) -> BTreeMap<String, BTreeMap<i64, CountAndRt>>;

    fn method_count_per_category(&self) -> BTreeMap<String, BTreeMap<i64, u64>> {
        self.method_count_per_category_since(i64::MIN)
    }

    fn method_rt_per_category(&self) -> BTreeMap<String, BTreeMap<i64, u64>> {
        self.method_rt_per_category_since(i64::MIN)
    }

    fn count_and_rt_per_category(&self) -> BTreeMap<String, BTreeMap<i64, CountAndRt>> {
        self.count_and_rt_per_category_since(i64::MIN)
    }

    fn bucket_interval(&self) -> Duration;
}

/// [`FastCompass`] with one total-free bucket counter per category
pub struct PackedFastCompass {
    categories: KeyedCounters,
    interval: Duration,
    bucket_count: usize,
    clock: Arc<dyn Clock>,
}

impl PackedFastCompass {
    pub fn new(config: &FastCompassConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        // Validate the bucket layout up front so lazy creation cannot fail
        BucketCounter::with_total(config.interval, config.bucket_count, Arc::clone(&clock), false)?;
        Ok(Self {
            categories: KeyedCounters::new(config.max_categories, "category"),
            interval: config.interval,
            bucket_count: config.bucket_count,
            clock,
        })
    }

    fn per_category<T>(
        &self,
        start_time: i64,
        map: impl Fn(u64) -> T,
    ) -> BTreeMap<String, BTreeMap<i64, T>> {
        self.categories
            .snapshot()
            .into_iter()
            .map(|(category, counter)| {
                let buckets = counter
                    .bucket_counts_since(start_time)
                    .into_iter()
                    .map(|(timestamp, packed)| (timestamp, map(packed)))
                    .collect();
                (category, buckets)
            })
            .collect()
    }
}

impl FastCompass for PackedFastCompass {
    #[inline]
    fn record(&self, duration: Duration, sub_category: &str) {
        self.categories.update_by(sub_category, CountAndRt::pack(duration), || {
            BucketCounter::with_total(self.interval, self.bucket_count, Arc::clone(&self.clock), false)
        });
    }

    fn method_count_per_category_since(
        &self,
        start_time: i64,
    ) -> BTreeMap<String, BTreeMap<i64, u64>> {
        self.per_category(start_time, |packed| CountAndRt::unpack(packed).count)
    }

    fn method_rt_per_category_since(&self, start_time: i64) -> BTreeMap<String, BTreeMap<i64, u64>> {
        self.per_category(start_time, |packed| CountAndRt::unpack(packed).rt)
    }

    fn count_and_rt_per_category_since(
        &self,
        start_time: i64,
    ) -> BTreeMap<String, BTreeMap<i64, CountAndRt>> {
        self.per_category(start_time, CountAndRt::unpack)
    }

    fn bucket_interval(&self) -> Duration {
        self.interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ManualClock;

    fn compass(clock: &Arc<ManualClock>, max_categories: usize) -> PackedFastCompass {
        let config = FastCompassConfig {
            interval: Duration::from_secs(1),
            bucket_count: 5,
            max_categories,
        };
        PackedFastCompass::new(&config, Arc::clone(clock) as Arc<dyn Clock>).unwrap()
    }

    #[test]
    fn test_pack_and_unpack() {
        let packed = CountAndRt::pack(Duration::from_millis(250)) * 3;
        assert_eq!(CountAndRt::unpack(packed), CountAndRt { count: 3, rt: 750 });
    }

    #[test]
    fn test_single_duration_is_clamped() {
        let huge = Duration::from_secs(u64::MAX / 1_000);
        assert_eq!(CountAndRt::unpack(CountAndRt::pack(huge)), CountAndRt {
            count: 1,
            rt: DURATION_MASK,
        });
    }

    #[test]
    fn test_per_category_per_bucket() {
        let clock = Arc::new(ManualClock::new(0));
        let compass = compass(&clock, 20);

        compass.record(Duration::from_millis(10), "success");
        compass.record(Duration::from_millis(30), "success");
        compass.record(Duration::from_millis(5), "error");
        clock.advance_millis(1_000);
        compass.record(Duration::from_millis(7), "success");

        let counts = compass.method_count_per_category();
        assert_eq!(counts["success"][&0], 2);
        assert_eq!(counts["success"][&1_000], 1);
        assert_eq!(counts["error"][&0], 1);

        let rts = compass.method_rt_per_category();
        assert_eq!(rts["success"][&0], 40);
        assert_eq!(rts["error"][&0], 5);

        let recent = compass.count_and_rt_per_category_since(1_000);
        assert_eq!(recent["success"].len(), 1);
        assert_eq!(recent["success"][&1_000], CountAndRt { count: 1, rt: 7 });
        assert!(recent["error"].is_empty());
    }

    #[test]
    fn test_categories_are_capped() {
        let clock = Arc::new(ManualClock::new(0));
        let compass = compass(&clock, 2);

        for category in ["a", "b", "c", "a"] {
            compass.record(Duration::from_millis(1), category);
        }

        let counts = compass.method_count_per_category();
        assert_eq!(counts.keys().map(String::as_str).collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(counts["a"][&0], 2);
    }

    #[test]
    fn test_concurrent_records() {
        use std::thread;

        let clock = Arc::new(ManualClock::new(0));
        let compass = Arc::new(compass(&clock, 20));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let compass = Arc::clone(&compass);
                thread::spawn(move || {
                    for _ in 0..10_000 {
                        compass.record(Duration::from_millis(2), "hot");
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let totals = compass.count_and_rt_per_category();
        assert_eq!(totals["hot"][&0], CountAndRt {
            count: 80_000,
            rt: 160_000,
        });
    }

    #[test]
    fn test_new_categories_while_recording() {
        use std::thread;

        let clock = Arc::new(ManualClock::new(0));
        let compass = Arc::new(compass(&clock, 200));
        compass.record(Duration::from_millis(1), "hot");

        let creator = {
            let compass = Arc::clone(&compass);
            thread::spawn(move || {
                for n in 0..100 {
                    compass.record(Duration::from_millis(1), &format!("cold-{}", n));
                }
            })
        };
        let recorders: Vec<_> = (0..4)
            .map(|_| {
                let compass = Arc::clone(&compass);
                thread::spawn(move || {
                    for _ in 0..10_000 {
                        compass.record(Duration::from_millis(1), "hot");
                    }
                })
            })
            .collect();
        creator.join().unwrap();
        for handle in recorders {
            handle.join().unwrap();
        }

        let counts = compass.method_count_per_category();
        assert_eq!(counts.len(), 101);
        assert_eq!(counts["hot"][&0], 40_001);
        assert_eq!(counts["cold-42"][&0], 1);
    }
}
