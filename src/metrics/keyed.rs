//! Bucket counters keyed by open-ended strings, created on first use.
//!
//! The key set is small and capped, and almost every call hits a key that
//! already exists. Lookups read an immutable map through `ArcSwap`, so a
//! writer never waits on a lock. A first-seen key copies the map under a
//! mutex and publishes the new version; only that cold path serialises.

use crate::core::Result;
use crate::metrics::bucket_counter::BucketCounter;
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

type CounterMap = HashMap<String, Arc<BucketCounter>, ahash::RandomState>;

/// At most `max` lazily created counters
pub(crate) struct KeyedCounters {
    counters: ArcSwap<CounterMap>,
    insert_lock: Mutex<()>,
    max: usize,
    overflow_logged: AtomicBool,
    label: &'static str,
}

impl KeyedCounters {
    pub(crate) fn new(max: usize, label: &'static str) -> Self {
        Self {
            counters: ArcSwap::from_pointee(CounterMap::default()),
            insert_lock: Mutex::new(()),
            max,
            overflow_logged: AtomicBool::new(false),
            label,
        }
    }

    /// Add `n` to `key`'s counter, creating it with `make` if the cap allows
    #[inline]
    pub(crate) fn update_by(
        &self,
        key: &str,
        n: u64,
        make: impl FnOnce() -> Result<BucketCounter>,
    ) {
        if let Some(counter) = self.counters.load().get(key) {
            counter.update_by(n);
            return;
        }
        if let Some(counter) = self.insert(key, make) {
            counter.update_by(n);
        }
    }

    #[cold]
    fn insert(
        &self,
        key: &str,
        make: impl FnOnce() -> Result<BucketCounter>,
    ) -> Option<Arc<BucketCounter>> {
        let _guard = self.insert_lock.lock();

        // Another writer may have published the key while we waited
        let current = self.counters.load_full();
        if let Some(counter) = current.get(key) {
            return Some(Arc::clone(counter));
        }

        if current.len() >= self.max {
            if !self.overflow_logged.swap(true, Ordering::Relaxed) {
                debug!(kind = self.label, key, max = self.max, "too many distinct keys, dropping");
            }
            return None;
        }

        let counter = match make() {
            Ok(counter) => Arc::new(counter),
            Err(e) => {
                debug!(kind = self.label, key, error = %e, "failed to create counter");
                return None;
            },
        };

        let mut next = CounterMap::clone(&current);
        next.insert(key.to_owned(), Arc::clone(&counter));
        self.counters.store(Arc::new(next));
        debug!(kind = self.label, key, "created counter");
        Some(counter)
    }

    /// Every counter created so far, ordered by key
    pub(crate) fn snapshot(&self) -> BTreeMap<String, Arc<BucketCounter>> {
        self.counters
            .load()
            .iter()
            .map(|(key, counter)| (key.clone(), Arc::clone(counter)))
            .collect()
    }
}
