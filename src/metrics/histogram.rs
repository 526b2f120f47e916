//! Value distributions backed by a reservoir.

use crate::metrics::reservoir::Reservoir;
use crate::metrics::snapshot::Snapshot;
use std::sync::atomic::{AtomicU64, Ordering};

/// Anything that can hand out a distribution snapshot
pub trait Sampling: Send + Sync {
    fn snapshot(&self) -> Box<dyn Snapshot>;
}

/// Records values and keeps a sample of them
pub trait Histogram: Sampling {
    fn update(&self, value: i64);

    /// Values recorded since creation, sampled or not
    fn count(&self) -> u64;
}

/// [`Histogram`] over any [`Reservoir`]
pub struct SampledHistogram {
    count: AtomicU64,
    reservoir: Box<dyn Reservoir>,
}

impl SampledHistogram {
    pub fn new(reservoir: Box<dyn Reservoir>) -> Self {
        Self {
            count: AtomicU64::new(0),
            reservoir,
        }
    }
}

impl Histogram for SampledHistogram {
    #[inline]
    fn update(&self, value: i64) {
        self.count.fetch_add(1, Ordering::Relaxed);
        self.reservoir.update(value);
    }

    fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}

impl Sampling for SampledHistogram {
    fn snapshot(&self) -> Box<dyn Snapshot> {
        self.reservoir.snapshot()
    }
}
