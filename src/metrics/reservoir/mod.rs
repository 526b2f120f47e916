//! Pluggable sampling strategies behind histograms, timers and compasses.
//!
//! Writers never block: the array-backed reservoirs are pure atomics and the
//! ordered ones stage writes in a lock-free queue that is folded in by
//! whichever thread wins a `try_lock`. Readers copy under a short lock and sort
//! outside it.

mod bucket;
mod exponentially_decaying;
mod sliding_time_window;
mod sliding_window;
mod uniform;

pub use bucket::BucketReservoir;
pub use exponentially_decaying::ExponentiallyDecayingReservoir;
pub use sliding_time_window::SlidingTimeWindowReservoir;
pub use sliding_window::SlidingWindowReservoir;
pub use uniform::UniformReservoir;

use crate::core::config::{BucketConfig, ReservoirConfig};
use crate::core::{Clock, Result};
use crate::metrics::snapshot::Snapshot;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A bounded sample of a stream of values
pub trait Reservoir: Send + Sync {
    /// Number of values currently retained
    fn size(&self) -> usize;

    /// Offer a value to the reservoir
    fn update(&self, value: i64);

    /// Immutable, sorted copy of the retained values
    fn snapshot(&self) -> Box<dyn Snapshot>;
}

/// Sampling strategy, chosen once when a metric is built
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservoirType {
    ExponentiallyDecaying,
    SlidingTimeWindow,
    SlidingWindow,
    Uniform,
    Bucket,
}

impl ReservoirType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservoirType::ExponentiallyDecaying => "exponentially_decaying",
            ReservoirType::SlidingTimeWindow => "sliding_time_window",
            ReservoirType::SlidingWindow => "sliding_window",
            ReservoirType::Uniform => "uniform",
            ReservoirType::Bucket => "bucket",
        }
    }

    /// Build a reservoir of this type.
    ///
    /// The bucket reservoir follows the metric's bucket layout so its snapshot
    /// covers the same window as the meter beside it.
    pub fn build(
        self,
        reservoir: &ReservoirConfig,
        buckets: &BucketConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Box<dyn Reservoir>> {
        Ok(match self {
            ReservoirType::ExponentiallyDecaying => Box::new(
                ExponentiallyDecayingReservoir::new(reservoir.size, reservoir.alpha, clock)?,
            ),
            ReservoirType::SlidingTimeWindow => {
                Box::new(SlidingTimeWindowReservoir::new(reservoir.window, clock)?)
            },
            ReservoirType::SlidingWindow => Box::new(SlidingWindowReservoir::new(reservoir.size)?),
            ReservoirType::Uniform => Box::new(UniformReservoir::new(reservoir.size)?),
            ReservoirType::Bucket => Box::new(BucketReservoir::new(
                buckets.interval,
                buckets.bucket_count,
                clock,
            )?),
        })
    }
}

impl std::fmt::Display for ReservoirType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
