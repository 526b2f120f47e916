//! Time-windowed metric primitives.
//!
//! Every metric records without blocking: the hot paths are atomic adds plus,
//! for open-ended keys, a sharded map lookup. Reads take short locks at most
//! and never stall writers.
//!
//! Each kind is a trait with a real implementation and a no-op one, and a
//! registered metric travels as a [`Metric`] so exporters can dispatch on the
//! kind in one `match`.

pub mod bucket_counter;
pub mod cluster_histogram;
pub mod compass;
pub mod counter;
pub mod ewma;
pub mod fast_compass;
pub mod gauge;
pub mod histogram;
mod keyed;
pub mod meter;
pub mod nop;
pub mod reservoir;
pub mod snapshot;
pub mod timer;

pub use bucket_counter::BucketCounter;
pub use cluster_histogram::{
    BoundedClusterHistogram, ClusterHistogram, INFINITY_BOUNDARY, MAX_BUCKET_COUNT,
};
pub use compass::{BucketCompass, Compass, CompassContext};
pub use counter::{AtomicCounter, Counter};
pub use fast_compass::{CountAndRt, FastCompass, PackedFastCompass};
pub use gauge::{CachedGauge, FnGauge, Gauge};
pub use histogram::{Histogram, SampledHistogram, Sampling};
pub use meter::{EwmaMeter, Meter, Metered};
pub use nop::{
    NopClusterHistogram, NopCompass, NopCounter, NopFastCompass, NopGauge, NopHistogram, NopMeter,
    NopTimer,
};
pub use reservoir::{Reservoir, ReservoirType};
pub use snapshot::{BucketSnapshot, Snapshot, UniformSnapshot, WeightedSample, WeightedSnapshot};
pub use timer::{SampledTimer, Timer, TimerContext};

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Kind tag of a [`Metric`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Counter,
    Gauge,
    Meter,
    Histogram,
    Timer,
    Compass,
    FastCompass,
    ClusterHistogram,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Meter => "meter",
            MetricKind::Histogram => "histogram",
            MetricKind::Timer => "timer",
            MetricKind::Compass => "compass",
            MetricKind::FastCompass => "fast_compass",
            MetricKind::ClusterHistogram => "cluster_histogram",
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Any registered metric
#[derive(Clone)]
pub enum Metric {
    Counter(Arc<dyn Counter>),
    Gauge(Arc<dyn Gauge>),
    Meter(Arc<dyn Meter>),
    Histogram(Arc<dyn Histogram>),
    Timer(Arc<dyn Timer>),
    Compass(Arc<dyn Compass>),
    FastCompass(Arc<dyn FastCompass>),
    ClusterHistogram(Arc<dyn ClusterHistogram>),
}

impl Metric {
    pub fn kind(&self) -> MetricKind {
        match self {
            Metric::Counter(_) => MetricKind::Counter,
            Metric::Gauge(_) => MetricKind::Gauge,
            Metric::Meter(_) => MetricKind::Meter,
            Metric::Histogram(_) => MetricKind::Histogram,
            Metric::Timer(_) => MetricKind::Timer,
            Metric::Compass(_) => MetricKind::Compass,
            Metric::FastCompass(_) => MetricKind::FastCompass,
            Metric::ClusterHistogram(_) => MetricKind::ClusterHistogram,
        }
    }
}

impl std::fmt::Debug for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Metric").field(&self.kind()).finish()
    }
}
