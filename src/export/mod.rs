//! Draining metrics out of the engine.
//!
//! A registry walks its `(MetricName, Metric)` pairs, asks a [`MetricFilter`]
//! which ones to keep and hands the rest to a [`MetricCollector`]. The
//! collector sees every kind through one `match` on [`Metric`].
//!
//! [`ObjectCollector`] is the stock collector: it flattens each metric into
//! [`MetricObject`] records. Bucketed values are read from the last complete
//! bucket before the collection timestamp, so a record never reports a
//! half-filled interval.

use crate::core::{MetricLevel, MetricName, Result};
use crate::metrics::{
    ClusterHistogram, Compass, Counter, FastCompass, Gauge, Histogram, Metered, Sampling, Snapshot,
    INFINITY_BOUNDARY,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

pub use crate::metrics::{Metric, MetricKind};

const NANOS_PER_MILLI: f64 = 1_000_000.0;

/// Selects which metrics get collected
pub trait MetricFilter: Send + Sync {
    fn matches(&self, name: &MetricName, metric: &Metric) -> bool;
}

impl<F> MetricFilter for F
where
    F: Fn(&MetricName, &Metric) -> bool + Send + Sync,
{
    fn matches(&self, name: &MetricName, metric: &Metric) -> bool {
        self(name, metric)
    }
}

/// Accepts every metric
#[derive(Debug, Default, Clone, Copy)]
pub struct AllMetrics;

impl MetricFilter for AllMetrics {
    fn matches(&self, _name: &MetricName, _metric: &Metric) -> bool {
        true
    }
}

/// Accepts metrics at or above a level
#[derive(Debug, Clone, Copy)]
pub struct MinLevel(pub MetricLevel);

impl MetricFilter for MinLevel {
    fn matches(&self, name: &MetricName, _metric: &Metric) -> bool {
        name.level() >= self.0
    }
}

/// Receives metrics one at a time
pub trait MetricCollector {
    /// Record `metric` as observed at `timestamp` (milliseconds since epoch)
    fn collect(&mut self, name: &MetricName, metric: &Metric, timestamp: i64);
}

/// Feed every metric accepted by `filter` to `collector`, returning how many
pub fn collect_all<'a, I>(
    metrics: I,
    filter: &dyn MetricFilter,
    collector: &mut dyn MetricCollector,
    timestamp: i64,
) -> usize
where
    I: IntoIterator<Item = (&'a MetricName, &'a Metric)>,
{
    let mut collected = 0;
    for (name, metric) in metrics {
        if filter.matches(name, metric) {
            collector.collect(name, metric, timestamp);
            collected += 1;
        }
    }
    collected
}

/// One flattened data point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricObject {
    pub metric: String,
    pub tags: BTreeMap<String, String>,
    pub timestamp: i64,
    pub value: f64,
    pub kind: MetricKind,
    /// Bucket width in seconds, for values read from a time bucket
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<u64>,
}

/// Timestamp of the last bucket that closed before `timestamp`
pub fn last_complete_bucket(timestamp: i64, interval: Duration) -> i64 {
    let interval_ms = (interval.as_millis() as i64).max(1);
    timestamp - timestamp.rem_euclid(interval_ms) - interval_ms
}

/// Collector producing [`MetricObject`]s
#[derive(Debug, Default)]
pub struct ObjectCollector {
    objects: Vec<MetricObject>,
}

impl ObjectCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn objects(&self) -> &[MetricObject] {
        &self.objects
    }

    pub fn into_objects(self) -> Vec<MetricObject> {
        self.objects
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.objects)?)
    }

    fn push(&mut self, point: Point<'_>, value: f64) {
        let mut tags = point.name.tags().clone();
        for (k, v) in point.tags {
            tags.insert(k.to_owned(), v);
        }
        self.objects.push(MetricObject {
            metric: format!("{}.{}", point.name.key(), point.suffix),
            tags,
            timestamp: point.timestamp,
            value,
            kind: point.kind,
            interval: point.interval.map(|i| i.as_secs()),
        });
    }

    fn collect_metered<M: Metered + ?Sized>(
        &mut self,
        name: &MetricName,
        kind: MetricKind,
        metered: &M,
        timestamp: i64,
    ) {
        let at = Point::new(name, kind, timestamp);
        self.push(at.suffix("count"), metered.count() as f64);
        self.push(at.suffix("m1"), metered.one_minute_rate());
        self.push(at.suffix("m5"), metered.five_minute_rate());
        self.push(at.suffix("m15"), metered.fifteen_minute_rate());
        self.push(at.suffix("mean_rate"), metered.mean_rate());

        let interval = metered.instant_count_interval();
        let bucket = last_complete_bucket(timestamp, interval);
        let count = metered
            .instant_count_since(bucket)
            .get(&bucket)
            .copied()
            .unwrap_or(0);
        let bucketed = at.bucket(bucket, interval);
        self.push(bucketed.suffix("bucket_count"), count as f64);
        self.push(bucketed.suffix("qps"), count as f64 / interval.as_secs_f64());
    }

    fn collect_snapshot(
        &mut self,
        name: &MetricName,
        kind: MetricKind,
        snapshot: &dyn Snapshot,
        timestamp: i64,
        scale: f64,
    ) {
        let at = Point::new(name, kind, timestamp);
        self.push(at.suffix("min"), snapshot.min() as f64 / scale);
        self.push(at.suffix("max"), snapshot.max() as f64 / scale);
        self.push(at.suffix("mean"), snapshot.mean() / scale);
        self.push(at.suffix("stddev"), snapshot.std_dev() / scale);
        self.push(at.suffix("median"), snapshot.median() / scale);
        self.push(at.suffix("p75"), snapshot.p75() / scale);
        self.push(at.suffix("p95"), snapshot.p95() / scale);
        self.push(at.suffix("p98"), snapshot.p98() / scale);
        self.push(at.suffix("p99"), snapshot.p99() / scale);
        self.push(at.suffix("p999"), snapshot.p999() / scale);
    }

    fn collect_compass(&mut self, name: &MetricName, compass: &dyn Compass, timestamp: i64) {
        let kind = MetricKind::Compass;
        self.collect_metered(name, kind, compass, timestamp);
        self.collect_snapshot(name, kind, compass.snapshot().as_ref(), timestamp, NANOS_PER_MILLI);

        let interval = compass.instant_count_interval();
        let bucket = last_complete_bucket(timestamp, interval);
        let at = Point::new(name, kind, timestamp).bucket(bucket, interval);
        let in_bucket = |counts: BTreeMap<i64, u64>| counts.get(&bucket).copied().unwrap_or(0);

        let total = in_bucket(compass.instant_count_since(bucket));
        let success = in_bucket(compass.bucket_success_count().bucket_counts_since(bucket));
        self.push(at.suffix("success_count"), success as f64);
        if total > 0 {
            self.push(at.suffix("success_rate"), success as f64 / total as f64);
        }

        for (code, counter) in compass.error_code_counts() {
            let count = in_bucket(counter.bucket_counts_since(bucket));
            self.push(at.suffix("error.count").tag("error", code), count as f64);
        }
        for (addon, counter) in compass.addon_counts() {
            let count = in_bucket(counter.bucket_counts_since(bucket));
            self.push(at.suffix("addon.count").tag("addon", addon), count as f64);
        }
    }

    fn collect_fast_compass(
        &mut self,
        name: &MetricName,
        fast_compass: &dyn FastCompass,
        timestamp: i64,
    ) {
        let interval = fast_compass.bucket_interval();
        let bucket = last_complete_bucket(timestamp, interval);
        let at = Point::new(name, MetricKind::FastCompass, timestamp).bucket(bucket, interval);

        for (category, buckets) in fast_compass.count_and_rt_per_category_since(bucket) {
            let value = buckets.get(&bucket).copied().unwrap_or_default();
            let tagged = at.tag("category", category);
            self.push(tagged.suffix("count"), value.count as f64);
            self.push(tagged.suffix("rt"), value.rt as f64);
        }
    }

    fn collect_cluster_histogram(
        &mut self,
        name: &MetricName,
        histogram: &dyn ClusterHistogram,
        timestamp: i64,
    ) {
        let interval = histogram.bucket_interval();
        let bucket = last_complete_bucket(timestamp, interval);
        let at =
            Point::new(name, MetricKind::ClusterHistogram, timestamp).bucket(bucket, interval);
        let values = histogram.bucket_values(bucket);
        let counts = values.get(&bucket);

        for &boundary in histogram.boundaries() {
            let count = counts.and_then(|c| c.get(&boundary)).copied().unwrap_or(0);
            let le = if boundary == INFINITY_BOUNDARY {
                "+Inf".to_owned()
            } else {
                boundary.to_string()
            };
            self.push(at.tag("le", le).suffix("bucket"), count as f64);
        }
    }
}

impl MetricCollector for ObjectCollector {
    fn collect(&mut self, name: &MetricName, metric: &Metric, timestamp: i64) {
        let kind = metric.kind();
        match metric {
            Metric::Counter(counter) => {
                self.push(Point::new(name, kind, timestamp).suffix("count"), counter.count() as f64);
            },
            Metric::Gauge(gauge) => {
                if let Some(value) = gauge.value() {
                    self.push(Point::new(name, kind, timestamp).suffix("value"), value);
                }
            },
            Metric::Meter(meter) => self.collect_metered(name, kind, meter.as_ref(), timestamp),
            Metric::Histogram(histogram) => {
                let at = Point::new(name, kind, timestamp);
                self.push(at.suffix("count"), histogram.count() as f64);
                self.collect_snapshot(name, kind, histogram.snapshot().as_ref(), timestamp, 1.0);
            },
            Metric::Timer(timer) => {
                self.collect_metered(name, kind, timer.as_ref(), timestamp);
                self.collect_snapshot(
                    name,
                    kind,
                    timer.snapshot().as_ref(),
                    timestamp,
                    NANOS_PER_MILLI,
                );
            },
            Metric::Compass(compass) => self.collect_compass(name, compass.as_ref(), timestamp),
            Metric::FastCompass(fast_compass) => {
                self.collect_fast_compass(name, fast_compass.as_ref(), timestamp);
            },
            Metric::ClusterHistogram(histogram) => {
                self.collect_cluster_histogram(name, histogram.as_ref(), timestamp);
            },
        }
    }
}

/// Where a value goes: name, suffix, extra tags and bucket placement
#[derive(Clone)]
struct Point<'a> {
    name: &'a MetricName,
    suffix: &'static str,
    kind: MetricKind,
    timestamp: i64,
    interval: Option<Duration>,
    tags: Vec<(&'static str, String)>,
}

impl<'a> Point<'a> {
    fn new(name: &'a MetricName, kind: MetricKind, timestamp: i64) -> Self {
        Self {
            name,
            suffix: "",
            kind,
            timestamp,
            interval: None,
            tags: Vec::new(),
        }
    }

    fn suffix(&self, suffix: &'static str) -> Self {
        Self {
            suffix,
            ..self.clone()
        }
    }

    fn bucket(self, timestamp: i64, interval: Duration) -> Self {
        Self {
            timestamp,
            interval: Some(interval),
            ..self
        }
    }

    fn tag(&self, key: &'static str, value: String) -> Self {
        let mut point = self.clone();
        point.tags.push((key, value));
        point
    }
}
