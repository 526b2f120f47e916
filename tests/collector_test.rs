//! Draining a registry of every metric kind through the object collector.

use compass_metrics::core::{Clock, ConfigBuilder, ManualClock, MetricLevel, MetricName};
use compass_metrics::export::{
    collect_all, AllMetrics, Metric, MetricKind, MetricObject, MinLevel, ObjectCollector,
};
use compass_metrics::metrics::{
    ClusterHistogram, Compass, Counter, FastCompass, Histogram, Meter, ReservoirType, Sampling,
    Timer,
};
use compass_metrics::MetricFactory;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

struct Fixture {
    clock: Arc<ManualClock>,
    registry: Vec<(MetricName, Metric)>,
}

impl Fixture {
    /// One of each kind, recorded during the first second
    fn new() -> Self {
        let clock = Arc::new(ManualClock::new(0));
        let second = Duration::from_secs(1);
        let config = ConfigBuilder::new()
            .buckets(second, 10)
            .fast_compass_buckets(second, 10)
            .cluster_histogram_buckets(second, 10)
            .reservoir(ReservoirType::SlidingWindow)
            .build()
            .unwrap();
        let factory =
            MetricFactory::with_clock(config, Arc::clone(&clock) as Arc<dyn Clock>).unwrap();

        let counter = factory.counter();
        counter.inc_by(7);

        let gauge = factory.gauge(|| Ok::<f64, String>(0.25));

        let meter = factory.meter().unwrap();
        meter.mark_by(4);

        let histogram = factory.histogram().unwrap();
        for value in [1, 2, 3, 4] {
            histogram.update(value);
        }

        let timer = factory.timer().unwrap();
        timer.update(Duration::from_millis(20));

        let compass = factory.compass().unwrap();
        compass.update_with(Duration::from_millis(10), true, None, Some("cache_hit"));
        compass.update_with(Duration::from_millis(30), false, Some("timeout"), None);
        compass.update_with(Duration::from_millis(20), true, None, None);
        compass.update_with(Duration::from_millis(40), true, None, None);

        let fast = factory.fast_compass().unwrap();
        fast.record(Duration::from_millis(5), "success");
        fast.record(Duration::from_millis(7), "success");

        let cluster = factory.cluster_histogram(&[10, 100]).unwrap();
        cluster.update(3);
        cluster.update(50);
        cluster.update(5_000);

        let name = |key: &str| MetricName::new(key).unwrap();
        let registry = vec![
            (name("app.counter"), Metric::Counter(counter)),
            (name("app.gauge"), Metric::Gauge(gauge)),
            (name("app.meter"), Metric::Meter(meter)),
            (name("app.histogram"), Metric::Histogram(histogram)),
            (name("app.timer"), Metric::Timer(timer)),
            (
                name("app.rpc")
                    .tagged("service", "shop")
                    .unwrap()
                    .with_level(MetricLevel::Critical),
                Metric::Compass(compass),
            ),
            (name("app.fast"), Metric::FastCompass(fast)),
            (name("app.latency"), Metric::ClusterHistogram(cluster)),
        ];

        Self { clock, registry }
    }

    /// Collect as of `timestamp` with every metric kept
    fn collect(&self, timestamp: i64) -> ObjectCollector {
        let mut collector = ObjectCollector::new();
        let collected = collect_all(
            self.registry.iter().map(|(n, m)| (n, m)),
            &AllMetrics,
            &mut collector,
            timestamp,
        );
        assert_eq!(collected, self.registry.len());
        collector
    }
}

fn find<'a>(
    objects: &'a [MetricObject],
    metric: &str,
    tag: Option<(&str, &str)>,
) -> &'a MetricObject {
    objects
        .iter()
        .find(|o| {
            o.metric == metric
                && tag.map_or(true, |(k, v)| o.tags.get(k).map(String::as_str) == Some(v))
        })
        .unwrap_or_else(|| panic!("no record for {} {:?}", metric, tag))
}

fn value(objects: &[MetricObject], metric: &str) -> f64 {
    find(objects, metric, None).value
}

#[test]
fn test_plain_kinds() {
    let fixture = Fixture::new();
    let collector = fixture.collect(1_500);
    let objects = collector.objects();

    let counter = find(objects, "app.counter.count", None);
    assert_eq!(counter.value, 7.0);
    assert_eq!(counter.kind, MetricKind::Counter);
    assert_eq!(counter.timestamp, 1_500);
    assert_eq!(counter.interval, None);

    assert_eq!(value(objects, "app.gauge.value"), 0.25);

    assert_eq!(value(objects, "app.histogram.count"), 4.0);
    assert_eq!(value(objects, "app.histogram.min"), 1.0);
    assert_eq!(value(objects, "app.histogram.max"), 4.0);
    assert_eq!(value(objects, "app.histogram.mean"), 2.5);
    for suffix in ["median", "p75", "p95", "p98", "p99", "p999", "stddev"] {
        let metric = format!("app.histogram.{}", suffix);
        assert!(objects.iter().any(|o| o.metric == metric), "missing {}", metric);
    }
    let p98 = value(objects, "app.histogram.p98");
    let p999 = value(objects, "app.histogram.p999");
    assert!(value(objects, "app.histogram.p95") <= p98);
    assert!(p98 <= p999 && p999 <= 4.0);
}

#[test]
fn test_metered_reads_last_complete_bucket() {
    let fixture = Fixture::new();
    let collector = fixture.collect(1_500);
    let objects = collector.objects();

    assert_eq!(value(objects, "app.meter.count"), 4.0);
    let bucket_count = find(objects, "app.meter.bucket_count", None);
    assert_eq!(bucket_count.value, 4.0);
    assert_eq!(bucket_count.timestamp, 0);
    assert_eq!(bucket_count.interval, Some(1));
    assert_eq!(value(objects, "app.meter.qps"), 4.0);

    // Same data collected mid-bucket sees only the previous (empty) interval
    let early = fixture.collect(500);
    assert_eq!(value(early.objects(), "app.meter.bucket_count"), 0.0);
}

#[test]
fn test_timer_snapshot_in_milliseconds() {
    let fixture = Fixture::new();
    let collector = fixture.collect(1_500);
    let objects = collector.objects();

    assert_eq!(find(objects, "app.timer.max", None).kind, MetricKind::Timer);
    assert_eq!(value(objects, "app.timer.max"), 20.0);
    assert_eq!(value(objects, "app.timer.median"), 20.0);
}

#[test]
fn test_compass_records() {
    let fixture = Fixture::new();
    let collector = fixture.collect(1_500);
    let objects = collector.objects();

    let count = find(objects, "app.rpc.count", None);
    assert_eq!(count.value, 4.0);
    assert_eq!(count.tags.get("service").map(String::as_str), Some("shop"));

    assert_eq!(value(objects, "app.rpc.success_count"), 3.0);
    assert_eq!(value(objects, "app.rpc.success_rate"), 0.75);
    assert_eq!(value(objects, "app.rpc.max"), 40.0);
    assert_eq!(find(objects, "app.rpc.error.count", Some(("error", "timeout"))).value, 1.0);
    assert_eq!(find(objects, "app.rpc.addon.count", Some(("addon", "cache_hit"))).value, 1.0);
}

#[test]
fn test_success_rate_omitted_for_empty_bucket() {
    let fixture = Fixture::new();
    fixture.clock.set_time(5_000);
    let collector = fixture.collect(5_000);
    let objects = collector.objects();

    assert_eq!(value(objects, "app.rpc.success_count"), 0.0);
    assert!(objects.iter().all(|o| o.metric != "app.rpc.success_rate"));
}

#[test]
fn test_fast_compass_and_cluster_histogram() {
    let fixture = Fixture::new();
    let collector = fixture.collect(1_500);
    let objects = collector.objects();

    let count = find(objects, "app.fast.count", Some(("category", "success")));
    assert_eq!(count.value, 2.0);
    assert_eq!(count.kind, MetricKind::FastCompass);
    assert_eq!(find(objects, "app.fast.rt", Some(("category", "success"))).value, 12.0);

    let le = |bound: &str| find(objects, "app.latency.bucket", Some(("le", bound))).value;
    assert_eq!(le("10"), 1.0);
    assert_eq!(le("100"), 1.0);
    assert_eq!(le("+Inf"), 1.0);
}

#[test]
fn test_level_filter() {
    let fixture = Fixture::new();
    let mut collector = ObjectCollector::new();
    let collected = collect_all(
        fixture.registry.iter().map(|(n, m)| (n, m)),
        &MinLevel(MetricLevel::Major),
        &mut collector,
        1_500,
    );

    assert_eq!(collected, 1);
    assert!(collector.objects().iter().all(|o| o.metric.starts_with("app.rpc.")));
}

#[test]
fn test_json_output() {
    let fixture = Fixture::new();
    let collector = fixture.collect(1_500);

    let json = collector.to_json().unwrap();
    let parsed: Vec<MetricObject> = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed.len(), collector.len());

    let raw: serde_json::Value = serde_json::from_str(&json).unwrap();
    let first = &raw[0];
    assert_eq!(first["metric"], "app.counter.count");
    assert_eq!(first["kind"], "counter");
    assert!(first.get("interval").is_none());
}

#[test]
fn test_snapshot_unaffected_by_collection() {
    let fixture = Fixture::new();
    let before = match &fixture.registry[3].1 {
        Metric::Histogram(histogram) => histogram.snapshot().values(),
        other => panic!("unexpected {:?}", other.kind()),
    };
    fixture.collect(1_500);
    let after = match &fixture.registry[3].1 {
        Metric::Histogram(histogram) => histogram.snapshot().values(),
        other => panic!("unexpected {:?}", other.kind()),
    };
    assert_eq!(before, after);
}
