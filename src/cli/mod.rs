//! Command-line interface for `compass-bench`.
//!
//! Drives a synthetic multi-threaded workload against a compass, a fast
//! compass and a cluster histogram, then prints what a collector drains from
//! them.

use crate::core::{Clock, Config, ConfigBuilder, MetricName, MetricsError, Result};
use crate::export::{collect_all, AllMetrics, Metric, MetricObject, ObjectCollector};
use crate::factory::MetricFactory;
use crate::metrics::{ClusterHistogram, Compass, FastCompass};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

const ERROR_CODES: [&str; 3] = ["timeout", "refused", "invalid_request"];

/// Latency boundaries in milliseconds for the cluster histogram
const LATENCY_BOUNDARIES_MS: [i64; 8] = [1, 5, 10, 20, 50, 100, 200, 500];

/// Load generator for the metrics engine
#[derive(Parser, Debug)]
#[command(name = "compass-bench")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path (YAML)
    #[arg(short, long, env = "COMPASS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Worker threads recording concurrently
    #[arg(short, long, default_value_t = 4)]
    pub threads: usize,

    /// Calls recorded by each worker
    #[arg(short = 'n', long, default_value_t = 100_000)]
    pub calls: u64,

    /// Print collected records as JSON
    #[arg(long)]
    pub json: bool,

    /// Enable debug logging
    #[arg(short, long, env = "COMPASS_DEBUG")]
    pub debug: bool,

    /// Validate configuration and exit
    #[arg(long)]
    pub check_config: bool,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Defaults, overridden by the config file when one is given
    pub async fn load_config(&self) -> Result<Config> {
        let Some(path) = &self.config else {
            return ConfigBuilder::new().build();
        };

        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            MetricsError::config(format!("Failed to read config file {:?}: {}", path, e))
        })?;
        ConfigBuilder::new().from_yaml(&content)?.build()
    }

    /// Initialize logging. `COMPASS_LOG` wins over the configured level.
    pub fn init_logging(&self, config: &Config) -> Result<()> {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

        let log_level = if self.debug {
            "debug"
        } else {
            config.logging.level.as_str()
        };

        let filter =
            EnvFilter::try_from_env("COMPASS_LOG").unwrap_or_else(|_| EnvFilter::new(log_level));

        let fmt_layer = if config.logging.structured {
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(true)
                .with_line_number(true)
                .compact()
        } else {
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact()
        };

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| MetricsError::config(format!("Failed to initialize logging: {}", e)))?;

        Ok(())
    }
}

/// Metrics under load, shared by every worker
struct Workload {
    compass: Arc<dyn Compass>,
    fast_compass: Arc<dyn FastCompass>,
    latency: Arc<dyn ClusterHistogram>,
}

impl Workload {
    fn new(factory: &MetricFactory) -> Result<Self> {
        Ok(Self {
            compass: factory.compass()?,
            fast_compass: factory.fast_compass()?,
            latency: factory.cluster_histogram(&LATENCY_BOUNDARIES_MS)?,
        })
    }

    /// One synthetic call: mostly fast successes, a tail of slow failures
    fn record_call(&self) {
        let success = fastrand::u8(..100) < 95;
        let micros = if success {
            fastrand::u64(200..20_000)
        } else {
            fastrand::u64(10_000..800_000)
        };
        let duration = Duration::from_micros(micros);
        let error_code = (!success).then(|| ERROR_CODES[fastrand::usize(..ERROR_CODES.len())]);
        let addon = (fastrand::u8(..100) < 30).then_some("cache_hit");

        self.compass.update_with(duration, success, error_code, addon);
        self.fast_compass
            .record(duration, if success { "success" } else { "error" });
        self.latency.update((micros / 1_000) as i64);
    }

    fn registry(&self) -> Result<Vec<(MetricName, Metric)>> {
        Ok(vec![
            (
                MetricName::new("bench.rpc")?.tagged("service", "demo")?,
                Metric::Compass(Arc::clone(&self.compass)),
            ),
            (
                MetricName::new("bench.rpc.fast")?,
                Metric::FastCompass(Arc::clone(&self.fast_compass)),
            ),
            (
                MetricName::new("bench.rpc.latency_ms")?,
                Metric::ClusterHistogram(Arc::clone(&self.latency)),
            ),
        ])
    }
}

/// Run `compass-bench`.
pub async fn execute(cli: Cli) -> Result<()> {
    let config = cli.load_config().await?;
    cli.init_logging(&config)?;

    if cli.check_config {
        println!("Configuration is valid!");
        println!("  Enabled: {}", config.enabled);
        println!(
            "  Buckets: {} x {:?}",
            config.bucket.bucket_count, config.bucket.interval
        );
        println!("  Reservoir: {} (size {})", config.reservoir.kind, config.reservoir.size);
        println!("  Meter tick: {:?}", config.meter.tick_interval);
        return Ok(());
    }

    let factory = MetricFactory::new(config)?;
    let workload = Arc::new(Workload::new(&factory)?);

    tracing::info!(threads = cli.threads, calls = cli.calls, "starting workload");
    let started = Instant::now();
    let handles: Vec<_> = (0..cli.threads.max(1))
        .map(|_| {
            let workload = Arc::clone(&workload);
            let calls = cli.calls;
            tokio::task::spawn_blocking(move || {
                for _ in 0..calls {
                    workload.record_call();
                }
            })
        })
        .collect();
    for handle in handles {
        handle
            .await
            .map_err(|e| MetricsError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?;
    }
    let elapsed = started.elapsed();

    let total = cli.calls.saturating_mul(cli.threads.max(1) as u64);
    tracing::info!(
        total,
        elapsed_ms = elapsed.as_millis() as u64,
        calls_per_sec = (total as f64 / elapsed.as_secs_f64()) as u64,
        "workload finished"
    );

    // Collect as though the bucket being filled had just closed
    let timestamp = factory.clock().time() + factory.config().bucket.interval.as_millis() as i64;
    let registry = workload.registry()?;
    let mut collector = ObjectCollector::new();
    collect_all(
        registry.iter().map(|(name, metric)| (name, metric)),
        &AllMetrics,
        &mut collector,
        timestamp,
    );

    if cli.json {
        println!("{}", collector.to_json()?);
    } else {
        for object in collector.objects() {
            println!("{}", render(object));
        }
    }

    Ok(())
}

fn render(object: &MetricObject) -> String {
    let tags = object
        .tags
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(",");
    let name = if tags.is_empty() {
        object.metric.clone()
    } else {
        format!("{}{{{}}}", object.metric, tags)
    };
    format!("{:<56} {:>16.3}  {}", name, object.value, object.kind)
}
