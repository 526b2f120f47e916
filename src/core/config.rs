//! Configuration management for the metrics engine.
//!
//! This module provides:
//! - YAML file support
//! - Defaults matching the conventional bucket and reservoir sizes
//! - Validation before any metric is built

use crate::core::{MetricsError, Result};
use crate::metrics::reservoir::ReservoirType;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Complete configuration for a [`MetricFactory`](crate::MetricFactory)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// When false every metric handed out is a no-op
    pub enabled: bool,
    /// Bucket layout for counters, meters and compass outcome counters
    pub bucket: BucketConfig,
    /// Sampling reservoir for histograms, timers and compasses
    pub reservoir: ReservoirConfig,
    /// Meter configuration
    pub meter: MeterConfig,
    /// Compass configuration
    pub compass: CompassConfig,
    /// FastCompass configuration
    pub fast_compass: FastCompassConfig,
    /// Cluster histogram configuration
    pub cluster_histogram: ClusterHistogramConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Bucket layout
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BucketConfig {
    /// Width of one bucket
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    /// Number of buckets retained
    pub bucket_count: usize,
}

/// Reservoir configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReservoirConfig {
    /// Sampling strategy
    pub kind: ReservoirType,
    /// Sample capacity for size-bounded reservoirs
    pub size: usize,
    /// Decay factor for the exponentially decaying reservoir
    pub alpha: f64,
    /// Retention window for the sliding time window reservoir
    #[serde(with = "humantime_serde")]
    pub window: Duration,
}

/// Meter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MeterConfig {
    /// Cadence at which the moving averages fold in pending marks
    #[serde(with = "humantime_serde")]
    pub tick_interval: Duration,
}

/// Compass configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompassConfig {
    /// Distinct error codes tracked per compass
    pub max_error_codes: usize,
    /// Distinct addons tracked per compass
    pub max_addons: usize,
}

/// FastCompass configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FastCompassConfig {
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    pub bucket_count: usize,
    /// Distinct sub-categories tracked per fast compass
    pub max_categories: usize,
}

/// Cluster histogram configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterHistogramConfig {
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    pub bucket_count: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: LogLevel,
    /// Include targets, thread ids and line numbers
    pub structured: bool,
}

/// Log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            enabled: true,
            bucket: BucketConfig::default(),
            reservoir: ReservoirConfig::default(),
            meter: MeterConfig::default(),
            compass: CompassConfig::default(),
            fast_compass: FastCompassConfig::default(),
            cluster_histogram: ClusterHistogramConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for BucketConfig {
    fn default() -> Self {
        BucketConfig {
            interval: Duration::from_secs(60),
            bucket_count: 10,
        }
    }
}

impl Default for ReservoirConfig {
    fn default() -> Self {
        ReservoirConfig {
            kind: ReservoirType::ExponentiallyDecaying,
            size: 1028,
            alpha: 0.015,
            window: Duration::from_secs(60),
        }
    }
}

impl Default for MeterConfig {
    fn default() -> Self {
        MeterConfig {
            tick_interval: Duration::from_secs(5),
        }
    }
}

impl Default for CompassConfig {
    fn default() -> Self {
        CompassConfig {
            max_error_codes: 100,
            max_addons: 100,
        }
    }
}

impl Default for FastCompassConfig {
    fn default() -> Self {
        FastCompassConfig {
            interval: Duration::from_secs(60),
            bucket_count: 10,
            max_categories: 20,
        }
    }
}

impl Default for ClusterHistogramConfig {
    fn default() -> Self {
        ClusterHistogramConfig {
            interval: Duration::from_secs(60),
            bucket_count: 10,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: LogLevel::Info,
            structured: false,
        }
    }
}

fn check_interval(name: &str, interval: Duration) -> Result<()> {
    if interval.as_millis() == 0 {
        return Err(MetricsError::config(format!(
            "{} must be at least 1ms, got {:?}",
            name, interval
        )));
    }
    Ok(())
}

fn check_count(name: &str, count: usize) -> Result<()> {
    if count == 0 {
        return Err(MetricsError::config(format!("{} must be greater than 0", name)));
    }
    Ok(())
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Result<Self> {
        let config = Config::default();
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML configuration file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        ConfigBuilder::new().from_yaml(&content)?.build()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        check_interval("bucket.interval", self.bucket.interval)?;
        check_count("bucket.bucket_count", self.bucket.bucket_count)?;

        check_count("reservoir.size", self.reservoir.size)?;
        if !(self.reservoir.alpha > 0.0 && self.reservoir.alpha <= 1.0) {
            return Err(MetricsError::config(format!(
                "reservoir.alpha must be in (0, 1], got {}",
                self.reservoir.alpha
            )));
        }
        check_interval("reservoir.window", self.reservoir.window)?;

        if self.meter.tick_interval.as_secs() == 0 {
            return Err(MetricsError::config("meter.tick_interval must be at least 1s"));
        }

        check_count("compass.max_error_codes", self.compass.max_error_codes)?;
        check_count("compass.max_addons", self.compass.max_addons)?;

        check_interval("fast_compass.interval", self.fast_compass.interval)?;
        check_count("fast_compass.bucket_count", self.fast_compass.bucket_count)?;
        check_count("fast_compass.max_categories", self.fast_compass.max_categories)?;

        check_interval("cluster_histogram.interval", self.cluster_histogram.interval)?;
        check_count("cluster_histogram.bucket_count", self.cluster_histogram.bucket_count)?;

        Ok(())
    }
}

impl LogLevel {
    /// Convert to tracing filter string
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Configuration builder for programmatic construction
pub struct ConfigBuilder {
    config: Config,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigBuilder {
    /// Create a new builder with defaults
    pub fn new() -> Self {
        ConfigBuilder {
            config: Config::default(),
        }
    }

    /// Load configuration from YAML string
    pub fn from_yaml(mut self, yaml: &str) -> Result<Self> {
        self.config = serde_yaml::from_str(yaml)
            .map_err(|e| MetricsError::config(format!("Failed to parse YAML config: {}", e)))?;
        Ok(self)
    }

    /// Enable or disable metric collection
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.config.enabled = enabled;
        self
    }

    /// Set bucket width and retention
    pub fn buckets(mut self, interval: Duration, bucket_count: usize) -> Self {
        self.config.bucket.interval = interval;
        self.config.bucket.bucket_count = bucket_count;
        self
    }

    /// Set reservoir strategy
    pub fn reservoir(mut self, kind: ReservoirType) -> Self {
        self.config.reservoir.kind = kind;
        self
    }

    /// Set reservoir capacity
    pub fn reservoir_size(mut self, size: usize) -> Self {
        self.config.reservoir.size = size;
        self
    }

    /// Set FastCompass bucket width and retention
    pub fn fast_compass_buckets(mut self, interval: Duration, bucket_count: usize) -> Self {
        self.config.fast_compass.interval = interval;
        self.config.fast_compass.bucket_count = bucket_count;
        self
    }

    /// Set the cap on distinct FastCompass categories
    pub fn max_categories(mut self, max: usize) -> Self {
        self.config.fast_compass.max_categories = max;
        self
    }

    /// Set cluster histogram bucket width and retention
    pub fn cluster_histogram_buckets(mut self, interval: Duration, bucket_count: usize) -> Self {
        self.config.cluster_histogram.interval = interval;
        self.config.cluster_histogram.bucket_count = bucket_count;
        self
    }

    /// Set log level
    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.config.logging.level = level;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}
