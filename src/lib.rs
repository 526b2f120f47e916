//! Compass Metrics - time-windowed metrics engine.
//!
//! A family of concurrent counters, rate meters, latency histograms and
//! outcome-tagged composites that record very high call volumes with minimal
//! per-call overhead while answering time-bucketed and percentile queries at
//! any point, without blocking writers.
//!
//! # Features
//!
//! - **Bucketed counts**: fixed-interval buckets with bounded retention
//! - **Pluggable sampling**: exponentially decaying, sliding window, sliding
//!   time window, uniform and bucket reservoirs
//! - **Compass**: latency plus success, error code and addon breakdowns
//! - **FastCompass**: per-category count and latency in one atomic add
//! - **Cluster histograms**: fixed boundaries that sum across hosts
//! - **No-op mode**: disabled metrics cost nothing and need no branching
//!
//! # Architecture
//!
//! - `core`: configuration, errors, clock and metric names
//! - `metrics`: the metric primitives and their no-op twins
//! - `export`: filters and collectors draining metrics into records
//! - `factory`: builds metrics from a [`Config`]
//! - `cli`: the `compass-bench` load generator
//!
//! # Example
//!
//! ```no_run
//! use compass_metrics::core::Config;
//! use compass_metrics::metrics::Compass;
//! use compass_metrics::MetricFactory;
//! use std::time::Duration;
//!
//! fn main() -> compass_metrics::Result<()> {
//!     let factory = MetricFactory::new(Config::default())?;
//!     let compass = factory.compass()?;
//!     compass.update_with(Duration::from_millis(12), true, None, None);
//!     compass.update_with(Duration::from_millis(40), false, Some("timeout"), None);
//!     println!("success rate: {}", compass.success_rate());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod cli;
pub mod core;
pub mod export;
pub mod factory;
pub mod metrics;

// Re-export core types for convenience
pub use crate::core::{Config, MetricName, MetricsError, Result};
pub use crate::factory::MetricFactory;
