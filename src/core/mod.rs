//! Core building blocks shared by every metric: configuration, errors,
//! time sources and metric identity.

#![warn(missing_docs)]

pub mod clock;
pub mod config;
pub mod error;
pub mod name;

// Re-export commonly used types
pub use clock::{default_clock, Clock, ManualClock, SystemClock};
pub use config::{Config, ConfigBuilder, LogLevel};
pub use error::{MetricsError, Result};
pub use name::{MetricLevel, MetricName};
