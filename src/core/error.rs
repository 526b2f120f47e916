use thiserror::Error;

/// Errors surfaced by metric construction, registration and configuration.
///
/// Recording paths never return these: a failed lookup on the hot path degrades
/// to an "unavailable" value instead.
#[derive(Error, Debug)]
pub enum MetricsError {
    #[error("Invalid metric name: {0}")]
    InvalidName(String),

    #[error("Invalid histogram boundaries: {0}")]
    InvalidBoundaries(String),

    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for metric construction and configuration
pub type Result<T> = std::result::Result<T, MetricsError>;

impl MetricsError {
    /// Creates a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a new invalid name error
    pub fn invalid_name<S: Into<String>>(msg: S) -> Self {
        Self::InvalidName(msg.into())
    }

    /// Creates a new invalid boundaries error
    pub fn invalid_boundaries<S: Into<String>>(msg: S) -> Self {
        Self::InvalidBoundaries(msg.into())
    }

    /// Creates a new invalid parameter error
    pub fn invalid_parameter<S: Into<String>>(name: &'static str, reason: S) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }

    /// Returns the error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::InvalidName(_) => "name",
            Self::InvalidBoundaries(_) | Self::InvalidParameter { .. } => "validation",
            Self::Config(_) => "config",
            Self::Io(_) => "io",
            Self::Serialization(_) => "serialization",
        }
    }
}
