//! Custom error types and handling
//!
//! Only conditions that should abort a sweep are errors. Missing artifacts,
//! killed trials and unparsable logs are recorded as trial outcomes instead.

use std::path::PathBuf;

use crate::config::ConfigError;

/// Library-wide error type
#[derive(Debug, thiserror::Error)]
pub enum BenchError {
    // Environment errors
    #[error("Environment error: {0}")]
    Environment(String),

    #[error("Failed to launch '{program}': {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    // Configuration errors
    #[error(transparent)]
    Config(#[from] ConfigError),

    // Process supervision
    #[error("Process error: {0}")]
    Process(String),

    // Aggregation contract violations
    #[error("Cannot aggregate zero trials")]
    EmptyAggregation,

    #[error("Cannot aggregate trials of different keys: {0}")]
    MixedAggregation(String),

    // I/O performed by the orchestrator itself
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl BenchError {
    /// Wrap an I/O error with the path it occurred on
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Environment(_) => "ENVIRONMENT_ERROR",
            Self::Launch { .. } => "LAUNCH_ERROR",
            Self::Config(_) => "CONFIGURATION_ERROR",
            Self::Process(_) => "PROCESS_ERROR",
            Self::EmptyAggregation => "EMPTY_AGGREGATION",
            Self::MixedAggregation(_) => "MIXED_AGGREGATION",
            Self::Io { .. } => "IO_ERROR",
        }
    }
}

/// Result type alias using BenchError
pub type BenchResult<T> = Result<T, BenchError>;
