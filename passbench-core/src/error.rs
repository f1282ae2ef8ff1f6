//! Error types for the pass scheduler

use crate::record::Attribute;
use thiserror::Error;

/// Error returned by a pass callback.
pub type PassError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Reading a metric that was never reported and cannot be derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MetricError {
    #[error("{0} is not set")]
    NotSet(Attribute),

    #[error("No plottable attribute has been set")]
    NoPlottableAttribute,
}

/// Configuration could not be resolved.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("'project_name' must be configured in passbench.toml, PASSBENCH_PROJECT_NAME or a config layer")]
    MissingProjectName,

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// Fatal errors raised by [`Scheduler::run`](crate::Scheduler::run).
#[derive(Debug, Error)]
pub enum BenchError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Exceeded max passes for {test}: {max_passes} passes without a stable result")]
    ExceededMaxPasses { test: String, max_passes: u32 },

    #[error(transparent)]
    Metric(#[from] MetricError),

    #[error("No passes were recorded")]
    EmptyHistory,

    #[error("Pass {pass} of {test} failed: {source}")]
    Pass {
        test: String,
        pass: u32,
        #[source]
        source: PassError,
    },
}
