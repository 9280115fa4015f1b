//! Error types for the flux time-series store.
//!
//! Absence of data is never an error in flux: unknown series, queries outside
//! the stored range and capacity eviction all produce empty results. The
//! errors below cover caller contract violations and configuration problems.

use std::path::PathBuf;

use thiserror::Error;

/// The main error type for all flux operations.
#[derive(Error, Debug)]
pub enum FluxError {
    /// Error while appending samples (write path).
    #[error("append error: {0}")]
    Append(#[from] AppendError),

    /// Error in store or buffer configuration.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors that can occur when appending samples to a series.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum AppendError {
    /// The sample is older than the newest sample already stored.
    ///
    /// Series are append-only; timestamps must be non-decreasing.
    #[error("sample at {timestamp} is older than the newest stored sample at {last}")]
    OutOfOrder {
        /// Timestamp of the newest stored sample (or the previous sample in a batch).
        last: i64,
        /// Timestamp of the rejected sample.
        timestamp: i64,
    },
}

/// Errors that can occur while building or loading a configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A series buffer cannot hold zero samples.
    #[error("invalid capacity {capacity}: must be > 0")]
    InvalidCapacity {
        /// The rejected capacity.
        capacity: usize,
    },

    /// The configuration file could not be read.
    #[error("failed to read config '{}': {source}", path.display())]
    Read {
        /// The config file path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid JSON for [`StoreConfig`](crate::config::StoreConfig).
    #[error("failed to parse config '{}': {source}", path.display())]
    Parse {
        /// The config file path.
        path: PathBuf,
        /// The underlying JSON parsing error.
        #[source]
        source: serde_json::Error,
    },
}

/// Type alias for `Result<T, FluxError>`.
pub type Result<T> = std::result::Result<T, FluxError>;
