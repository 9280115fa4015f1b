//! Sample value type and quality status.
//!
//! A [`Sample`] is one timestamped measurement. The default sample (status
//! [`Status::Missing`]) doubles as the "not found" result of every lookup, so
//! callers check [`Sample::is_present`] instead of matching on an error.

use serde::{Deserialize, Serialize};

/// Quality flag attached to a sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// A valid measurement.
    Good,
    /// No data. This is the status of every empty lookup result.
    #[default]
    Missing,
    /// Value produced by an estimator rather than measured.
    Estimated,
    /// Value interpolated from neighbouring samples.
    Interpolated,
    /// Measured, but flagged as unreliable by the source.
    Questionable,
}

/// A single timestamped measurement.
///
/// `confidence` is caller-defined (e.g. measurement certainty or weight) and
/// is stored and returned unchanged.
///
/// # Examples
///
/// ```rust
/// use flux::{Sample, Status};
///
/// let s = Sample::new(1_700_000_000, 42.5, 0.9);
/// assert_eq!(s.status, Status::Good);
/// assert!(s.is_present());
///
/// assert!(!Sample::missing().is_present());
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Time of the measurement, in seconds since the epoch (or any monotonic unit).
    pub timestamp: i64,
    /// The measured value.
    pub value: f64,
    /// Caller-defined certainty associated with the value.
    pub confidence: f64,
    /// Quality flag.
    #[serde(default)]
    pub status: Status,
}

impl Sample {
    /// Creates a [`Status::Good`] sample.
    pub fn new(timestamp: i64, value: f64, confidence: f64) -> Self {
        Self::with_status(timestamp, value, confidence, Status::Good)
    }

    /// Creates a sample with an explicit status.
    pub fn with_status(timestamp: i64, value: f64, confidence: f64, status: Status) -> Self {
        Self {
            timestamp,
            value,
            confidence,
            status,
        }
    }

    /// Returns the empty sample used for "not found" results.
    pub fn missing() -> Self {
        Self::default()
    }

    /// Returns `true` unless this is an empty result.
    pub fn is_present(&self) -> bool {
        self.status != Status::Missing
    }
}
