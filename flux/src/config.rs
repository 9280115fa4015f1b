//! Store configuration.
//!
//! A [`StoreConfig`] fixes the behaviour shared by every series in a store:
//! how many samples a newly registered series retains and whether exact
//! lookups are cached. It can be built in code or loaded from a JSON file.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Capacity given to a newly registered series unless configured otherwise.
pub const DEFAULT_CAPACITY: usize = 1000;

/// Configuration for a [`SeriesStore`](crate::store::SeriesStore).
///
/// Every field has a default, so a JSON file only needs the fields it changes.
///
/// # Example
///
/// ```rust
/// use flux::config::StoreConfig;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = StoreConfig::new("plant-a".to_string(), 3600, true)?;
/// assert_eq!(config.default_capacity, 3600);
///
/// let from_json = StoreConfig::from_json(r#"{ "default_capacity": 50 }"#)?;
/// assert_eq!(from_json.default_capacity, 50);
/// assert!(from_json.lookup_cache);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Human-readable name for the store, shown by its `Display` impl.
    pub name: String,

    /// Number of samples retained by each newly registered series.
    ///
    /// Individual series can be resized later with
    /// [`SeriesStore::set_capacity`](crate::store::SeriesStore::set_capacity).
    pub default_capacity: usize,

    /// Whether each series caches its most recent exact-lookup hit.
    ///
    /// The cache short-circuits repeated `is_available`/`point` calls for the
    /// same timestamp. It is cleared by every write to the series.
    pub lookup_cache: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            name: "flux".to_string(),
            default_capacity: DEFAULT_CAPACITY,
            lookup_cache: true,
        }
    }
}

impl StoreConfig {
    /// Creates a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidCapacity`] if `default_capacity` is zero.
    pub fn new(name: String, default_capacity: usize, lookup_cache: bool) -> Result<Self> {
        let config = Self {
            name,
            default_capacity,
            lookup_cache,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidCapacity`] if `default_capacity` is zero.
    pub fn validate(&self) -> Result<()> {
        if self.default_capacity == 0 {
            return Err(ConfigError::InvalidCapacity {
                capacity: self.default_capacity,
            }
            .into());
        }

        Ok(())
    }

    /// Parses and validates a configuration from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed JSON and
    /// [`ConfigError::InvalidCapacity`] if validation fails.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| ConfigError::Parse {
            path: "<inline>".into(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::Read`] if the file cannot be read
    /// - [`ConfigError::Parse`] if the file is not valid JSON
    /// - [`ConfigError::InvalidCapacity`] if validation fails
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Self = serde_json::from_str(&json).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        config.validate()?;

        tracing::debug!("loaded store config '{}' from {}", config.name, path.display());
        Ok(config)
    }
}
