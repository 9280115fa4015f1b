//! Store module for the flux time-series store.
//!
//! This module provides the caller-facing API. A [`SeriesStore`] owns the
//! registry of named series and arbitrates concurrent access to them.
//!
//! # Design
//!
//! ```text
//! SeriesStore
//! ├── config                      <- StoreConfig (capacity, cache switch)
//! └── series: RwLock<HashMap>     <- registry lock, held only for lookup/insert
//!     ├── "P1" -> Arc<Mutex<SeriesEntry>>
//!     │          ├── buffer       <- SeriesBuffer
//!     │          └── cached       <- last exact-lookup hit for "P1"
//!     └── "P2" -> ...
//! ```
//!
//! - Registry lookups share the read lock; only first-time registration takes
//!   the write lock. The entry `Arc` is cloned out so the registry lock is
//!   released before the entry lock is taken.
//! - Each entry has its own mutex. Operations on different series never wait
//!   on each other; operations on the same series are serialized.
//! - Each public method holds the entry lock for exactly one buffer operation
//!   and never calls back into caller code while holding it.
//! - The lookup cache lives inside the entry, under the entry's lock, and is
//!   cleared by every write to that series.
//!
//! Unknown series are not an error: writes to them are dropped and reads
//! return empty results, the same as a query outside the stored range.
//!
//! # Example Usage
//!
//! ```rust
//! use flux::{Sample, SeriesStore, StoreConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = SeriesStore::new(StoreConfig::new("plant".to_string(), 3, true)?)?;
//! let p1 = store.register("P1");
//!
//! for t in [10, 20, 30, 40] {
//!     store.add_point(&p1, Sample::new(t, t as f64 / 10.0, 1.0))?;
//! }
//!
//! assert_eq!(store.point_before(&p1, 35).timestamp, 30);
//! assert_eq!(store.point_after(&p1, 25).timestamp, 30);
//! assert_eq!(store.points_in_range(&p1, 15, 45).len(), 3);
//!
//! // Unregistered series are silently ignored
//! store.add_point("P2", Sample::new(10, 1.0, 1.0))?;
//! assert_eq!(store.identifiers(), vec!["P1".to_string()]);
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::buffer::SeriesBuffer;
use crate::config::StoreConfig;
use crate::error::Result;
use crate::sample::Sample;

/// One registered series: its buffer and its lookup cache.
#[derive(Debug)]
struct SeriesEntry {
    buffer: SeriesBuffer,
    /// Most recent exact-lookup hit.
    cached: Option<Sample>,
    cache_hits: u64,
}

impl SeriesEntry {
    fn new(buffer: SeriesBuffer) -> Self {
        Self {
            buffer,
            cached: None,
            cache_hits: 0,
        }
    }

    fn invalidate(&mut self) {
        self.cached = None;
    }

    /// Exact lookup, consulting and refreshing the cache when enabled.
    fn lookup_exact(&mut self, timestamp: i64, use_cache: bool) -> Option<Sample> {
        if use_cache
            && let Some(cached) = self.cached
            && cached.timestamp == timestamp
        {
            self.cache_hits += 1;
            return Some(cached);
        }

        let found = self.buffer.find_exact(timestamp);
        if use_cache && found.is_some() {
            self.cached = found;
        }
        found
    }
}

/// Point-in-time summary of one series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesStats {
    /// Number of stored samples.
    pub len: usize,
    /// Maximum number of samples retained.
    pub capacity: usize,
    /// Samples discarded to make room since the series was registered.
    pub evicted: u64,
    /// Timestamp of the oldest stored sample.
    pub first: Option<i64>,
    /// Timestamp of the newest stored sample.
    pub last: Option<i64>,
    /// Exact lookups answered from the cache.
    pub cache_hits: u64,
}

/// Concurrent registry of named time series.
///
/// # Thread Safety
///
/// `SeriesStore` is `Send + Sync`; share it with `Arc` or scoped threads. All
/// methods take `&self`.
///
/// A panic while a lock is held poisons it. The store recovers poisoned locks
/// rather than propagating the panic, since every buffer mutation completes
/// before anything that could panic.
#[derive(Debug)]
pub struct SeriesStore {
    /// Store-wide configuration.
    config: StoreConfig,
    /// Empty buffer cloned for each new registration.
    template: SeriesBuffer,
    /// Registry of series by name.
    series: RwLock<HashMap<String, Arc<Mutex<SeriesEntry>>>>,
}

impl Default for SeriesStore {
    fn default() -> Self {
        Self {
            config: StoreConfig::default(),
            template: SeriesBuffer::default(),
            series: RwLock::new(HashMap::new()),
        }
    }
}

impl SeriesStore {
    /// Creates an empty store.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`](crate::error::ConfigError) if the configuration
    /// is invalid.
    pub fn new(config: StoreConfig) -> Result<Self> {
        config.validate()?;
        let template = SeriesBuffer::with_capacity(config.default_capacity)?;

        Ok(Self {
            config,
            template,
            series: RwLock::new(HashMap::new()),
        })
    }

    /// Returns the store configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Looks up an entry, releasing the registry lock before returning.
    fn entry(&self, name: &str) -> Option<Arc<Mutex<SeriesEntry>>> {
        self.series
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Runs `f` on the named entry under its lock.
    ///
    /// Returns `None` if the series is not registered.
    fn with_entry<R>(&self, name: &str, f: impl FnOnce(&mut SeriesEntry) -> R) -> Option<R> {
        let entry = self.entry(name)?;
        let mut guard = entry.lock().unwrap_or_else(PoisonError::into_inner);
        Some(f(&mut guard))
    }

    /// Registers a series and returns its name.
    ///
    /// Registering a name that already exists is a no-op. A new series gets
    /// an empty buffer of [`StoreConfig::default_capacity`] samples.
    pub fn register(&self, name: &str) -> String {
        if self.contains(name) {
            return name.to_string();
        }

        let mut series = self.series.write().unwrap_or_else(PoisonError::into_inner);
        // Another thread may have registered it between the two locks
        series.entry(name.to_string()).or_insert_with(|| {
            tracing::debug!(
                "registered series '{name}' (capacity {})",
                self.template.capacity()
            );
            Arc::new(Mutex::new(SeriesEntry::new(self.template.clone())))
        });

        name.to_string()
    }

    /// Returns whether a series is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.series
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// Returns the names of all registered series, sorted.
    pub fn identifiers(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .series
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort_unstable();
        names
    }

    /// Returns the number of registered series.
    pub fn len(&self) -> usize {
        self.series.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns whether no series are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends one sample to a series.
    ///
    /// Samples for unregistered series are dropped. When the series is full
    /// its oldest sample is evicted.
    ///
    /// # Errors
    ///
    /// Returns [`AppendError::OutOfOrder`](crate::error::AppendError::OutOfOrder)
    /// if the sample is older than the newest stored sample.
    pub fn add_point(&self, name: &str, sample: Sample) -> Result<()> {
        let outcome = self.with_entry(name, |entry| -> Result<()> {
            entry.buffer.push(sample)?;
            entry.invalidate();
            Ok(())
        });

        match outcome {
            Some(result) => {
                if let Err(e) = &result {
                    tracing::debug!("rejected sample for series '{name}': {e}");
                }
                result
            }
            None => {
                tracing::trace!(
                    "dropped sample at {} for unregistered series '{name}'",
                    sample.timestamp
                );
                Ok(())
            }
        }
    }

    /// Appends a batch of samples to a series in one critical section.
    ///
    /// If the batch is larger than the series capacity, the capacity grows to
    /// fit it. Concurrent readers see either none or all of the batch.
    /// Batches for unregistered series are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`AppendError::OutOfOrder`](crate::error::AppendError::OutOfOrder)
    /// if the batch is unsorted or starts before the newest stored sample.
    /// Nothing from the batch is stored in that case.
    pub fn add_points(&self, name: &str, samples: &[Sample]) -> Result<()> {
        let outcome = self.with_entry(name, |entry| -> Result<()> {
            let capacity = entry.buffer.capacity();
            entry.buffer.push_batch(samples)?;
            entry.invalidate();

            if entry.buffer.capacity() != capacity {
                tracing::debug!(
                    "grew series '{name}' from {capacity} to {} samples for a batch",
                    entry.buffer.capacity()
                );
            }
            Ok(())
        });

        match outcome {
            Some(result) => {
                if let Err(e) = &result {
                    tracing::debug!("rejected batch of {} for series '{name}': {e}", samples.len());
                }
                result
            }
            None => {
                tracing::trace!(
                    "dropped batch of {} for unregistered series '{name}'",
                    samples.len()
                );
                Ok(())
            }
        }
    }

    /// Returns whether a sample exists at exactly `timestamp`.
    ///
    /// A hit is remembered in the series' lookup cache, so a following
    /// [`point`](Self::point) for the same timestamp skips the search.
    pub fn is_available(&self, name: &str, timestamp: i64) -> bool {
        let use_cache = self.config.lookup_cache;
        self.with_entry(name, |entry| entry.lookup_exact(timestamp, use_cache).is_some())
            .unwrap_or(false)
    }

    /// Returns the sample at `timestamp`, or the newest one before it.
    ///
    /// Returns an empty sample if neither exists or the series is unknown.
    pub fn point(&self, name: &str, timestamp: i64) -> Sample {
        let use_cache = self.config.lookup_cache;
        self.with_entry(name, |entry| {
            entry
                .lookup_exact(timestamp, use_cache)
                .or_else(|| entry.buffer.find_before(timestamp))
        })
        .flatten()
        .unwrap_or_default()
    }

    /// Returns the newest sample strictly before `timestamp`.
    ///
    /// Returns an empty sample if there is none or the series is unknown.
    pub fn point_before(&self, name: &str, timestamp: i64) -> Sample {
        self.with_entry(name, |entry| entry.buffer.find_before(timestamp))
            .flatten()
            .unwrap_or_default()
    }

    /// Returns the oldest sample strictly after `timestamp`.
    ///
    /// Returns an empty sample if there is none or the series is unknown.
    pub fn point_after(&self, name: &str, timestamp: i64) -> Sample {
        self.with_entry(name, |entry| entry.buffer.find_after(timestamp))
            .flatten()
            .unwrap_or_default()
    }

    /// Returns all samples with `start < timestamp < end`, oldest first.
    ///
    /// The result is a snapshot taken under the series lock. It is empty for
    /// unknown series and when `start >= end`.
    pub fn points_in_range(&self, name: &str, start: i64, end: i64) -> Vec<Sample> {
        self.with_entry(name, |entry| entry.buffer.find_range(start, end))
            .unwrap_or_default()
    }

    /// Removes all samples from a series, keeping it registered.
    ///
    /// The capacity is unchanged. Unknown series are ignored.
    pub fn reset(&self, name: &str) {
        let cleared = self.with_entry(name, |entry| {
            entry.buffer.clear();
            entry.invalidate();
        });

        if cleared.is_some() {
            tracing::debug!("reset series '{name}'");
        }
    }

    /// Does nothing.
    ///
    /// Kept for callers of the argument-less reset, which never cleared any
    /// data.
    #[deprecated(since = "0.1.0", note = "does nothing; use `reset(name)` to clear a series")]
    pub fn legacy_reset(&self) {}

    /// Changes the capacity of one series.
    ///
    /// Shrinking below the current length drops the oldest samples. Unknown
    /// series are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidCapacity`](crate::error::ConfigError::InvalidCapacity)
    /// if `capacity` is zero.
    pub fn set_capacity(&self, name: &str, capacity: usize) -> Result<()> {
        self.with_entry(name, |entry| -> Result<()> {
            entry.buffer.set_capacity(capacity)?;
            entry.invalidate();
            tracing::debug!("set capacity of series '{name}' to {capacity}");
            Ok(())
        })
        .unwrap_or(Ok(()))
    }

    /// Returns a summary of one series, or `None` if it is not registered.
    pub fn stats(&self, name: &str) -> Option<SeriesStats> {
        self.with_entry(name, |entry| SeriesStats {
            len: entry.buffer.len(),
            capacity: entry.buffer.capacity(),
            evicted: entry.buffer.evicted(),
            first: entry.buffer.first_timestamp(),
            last: entry.buffer.last_timestamp(),
            cache_hits: entry.cache_hits,
        })
    }
}

impl fmt::Display for SeriesStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "series store '{}' ({} series)", self.config.name, self.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AppendError, ConfigError, FluxError};
    use crate::sample::Status;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    fn create_test_store(capacity: usize, lookup_cache: bool) -> SeriesStore {
        SeriesStore::new(StoreConfig::new("test".to_string(), capacity, lookup_cache).unwrap())
            .unwrap()
    }

    #[allow(clippy::cast_precision_loss)]
    fn fill(store: &SeriesStore, name: &str, timestamps: &[i64]) {
        for &t in timestamps {
            store.add_point(name, Sample::new(t, t as f64 / 10.0, 1.0)).unwrap();
        }
    }

    #[test]
    fn test_default_store() {
        let store = SeriesStore::default();
        assert!(store.is_empty());
        assert_eq!(store.config(), &StoreConfig::default());

        store.register("a");
        assert_eq!(store.stats("a").unwrap().capacity, crate::config::DEFAULT_CAPACITY);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = StoreConfig {
            default_capacity: 0,
            ..StoreConfig::default()
        };
        assert!(matches!(
            SeriesStore::new(config),
            Err(FluxError::Config(ConfigError::InvalidCapacity { .. }))
        ));
    }

    #[test]
    fn test_register_is_idempotent() {
        let store = create_test_store(10, true);
        fill(&store, &store.register("P1"), &[10, 20]);

        assert_eq!(store.register("P1"), "P1");
        assert_eq!(store.len(), 1);
        // Re-registering must not replace the buffer
        assert_eq!(store.stats("P1").unwrap().len, 2);
    }

    #[test]
    fn test_identifiers_sorted_snapshot() {
        let store = create_test_store(10, true);
        for name in ["pump", "alpha", "tank"] {
            store.register(name);
        }

        assert_eq!(store.identifiers(), vec!["alpha", "pump", "tank"]);
        assert!(store.contains("pump"));
        assert!(!store.contains("valve"));
    }

    #[test]
    fn test_unknown_series_is_silent() {
        let store = create_test_store(10, true);

        assert!(store.add_point("ghost", Sample::new(1, 1.0, 1.0)).is_ok());
        assert!(store.add_points("ghost", &[Sample::new(1, 1.0, 1.0)]).is_ok());
        assert!(store.set_capacity("ghost", 5).is_ok());
        store.reset("ghost");

        assert!(!store.is_available("ghost", 1));
        assert!(!store.point("ghost", 1).is_present());
        assert!(!store.point_before("ghost", 1).is_present());
        assert!(!store.point_after("ghost", 0).is_present());
        assert!(store.points_in_range("ghost", 0, 10).is_empty());
        assert_eq!(store.stats("ghost"), None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_point_falls_back_to_before() {
        let store = create_test_store(10, true);
        fill(&store, &store.register("P1"), &[10, 20, 30]);

        let exact = store.point("P1", 20);
        assert_eq!(exact.timestamp, 20);
        assert_eq!(exact.status, Status::Good);

        assert_eq!(store.point("P1", 25).timestamp, 20);
        assert!(!store.point("P1", 5).is_present());
    }

    #[test]
    fn test_out_of_order_append_rejected() {
        let store = create_test_store(10, true);
        fill(&store, &store.register("P1"), &[10, 20]);

        let err = store.add_point("P1", Sample::new(15, 1.0, 1.0)).unwrap_err();
        assert!(matches!(
            err,
            FluxError::Append(AppendError::OutOfOrder { last: 20, timestamp: 15 })
        ));
        assert_eq!(store.stats("P1").unwrap().len, 2);
    }

    #[test]
    fn test_cache_hits_counted() {
        let store = create_test_store(10, true);
        fill(&store, &store.register("P1"), &[10, 20, 30]);

        assert!(store.is_available("P1", 20));
        assert_eq!(store.point("P1", 20).timestamp, 20);
        assert!(store.is_available("P1", 20));
        assert_eq!(store.stats("P1").unwrap().cache_hits, 2);

        // A miss never populates the cache
        assert!(!store.is_available("P1", 25));
        assert_eq!(store.stats("P1").unwrap().cache_hits, 2);
    }

    #[test]
    fn test_cache_invalidated_by_writes() {
        let store = create_test_store(10, true);
        fill(&store, &store.register("P1"), &[10, 20]);

        assert!(store.is_available("P1", 20));
        fill(&store, "P1", &[30]);

        // First lookup after a write searches again
        assert!(store.is_available("P1", 20));
        assert_eq!(store.stats("P1").unwrap().cache_hits, 0);
        assert!(store.is_available("P1", 20));
        assert_eq!(store.stats("P1").unwrap().cache_hits, 1);

        store.reset("P1");
        assert!(!store.is_available("P1", 20));
    }

    #[test]
    fn test_cache_invalidated_by_eviction() {
        let store = create_test_store(2, true);
        fill(&store, &store.register("P1"), &[10, 20]);

        assert!(store.is_available("P1", 10));
        fill(&store, "P1", &[30]); // evicts t=10

        assert!(!store.is_available("P1", 10));
        assert!(!store.point("P1", 10).is_present());
    }

    #[test]
    fn test_cache_scoped_per_series() {
        let store = create_test_store(10, true);
        store.register("a");
        store.register("b");
        fill(&store, "a", &[10]);

        assert!(store.is_available("a", 10));
        assert!(!store.is_available("b", 10));
        assert!(!store.point("b", 10).is_present());
    }

    #[test]
    fn test_cache_disabled() {
        let store = create_test_store(10, false);
        fill(&store, &store.register("P1"), &[10]);

        assert!(store.is_available("P1", 10));
        assert!(store.is_available("P1", 10));
        assert_eq!(store.stats("P1").unwrap().cache_hits, 0);
    }

    #[test]
    fn test_set_capacity() {
        let store = create_test_store(10, true);
        fill(&store, &store.register("P1"), &[10, 20, 30, 40]);

        store.set_capacity("P1", 2).unwrap();
        let stats = store.stats("P1").unwrap();
        assert_eq!(stats.capacity, 2);
        assert_eq!(stats.len, 2);
        assert_eq!(stats.evicted, 2);
        assert_eq!(stats.first, Some(30));

        assert!(store.set_capacity("P1", 0).is_err());
        assert_eq!(store.stats("P1").unwrap().capacity, 2);
    }

    #[test]
    fn test_add_points_grows_capacity() {
        let store = create_test_store(3, true);
        store.register("P1");

        let batch: Vec<_> = (1..=5).map(|t| Sample::new(t, 1.0, 1.0)).collect();
        store.add_points("P1", &batch).unwrap();

        let stats = store.stats("P1").unwrap();
        assert_eq!(stats.capacity, 5);
        assert_eq!(stats.len, 5);
        assert_eq!(stats.first, Some(1));
        assert_eq!(stats.last, Some(5));
    }

    #[test]
    #[allow(deprecated)]
    fn test_legacy_reset_is_noop() {
        let store = create_test_store(10, true);
        fill(&store, &store.register("P1"), &[10]);

        store.legacy_reset();
        assert_eq!(store.stats("P1").unwrap().len, 1);
    }

    #[test]
    fn test_display() {
        let store = create_test_store(10, true);
        store.register("a");
        store.register("b");
        assert_eq!(store.to_string(), "series store 'test' (2 series)");
    }

    #[test]
    fn test_distinct_series_do_not_block() {
        let store = Arc::new(create_test_store(10, true));
        store.register("a");
        store.register("b");

        let entry_a = store.entry("a").unwrap();
        let guard = entry_a.lock().unwrap();

        let (tx, rx) = mpsc::channel();
        let worker = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                store.add_point("b", Sample::new(1, 1.0, 1.0)).unwrap();
                let found = store.point_before("b", 2);
                tx.send(found.timestamp).unwrap();
            })
        };

        // Must complete while "a" is still locked
        let ts = rx
            .recv_timeout(Duration::from_secs(5))
            .expect("operation on 'b' waited on the lock for 'a'");
        assert_eq!(ts, 1);

        drop(guard);
        worker.join().unwrap();
    }

    #[test]
    fn test_same_series_is_serialized() {
        let store = Arc::new(create_test_store(10, true));
        store.register("a");

        let entry_a = store.entry("a").unwrap();
        let guard = entry_a.lock().unwrap();

        let (tx, rx) = mpsc::channel();
        let worker = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                store.add_point("a", Sample::new(1, 1.0, 1.0)).unwrap();
                tx.send(()).unwrap();
            })
        };

        assert!(
            rx.recv_timeout(Duration::from_millis(100)).is_err(),
            "write to 'a' completed while 'a' was locked"
        );

        drop(guard);
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        worker.join().unwrap();
        assert_eq!(store.stats("a").unwrap().len, 1);
    }

    #[test]
    fn test_concurrent_registration() {
        let store = create_test_store(10, true);

        thread::scope(|s| {
            for worker in 0..8 {
                let store = &store;
                s.spawn(move || {
                    for i in 0..50 {
                        store.register(&format!("series_{i}"));
                        store.register(&format!("worker_{worker}_{i}"));
                    }
                });
            }
        });

        assert_eq!(store.len(), 50 + 8 * 50);
    }
}
