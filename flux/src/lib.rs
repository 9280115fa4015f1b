//! # flux
//!
//! Concurrent in-memory store for named time series.
//!
//! flux holds the recent history of many named series, each in a
//! fixed-capacity, time-ordered buffer of samples carrying a value, a
//! confidence and a quality status. It is the retrieval and mutation engine
//! behind a telemetry or historian layer: callers register a series, append
//! samples, and look up the sample at, before, or after a timestamp, or every
//! sample inside a time range.
//!
//! ## Key Properties
//!
//! - Bounded memory per series: the oldest sample is evicted on overflow
//! - O(log n) lookups by binary search over the sorted buffer
//! - One lock per series; distinct series never block each other
//! - Batch appends are observed atomically by concurrent readers
//! - Absence is a value: unknown series and empty lookups return an empty
//!   [`Sample`], never an error
//!
//! ## Quick Start
//!
//! ```rust
//! use flux::{Sample, SeriesStore, StoreConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = SeriesStore::new(StoreConfig::default())?;
//! let flow = store.register("pump_3.flow");
//!
//! store.add_points(&flow, &[
//!     Sample::new(1_700_000_000, 12.5, 0.95),
//!     Sample::new(1_700_000_060, 12.9, 0.95),
//!     Sample::new(1_700_000_120, 13.4, 0.90),
//! ])?;
//!
//! // Nearest sample at or before a time
//! let p = store.point(&flow, 1_700_000_090);
//! assert_eq!(p.value, 12.9);
//!
//! // Everything strictly inside a window
//! let window = store.points_in_range(&flow, 1_700_000_000, 1_700_000_200);
//! assert_eq!(window.len(), 2);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`SeriesStore`] — Registry of series; locking, lookup cache, public API
//! - [`SeriesBuffer`] — Fixed-capacity, sorted ring of samples for one series
//! - [`Sample`] — Timestamped value with confidence and [`Status`]
//! - [`StoreConfig`] — Default capacity and cache settings
//!
//! ## Modules
//!
//! - [`store`] — Store registry and concurrent access
//! - [`buffer`] — Per-series buffer and ordered search
//! - [`sample`] — Sample and status types
//! - [`config`] — Store configuration
//! - [`error`] — Error types

pub mod buffer;
pub mod config;
pub mod error;
pub mod sample;
pub mod store;

// Re-export primary API types at crate root for convenience.
pub use buffer::SeriesBuffer;
pub use config::StoreConfig;
pub use error::{FluxError, Result};
pub use sample::{Sample, Status};
pub use store::{SeriesStats, SeriesStore};
