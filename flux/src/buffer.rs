//! Fixed-capacity, time-ordered sample buffer for a single series.
//!
//! A [`SeriesBuffer`] keeps the most recent `capacity` records of one series in
//! ascending timestamp order and answers positional queries by binary search.
//!
//! # Key Features
//!
//! - Ring semantics: appending at capacity evicts the oldest record
//! - Exact, before, after and range lookups in O(log n)
//! - Append-only contract enforced: out-of-order samples are rejected
//! - Eviction counter so consumers can tell that history was discarded
//!
//! # Design
//!
//! Records are kept in a `VecDeque` in non-decreasing timestamp order, which
//! makes both eviction (`pop_front`) and append (`push_back`) O(1) and lets
//! every lookup use `partition_point`:
//!
//! - lower bound of `t`: first record with `timestamp >= t`
//! - upper bound of `t`: first record with `timestamp > t`
//!
//! Only timestamp, value and confidence are retained. Samples handed back by
//! the buffer always carry [`Status::Good`].

use std::collections::VecDeque;

use crate::config::DEFAULT_CAPACITY;
use crate::error::{AppendError, ConfigError, Result};
use crate::sample::{Sample, Status};

/// One stored record.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Record {
    timestamp: i64,
    value: f64,
    confidence: f64,
}

impl Record {
    fn to_sample(self) -> Sample {
        Sample::with_status(self.timestamp, self.value, self.confidence, Status::Good)
    }
}

impl From<&Sample> for Record {
    fn from(sample: &Sample) -> Self {
        Self {
            timestamp: sample.timestamp,
            value: sample.value,
            confidence: sample.confidence,
        }
    }
}

/// A bounded, time-sorted ring of samples for one series.
///
/// # Thread Safety
///
/// `SeriesBuffer` has no internal synchronization. The store wraps each buffer
/// in its own mutex; standalone users must do the same to share one.
#[derive(Debug, Clone)]
pub struct SeriesBuffer {
    /// Records in non-decreasing timestamp order.
    records: VecDeque<Record>,
    /// Maximum number of records retained.
    capacity: usize,
    /// Number of records discarded to make room, over the buffer's lifetime.
    evicted: u64,
}

impl Default for SeriesBuffer {
    /// An empty buffer of [`DEFAULT_CAPACITY`] samples.
    fn default() -> Self {
        Self {
            records: VecDeque::new(),
            capacity: DEFAULT_CAPACITY,
            evicted: 0,
        }
    }
}

impl SeriesBuffer {
    /// Creates an empty buffer that retains at most `capacity` samples.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidCapacity`] if `capacity` is zero.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use flux::{Sample, SeriesBuffer};
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let mut buffer = SeriesBuffer::with_capacity(2)?;
    /// buffer.push(Sample::new(10, 1.0, 1.0))?;
    /// buffer.push(Sample::new(20, 2.0, 1.0))?;
    /// buffer.push(Sample::new(30, 3.0, 1.0))?; // evicts t=10
    ///
    /// assert_eq!(buffer.len(), 2);
    /// assert_eq!(buffer.first_timestamp(), Some(20));
    /// assert_eq!(buffer.evicted(), 1);
    /// # Ok(())
    /// # }
    /// ```
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(ConfigError::InvalidCapacity { capacity }.into());
        }

        Ok(Self {
            records: VecDeque::new(),
            capacity,
            evicted: 0,
        })
    }

    /// Appends a sample.
    ///
    /// If the buffer is full, the oldest record is evicted first. Samples with
    /// the same timestamp as the newest record are accepted.
    ///
    /// # Errors
    ///
    /// Returns [`AppendError::OutOfOrder`] if the sample is older than the
    /// newest stored record. The buffer is left unchanged.
    pub fn push(&mut self, sample: Sample) -> Result<()> {
        if let Some(last) = self.last_timestamp()
            && sample.timestamp < last
        {
            return Err(AppendError::OutOfOrder {
                last,
                timestamp: sample.timestamp,
            }
            .into());
        }

        self.push_unchecked(Record::from(&sample));
        Ok(())
    }

    /// Appends a batch of samples as a single all-or-nothing operation.
    ///
    /// The whole batch is validated before anything is written. If the batch
    /// is longer than the current capacity, capacity grows to fit it.
    ///
    /// # Errors
    ///
    /// Returns [`AppendError::OutOfOrder`] if the batch is not sorted or
    /// starts before the newest stored record. Nothing is written.
    pub fn push_batch(&mut self, samples: &[Sample]) -> Result<()> {
        // Validate everything first
        let mut last = self.last_timestamp();
        for sample in samples {
            if let Some(prev) = last
                && sample.timestamp < prev
            {
                return Err(AppendError::OutOfOrder {
                    last: prev,
                    timestamp: sample.timestamp,
                }
                .into());
            }
            last = Some(sample.timestamp);
        }

        if samples.len() > self.capacity {
            self.capacity = samples.len();
        }

        for sample in samples {
            self.push_unchecked(Record::from(sample));
        }

        Ok(())
    }

    fn push_unchecked(&mut self, record: Record) {
        if self.records.len() >= self.capacity {
            self.records.pop_front();
            self.evicted += 1;
        }
        self.records.push_back(record);
    }

    /// Index of the first record with `timestamp >= key`.
    #[inline]
    fn lower_bound(&self, key: i64) -> usize {
        self.records.partition_point(|r| r.timestamp < key)
    }

    /// Index of the first record with `timestamp > key`.
    #[inline]
    fn upper_bound(&self, key: i64) -> usize {
        self.records.partition_point(|r| r.timestamp <= key)
    }

    /// Finds the sample stored at exactly `timestamp`.
    ///
    /// With duplicate timestamps the earliest inserted one is returned.
    pub fn find_exact(&self, timestamp: i64) -> Option<Sample> {
        self.records
            .get(self.lower_bound(timestamp))
            .filter(|r| r.timestamp == timestamp)
            .map(|r| r.to_sample())
    }

    /// Finds the newest sample strictly before `timestamp`.
    ///
    /// Returns `None` if `timestamp` is at or before the oldest record.
    pub fn find_before(&self, timestamp: i64) -> Option<Sample> {
        self.lower_bound(timestamp)
            .checked_sub(1)
            .and_then(|index| self.records.get(index))
            .map(|r| r.to_sample())
    }

    /// Finds the oldest sample strictly after `timestamp`.
    pub fn find_after(&self, timestamp: i64) -> Option<Sample> {
        self.records
            .get(self.upper_bound(timestamp))
            .map(|r| r.to_sample())
    }

    /// Returns every sample with `start < timestamp < end`, oldest first.
    ///
    /// Both bounds are exclusive. The result is empty when `start >= end`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use flux::{Sample, SeriesBuffer};
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let mut buffer = SeriesBuffer::with_capacity(10)?;
    /// for t in [10, 20, 30, 40] {
    ///     buffer.push(Sample::new(t, 0.0, 1.0))?;
    /// }
    ///
    /// let ts: Vec<_> = buffer.find_range(10, 40).iter().map(|s| s.timestamp).collect();
    /// assert_eq!(ts, vec![20, 30]);
    /// # Ok(())
    /// # }
    /// ```
    pub fn find_range(&self, start: i64, end: i64) -> Vec<Sample> {
        if start >= end {
            return Vec::new();
        }

        self.records
            .range(self.upper_bound(start)..)
            .take_while(|r| r.timestamp < end)
            .map(|r| r.to_sample())
            .collect()
    }

    /// Removes every record. Capacity and the eviction counter are kept.
    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Changes the capacity.
    ///
    /// Growing never discards data. Shrinking below the current length drops
    /// the oldest records, which are counted as evictions.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidCapacity`] if `capacity` is zero.
    pub fn set_capacity(&mut self, capacity: usize) -> Result<()> {
        if capacity == 0 {
            return Err(ConfigError::InvalidCapacity { capacity }.into());
        }

        while self.records.len() > capacity {
            self.records.pop_front();
            self.evicted += 1;
        }
        self.capacity = capacity;

        Ok(())
    }

    /// Returns the number of stored samples.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns whether the buffer holds no samples.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns the maximum number of samples retained.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns how many samples have been evicted to make room.
    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    /// Returns the timestamp of the oldest stored sample.
    pub fn first_timestamp(&self) -> Option<i64> {
        self.records.front().map(|r| r.timestamp)
    }

    /// Returns the timestamp of the newest stored sample.
    pub fn last_timestamp(&self) -> Option<i64> {
        self.records.back().map(|r| r.timestamp)
    }

    /// Iterates over the stored samples, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = Sample> + '_ {
        self.records.iter().map(|r| r.to_sample())
    }
}
