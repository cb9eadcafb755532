//! Core traits and types for the caching system.

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Source of the current time.
///
/// Injected into the cache so TTL expiry can be driven by tests.
pub trait Clock: Send + Sync {
  fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> DateTime<Utc> {
    Utc::now()
  }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
  now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
  pub fn new(start: DateTime<Utc>) -> Self {
    Self {
      now: Mutex::new(start),
    }
  }

  /// Move the clock forward by `by`.
  pub fn advance(&self, by: Duration) {
    if let Ok(mut now) = self.now.lock() {
      *now += by;
    }
  }
}

impl Clock for ManualClock {
  fn now(&self) -> DateTime<Utc> {
    self.now.lock().map(|now| *now).unwrap_or_else(|_| Utc::now())
  }
}

/// A cached payload together with the time it was fetched from the network.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<T> {
  pub payload: T,
  pub fetched_at: DateTime<Utc>,
}

impl<T> CacheEntry<T> {
  pub fn new(payload: T, fetched_at: DateTime<Utc>) -> Self {
    Self {
      payload,
      fetched_at,
    }
  }

  /// An entry is fresh while strictly less than `ttl` has elapsed.
  pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
    now - self.fetched_at < ttl
  }
}

/// On-disk shape of a cache entry: payload plus epoch-millisecond timestamp.
#[derive(Debug, Serialize, Deserialize)]
pub struct DurableRecord<T> {
  pub payload: T,
  pub timestamp: i64,
}

impl<T> From<CacheEntry<T>> for DurableRecord<T> {
  fn from(entry: CacheEntry<T>) -> Self {
    Self {
      payload: entry.payload,
      timestamp: entry.fetched_at.timestamp_millis(),
    }
  }
}

impl<T> DurableRecord<T> {
  /// Convert back into a cache entry. `None` when the timestamp is out of range.
  pub fn into_entry(self) -> Option<CacheEntry<T>> {
    let fetched_at = Utc.timestamp_millis_opt(self.timestamp).single()?;
    Some(CacheEntry::new(self.payload, fetched_at))
  }
}

/// Result from a cache operation, including data and metadata about the source.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: CacheSource,
  /// When the data was fetched from the network
  pub fetched_at: DateTime<Utc>,
}

impl<T> CacheResult<T> {
  pub fn new(entry: CacheEntry<T>, source: CacheSource) -> Self {
    Self {
      data: entry.payload,
      source,
      fetched_at: entry.fetched_at,
    }
  }

  /// Map the payload, keeping the source metadata.
  pub fn map<U>(self, f: impl FnOnce(T) -> U) -> CacheResult<U> {
    CacheResult {
      data: f(self.data),
      source: self.source,
      fetched_at: self.fetched_at,
    }
  }
}

/// Indicates where cached data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheSource {
  /// In-memory entry, within TTL
  Memory,
  /// Durable entry within TTL, adopted into memory
  Durable,
  /// Fresh data from network
  Network,
  /// Network failed, serving a durable entry regardless of its age
  Offline,
}
