//! Caching for small, slow-changing reference tables.
//!
//! This module provides:
//! - A time-bounded in-memory entry (24 hour TTL by default)
//! - A durable copy that survives restarts
//! - Fallback to a stale durable copy when the network is unavailable
//!
//! Durable storage is treated as untrusted: unparsable entries are purged
//! and read as a miss.

mod layer;
mod storage;
mod traits;

pub use layer::{ReferenceCache, ReferenceDomain, ADMIN_ACCOUNT_TYPE_ID};
pub use storage::{DurableStore, MemoryStore, NoopStore, SqliteStore};
pub use traits::{CacheEntry, CacheResult, CacheSource, Clock, ManualClock, SystemClock};
