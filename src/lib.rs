//! Client-side data synchronization for a real-estate listing backend.
//!
//! - [`api`]: wire formats, normalization into canonical records, the
//!   transport seam and the mutation encoder
//! - [`cache`]: a TTL + durable cache for small reference tables
//! - [`collection`]: list/current-record state kept in step with the server

pub mod api;
pub mod cache;
pub mod collection;
pub mod config;
pub mod error;

pub use collection::{Collection, ListParams, LoadOrdering, LoadState, Snapshot};
pub use config::Config;
pub use error::{SyncError, SyncResult};
