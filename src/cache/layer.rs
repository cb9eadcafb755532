//! Reference data cache: in-memory entry, durable copy, network refresh.

use chrono::Duration;
use serde_json::Value;
use std::sync::{Arc, Mutex};

use crate::api::client::{RequestDescriptor, Transport};
use crate::api::types::ReferenceEntity;
use crate::error::{SyncError, SyncResult};

use super::storage::DurableStore;
use super::traits::{CacheEntry, CacheResult, CacheSource, Clock, DurableRecord};

/// Id of the administrator account type, hidden from sign-up choices.
pub const ADMIN_ACCOUNT_TYPE_ID: u64 = 1;

/// Which lookup table a cache holds and where it comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceDomain {
  /// Key of the durable record
  pub storage_key: String,
  /// Endpoint returning `{ "data": [...] }`
  pub path: String,
}

impl ReferenceDomain {
  pub fn new(storage_key: impl Into<String>, path: impl Into<String>) -> Self {
    Self {
      storage_key: storage_key.into(),
      path: path.into(),
    }
  }

  pub fn account_types() -> Self {
    Self::new("casanayo_type_accounts", "/api/accounts/type")
  }
}

type Entry = CacheEntry<Vec<ReferenceEntity>>;

/// Cache for a small, slow-changing lookup table.
///
/// Lookup order on [`get`](Self::get):
/// 1. In-memory entry, if within TTL and non-empty
/// 2. Durable entry, if within TTL (adopted into memory)
/// 3. Network fetch; on success memory and durable copies are replaced
/// 4. On network failure, any durable entry regardless of age
pub struct ReferenceCache {
  domain: ReferenceDomain,
  store: Arc<dyn DurableStore>,
  transport: Arc<dyn Transport>,
  clock: Arc<dyn Clock>,
  ttl: Duration,
  memory: Mutex<Option<Entry>>,
}

impl ReferenceCache {
  pub fn new(
    domain: ReferenceDomain,
    store: Arc<dyn DurableStore>,
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
  ) -> Self {
    Self {
      domain,
      store,
      transport,
      clock,
      ttl: Duration::hours(24),
      memory: Mutex::new(None),
    }
  }

  /// Set how long fetched data stays fresh.
  pub fn with_ttl(mut self, ttl: Duration) -> Self {
    self.ttl = ttl;
    self
  }

  pub fn domain(&self) -> &ReferenceDomain {
    &self.domain
  }

  /// Adopt a fresh durable entry into memory without touching the network.
  ///
  /// Returns whether an entry was adopted.
  pub fn warm(&self) -> bool {
    match self.read_durable() {
      Some(entry) if entry.is_fresh(self.clock.now(), self.ttl) => {
        self.set_memory(Some(entry));
        true
      }
      _ => false,
    }
  }

  /// Resolve the table, using cached copies where allowed.
  pub async fn get(&self, force_refresh: bool) -> SyncResult<CacheResult<Vec<ReferenceEntity>>> {
    if !force_refresh {
      if let Some(entry) = self.fresh_memory() {
        tracing::debug!(key = %self.domain.storage_key, "reference cache hit (memory)");
        return Ok(CacheResult::new(entry, CacheSource::Memory));
      }

      if let Some(entry) = self.read_durable() {
        if entry.is_fresh(self.clock.now(), self.ttl) {
          tracing::debug!(key = %self.domain.storage_key, "reference cache hit (durable)");
          self.set_memory(Some(entry.clone()));
          return Ok(CacheResult::new(entry, CacheSource::Durable));
        }
        tracing::debug!(key = %self.domain.storage_key, "durable entry expired");
      }
    }

    match self.fetch().await {
      Ok(entities) => {
        let entry = CacheEntry::new(entities, self.clock.now());
        self.set_memory(Some(entry.clone()));
        self.write_durable(&entry);
        Ok(CacheResult::new(entry, CacheSource::Network))
      }
      Err(err) => {
        let fallback = self.read_durable().or_else(|| self.memory_entry());
        match fallback {
          Some(entry) => {
            tracing::warn!(
              key = %self.domain.storage_key,
              error = %err,
              fetched_at = %entry.fetched_at,
              "reference fetch failed, serving stale entry"
            );
            self.set_memory(Some(entry.clone()));
            Ok(CacheResult::new(entry, CacheSource::Offline))
          }
          None => Err(err),
        }
      }
    }
  }

  /// The table without the entity whose id is `excluded_id`.
  pub async fn get_excluding(
    &self,
    excluded_id: u64,
    force_refresh: bool,
  ) -> SyncResult<CacheResult<Vec<ReferenceEntity>>> {
    let result = self.get(force_refresh).await?;
    Ok(result.map(|entities| {
      entities
        .into_iter()
        .filter(|entity| entity.id != excluded_id)
        .collect()
    }))
  }

  /// Account types a user may pick (everything except the administrator).
  pub async fn get_excluding_admin(&self) -> SyncResult<Vec<ReferenceEntity>> {
    Ok(self.get_excluding(ADMIN_ACCOUNT_TYPE_ID, false).await?.data)
  }

  /// Drop both the in-memory and the durable copy.
  pub fn invalidate(&self) {
    self.set_memory(None);
    if let Err(e) = self.store.remove(&self.domain.storage_key) {
      tracing::warn!(key = %self.domain.storage_key, error = %e, "failed to remove durable entry");
    }
  }

  fn memory_entry(&self) -> Option<Entry> {
    self.memory.lock().ok().and_then(|memory| memory.clone())
  }

  fn fresh_memory(&self) -> Option<Entry> {
    self
      .memory_entry()
      .filter(|entry| !entry.payload.is_empty() && entry.is_fresh(self.clock.now(), self.ttl))
  }

  fn set_memory(&self, entry: Option<Entry>) {
    if let Ok(mut memory) = self.memory.lock() {
      *memory = entry;
    }
  }

  /// Read and parse the durable record. Unreadable records are purged.
  fn read_durable(&self) -> Option<Entry> {
    let key = &self.domain.storage_key;
    let blob = match self.store.get(key) {
      Ok(blob) => blob?,
      Err(e) => {
        tracing::warn!(key = %key, error = %e, "durable store read failed");
        return None;
      }
    };

    let entry = serde_json::from_str::<DurableRecord<Vec<ReferenceEntity>>>(&blob)
      .ok()
      .and_then(DurableRecord::into_entry);

    if entry.is_none() {
      tracing::warn!(key = %key, "purging corrupt durable entry");
      if let Err(e) = self.store.remove(key) {
        tracing::warn!(key = %key, error = %e, "failed to purge corrupt entry");
      }
    }
    entry
  }

  fn write_durable(&self, entry: &Entry) {
    let key = &self.domain.storage_key;
    let record = DurableRecord::from(entry.clone());
    let written = serde_json::to_string(&record)
      .map_err(|e| e.to_string())
      .and_then(|blob| self.store.put(key, &blob).map_err(|e| e.to_string()));

    if let Err(e) = written {
      tracing::warn!(key = %key, error = %e, "failed to persist reference entry");
    }
  }

  async fn fetch(&self) -> SyncResult<Vec<ReferenceEntity>> {
    let response = self
      .transport
      .send(RequestDescriptor::get(self.domain.path.as_str()))
      .await?;
    let body = response.into_success()?;
    parse_reference_list(body)
  }
}

/// Parse `{ "data": [...] }`. A missing or null `data` is an empty table.
fn parse_reference_list(body: Value) -> SyncResult<Vec<ReferenceEntity>> {
  let Value::Object(mut object) = body else {
    return Err(SyncError::MalformedResponse(
      "expected an object with a data list".to_string(),
    ));
  };

  match object.remove("data") {
    None | Some(Value::Null) => Ok(Vec::new()),
    Some(Value::Array(items)) => Ok(
      items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<ReferenceEntity>(item) {
          Ok(entity) => Some(entity),
          Err(e) => {
            tracing::debug!(error = %e, "skipping malformed reference entity");
            None
          }
        })
        .collect(),
    ),
    Some(_) => Err(SyncError::MalformedResponse(
      "reference data is not a list".to_string(),
    )),
  }
}
