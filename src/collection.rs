//! Collection synchronizer: keeps a list of records and a "current" record
//! consistent with the server across loads and mutations.
//!
//! State is published as immutable [`Snapshot`]s through a `watch` channel,
//! so a presentation layer can either poll [`Collection::snapshot`] or
//! await changes on [`Collection::subscribe`].
//!
//! # Example
//!
//! ```ignore
//! let articles: Collection<Article> = Collection::new(transport);
//! articles.load_all(&ListParams::default().page(0).size(20)).await?;
//!
//! let patch = MutationRequest::new().field("title", "New");
//! let updated = articles.apply_update(42, patch).await?;
//!
//! let snapshot = articles.snapshot();
//! assert_eq!(snapshot.get(42).map(|a| a.title.as_str()), Some("New"));
//! ```
//!
//! # Ordering
//!
//! Operations are not serialized against each other. With the default
//! [`LoadOrdering::LastResolvedWins`], a bulk load that started before an
//! update but resolves after it overwrites the updated record with the
//! older server copy. [`LoadOrdering::DiscardOutOfOrder`] stamps every
//! operation with a sequence number and drops bulk loads that resolve
//! after a newer operation has already been applied.

use serde::Deserialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;

use crate::api::client::{RequestDescriptor, Transport};
use crate::api::mutation::{MutationBuilder, MutationKind, MutationRequest};
use crate::api::resource::Resource;
use crate::api::types::{Article, ArticleStatus};
use crate::error::{SyncError, SyncResult};

/// Load state of a collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
  /// No request in flight
  Idle,
  /// At least one request in flight
  Loading,
  /// The last request failed
  Error,
}

/// How bulk loads that resolve out of order are handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadOrdering {
  /// Every resolved load is applied, whatever happened meanwhile
  #[default]
  LastResolvedWins,
  /// A load is dropped if a newer operation was applied before it resolved
  DiscardOutOfOrder,
}

/// Filters for a bulk load. Unset fields are not sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListParams {
  pub page: Option<u32>,
  pub size: Option<u32>,
  pub category: Option<String>,
  pub status: Option<String>,
  pub sort: Option<String>,
}

impl ListParams {
  pub fn page(mut self, page: u32) -> Self {
    self.page = Some(page);
    self
  }

  pub fn size(mut self, size: u32) -> Self {
    self.size = Some(size);
    self
  }

  pub fn category(mut self, category: impl Into<String>) -> Self {
    self.category = Some(category.into());
    self
  }

  pub fn status(mut self, status: impl Into<String>) -> Self {
    self.status = Some(status.into());
    self
  }

  pub fn sort(mut self, sort: impl Into<String>) -> Self {
    self.sort = Some(sort.into());
    self
  }

  fn to_query(&self) -> Vec<(String, String)> {
    let mut query = Vec::new();
    if let Some(page) = self.page {
      query.push(("page".to_string(), page.to_string()));
    }
    if let Some(size) = self.size {
      query.push(("size".to_string(), size.to_string()));
    }
    if let Some(category) = self.category.as_ref().filter(|c| !c.is_empty()) {
      query.push(("category".to_string(), category.clone()));
    }
    if let Some(status) = self.status.as_ref().filter(|s| !s.is_empty()) {
      query.push(("status".to_string(), status.clone()));
    }
    if let Some(sort) = self.sort.as_ref().filter(|s| !s.is_empty()) {
      query.push(("sort".to_string(), sort.clone()));
    }
    query
  }
}

/// Immutable view of a collection at one point in time.
#[derive(Debug)]
pub struct Snapshot<R> {
  /// Records in display order, unique by id
  pub items: Arc<Vec<Arc<R>>>,
  /// The record being viewed or edited, if any
  pub current: Option<Arc<R>>,
  pub state: LoadState,
  pub error: Option<String>,
  /// Incremented on every published change
  pub revision: u64,
}

impl<R> Clone for Snapshot<R> {
  fn clone(&self) -> Self {
    Self {
      items: Arc::clone(&self.items),
      current: self.current.clone(),
      state: self.state,
      error: self.error.clone(),
      revision: self.revision,
    }
  }
}

impl<R> Default for Snapshot<R> {
  fn default() -> Self {
    Self {
      items: Arc::new(Vec::new()),
      current: None,
      state: LoadState::Idle,
      error: None,
      revision: 0,
    }
  }
}

impl<R: Resource> Snapshot<R> {
  pub fn get(&self, id: u64) -> Option<&Arc<R>> {
    self.items.iter().find(|item| item.id() == id)
  }

  pub fn position(&self, id: u64) -> Option<usize> {
    self.items.iter().position(|item| item.id() == id)
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn is_loading(&self) -> bool {
    self.state == LoadState::Loading
  }
}

struct State<R> {
  snapshot: Snapshot<R>,
  in_flight: usize,
  /// Sequence number of the newest operation applied so far
  committed_seq: u64,
}

/// Owns one ordered, id-unique collection of records plus a current record.
pub struct Collection<R: Resource> {
  transport: Arc<dyn Transport>,
  ordering: LoadOrdering,
  next_seq: AtomicU64,
  state: Mutex<State<R>>,
  notify: watch::Sender<Arc<Snapshot<R>>>,
}

impl<R: Resource> Collection<R> {
  pub fn new(transport: Arc<dyn Transport>) -> Self {
    let (notify, _) = watch::channel(Arc::new(Snapshot::default()));
    Self {
      transport,
      ordering: LoadOrdering::default(),
      next_seq: AtomicU64::new(0),
      state: Mutex::new(State {
        snapshot: Snapshot::default(),
        in_flight: 0,
        committed_seq: 0,
      }),
      notify,
    }
  }

  pub fn with_ordering(mut self, ordering: LoadOrdering) -> Self {
    self.ordering = ordering;
    self
  }

  /// The latest published snapshot.
  pub fn snapshot(&self) -> Arc<Snapshot<R>> {
    self.notify.borrow().clone()
  }

  /// Receive every snapshot published from now on.
  pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot<R>>> {
    self.notify.subscribe()
  }

  /// Replace the whole list with the server's, in server order.
  ///
  /// On failure the previous list is kept and the error is recorded in
  /// the snapshot as well as returned.
  pub async fn load_all(&self, params: &ListParams) -> SyncResult<()> {
    let seq = self.begin();
    let result = self.fetch_list(params).await;

    self.modify(|state| match result {
      Ok(records) => {
        if self.ordering == LoadOrdering::DiscardOutOfOrder && seq < state.committed_seq {
          tracing::debug!(
            resource = R::NAME,
            seq,
            committed = state.committed_seq,
            "discarding out-of-order load"
          );
        } else {
          state.committed_seq = state.committed_seq.max(seq);
          state.snapshot.items = Arc::new(records);
        }
        settle(state, None);
        Ok(())
      }
      Err(err) => {
        tracing::warn!(resource = R::NAME, error = %err, "bulk load failed, keeping previous list");
        settle(state, Some(err.to_string()));
        Err(err)
      }
    })
  }

  /// Fetch one record and make it current. If it is already listed it is
  /// replaced in place; otherwise the list is left alone.
  pub async fn load_one(&self, id: u64) -> SyncResult<R> {
    let seq = self.begin();
    let result = self
      .fetch_one(id)
      .await
      .and_then(|record| expect_id(record, id, "fetched"));

    self.modify(|state| match result {
      Ok(record) => {
        state.committed_seq = state.committed_seq.max(seq);
        let record = Arc::new(record);
        if let Some(index) = state.snapshot.position(id) {
          let mut items = state.snapshot.items.as_ref().clone();
          items[index] = Arc::clone(&record);
          state.snapshot.items = Arc::new(items);
        }
        state.snapshot.current = Some(Arc::clone(&record));
        settle(state, None);
        Ok(record.as_ref().clone())
      }
      Err(err) => {
        settle(state, Some(err.to_string()));
        Err(err)
      }
    })
  }

  /// Send a partial update and reconcile the server's copy into the
  /// current record and the list (in place, or appended if not listed).
  ///
  /// Nothing changes locally until the server confirms.
  pub async fn apply_update(&self, id: u64, patch: MutationRequest) -> SyncResult<R> {
    let seq = self.begin();
    let request = MutationBuilder::build(MutationKind::Update, &R::item_path(id), patch);
    let result = self
      .mutate(request)
      .await
      .and_then(|record| expect_id(record, id, "updated"));

    self.modify(|state| match result {
      Ok(record) => {
        state.committed_seq = state.committed_seq.max(seq);
        let record = Arc::new(record);
        let snapshot = &mut state.snapshot;

        if snapshot.current.as_ref().is_some_and(|current| current.id() == id) {
          snapshot.current = Some(Arc::clone(&record));
        }

        let mut items = snapshot.items.as_ref().clone();
        match snapshot.position(id) {
          Some(index) => items[index] = Arc::clone(&record),
          None => items.push(Arc::clone(&record)),
        }
        snapshot.items = Arc::new(items);

        tracing::info!(resource = R::NAME, id, "record updated");
        settle(state, None);
        Ok(record.as_ref().clone())
      }
      Err(err) => {
        tracing::warn!(resource = R::NAME, id, error = %err, "update failed");
        settle(state, Some(err.to_string()));
        Err(err)
      }
    })
  }

  /// Create a record and put the server's copy at the front of the list.
  pub async fn apply_create(&self, fields: MutationRequest) -> SyncResult<R> {
    let seq = self.begin();
    let request = MutationBuilder::build(MutationKind::Create, R::PATH, fields);
    let result = self.mutate(request).await;

    self.modify(|state| match result {
      Ok(record) => {
        state.committed_seq = state.committed_seq.max(seq);
        let record = Arc::new(record);
        let id = record.id();

        let mut items = Vec::with_capacity(state.snapshot.items.len() + 1);
        items.push(Arc::clone(&record));
        items.extend(
          state
            .snapshot
            .items
            .iter()
            .filter(|item| item.id() != id)
            .cloned(),
        );
        state.snapshot.items = Arc::new(items);

        tracing::info!(resource = R::NAME, id, "record created");
        settle(state, None);
        Ok(record.as_ref().clone())
      }
      Err(err) => {
        tracing::warn!(resource = R::NAME, error = %err, "create failed");
        settle(state, Some(err.to_string()));
        Err(err)
      }
    })
  }

  /// Mark a new operation in flight and return its sequence number.
  fn begin(&self) -> u64 {
    let seq = self.next_seq.fetch_add(1, Ordering::SeqCst) + 1;
    self.modify(|state| {
      state.in_flight += 1;
      state.snapshot.state = LoadState::Loading;
      state.snapshot.error = None;
    });
    seq
  }

  /// Apply `f` to the state and publish the resulting snapshot.
  fn modify<T>(&self, f: impl FnOnce(&mut State<R>) -> T) -> T {
    let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
    let out = f(&mut state);
    state.snapshot.revision += 1;
    self.notify.send_replace(Arc::new(state.snapshot.clone()));
    out
  }

  async fn fetch_list(&self, params: &ListParams) -> SyncResult<Vec<Arc<R>>> {
    let request = RequestDescriptor::get(R::PATH).with_query(params.to_query());
    let body = self.transport.send(request).await?.into_success()?;

    let mut seen = HashSet::new();
    let records: Vec<Arc<R>> = R::unwrap_list(body)?
      .iter()
      .map(R::normalize)
      .filter(|record| seen.insert(record.id()))
      .map(Arc::new)
      .collect();

    tracing::debug!(resource = R::NAME, count = records.len(), "loaded list");
    Ok(records)
  }

  async fn fetch_one(&self, id: u64) -> SyncResult<R> {
    let request = RequestDescriptor::get(R::item_path(id));
    let body = self.transport.send(request).await?.into_success()?;
    Ok(R::normalize(&R::unwrap_one(body)?))
  }

  async fn mutate(&self, request: RequestDescriptor) -> SyncResult<R> {
    tracing::debug!(
      resource = R::NAME,
      method = %request.method,
      path = %request.path,
      encoding = ?request.encoding(),
      "sending mutation"
    );
    let body = self.transport.send(request).await?.into_success()?;
    Ok(R::normalize(&R::unwrap_one(body)?))
  }
}

/// Reject a server record that is not the one that was asked for.
fn expect_id<R: Resource>(record: R, id: u64, action: &str) -> SyncResult<R> {
  if record.id() == id {
    Ok(record)
  } else {
    Err(SyncError::MalformedResponse(format!(
      "{} {} has id {}, expected {}",
      action,
      R::NAME,
      record.id(),
      id
    )))
  }
}

/// Close one in-flight operation, recording its error if it failed.
fn settle<R>(state: &mut State<R>, error: Option<String>) {
  state.in_flight = state.in_flight.saturating_sub(1);
  if error.is_some() {
    state.snapshot.error = error;
  }
  state.snapshot.state = if state.in_flight > 0 {
    LoadState::Loading
  } else if state.snapshot.error.is_some() {
    LoadState::Error
  } else {
    LoadState::Idle
  };
}

// ============================================================================
// Article views
// ============================================================================

impl Collection<Article> {
  pub fn published(&self) -> Vec<Arc<Article>> {
    self.filtered(|a| a.status == ArticleStatus::Published)
  }

  pub fn featured(&self) -> Vec<Arc<Article>> {
    self.filtered(|a| a.featured)
  }

  pub fn by_category(&self, category: &str) -> Vec<Arc<Article>> {
    self.filtered(|a| a.category == category)
  }

  fn filtered(&self, keep: impl Fn(&Article) -> bool) -> Vec<Arc<Article>> {
    self
      .snapshot()
      .items
      .iter()
      .filter(|a| keep(a))
      .cloned()
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::client::Encoding;
  use crate::api::mutation::{Attachment, METHOD_OVERRIDE_FIELD};
  use crate::api::testing::ScriptedTransport;
  use crate::api::types::Property;
  use reqwest::Method;
  use serde_json::{json, Value};
  use tokio::sync::Notify;

  fn article(id: u64, title: &str) -> Value {
    json!({"id": id, "title": title, "status": "published", "category": "market"})
  }

  fn article_list(ids: &[u64]) -> Value {
    let data: Vec<Value> = ids.iter().map(|id| article(*id, &format!("A{}", id))).collect();
    json!({"success": true, "data": data})
  }

  fn envelope(data: Value) -> Value {
    json!({"success": true, "data": data})
  }

  async fn loaded(ids: &[u64]) -> (Collection<Article>, Arc<ScriptedTransport>) {
    let transport = ScriptedTransport::new();
    let collection: Collection<Article> = Collection::new(transport.clone());
    transport.push_json(200, article_list(ids));
    collection.load_all(&ListParams::default()).await.unwrap();
    (collection, transport)
  }

  fn ids(snapshot: &Snapshot<Article>) -> Vec<u64> {
    snapshot.items.iter().map(|a| a.id).collect()
  }

  #[tokio::test]
  async fn test_load_all_keeps_server_order() {
    let (collection, transport) = loaded(&[5, 3, 9]).await;
    let snapshot = collection.snapshot();

    assert_eq!(ids(&snapshot), vec![5, 3, 9]);
    assert_eq!(snapshot.state, LoadState::Idle);
    assert_eq!(snapshot.error, None);
    assert_eq!(transport.requests()[0].path, "/api/actualities");
    assert!(transport.requests()[0].query.is_empty());
  }

  #[tokio::test]
  async fn test_load_all_sends_only_present_params() {
    let transport = ScriptedTransport::new();
    let collection: Collection<Article> = Collection::new(transport.clone());
    transport.push_json(200, article_list(&[]));

    let params = ListParams::default().page(2).size(10).category("market");
    collection.load_all(&params).await.unwrap();

    assert_eq!(
      transport.requests()[0].query,
      vec![
        ("page".to_string(), "2".to_string()),
        ("size".to_string(), "10".to_string()),
        ("category".to_string(), "market".to_string()),
      ]
    );
  }

  #[tokio::test]
  async fn test_load_all_drops_duplicate_ids() {
    let (collection, _) = loaded(&[1, 2, 1]).await;
    assert_eq!(ids(&collection.snapshot()), vec![1, 2]);
  }

  #[tokio::test]
  async fn test_failed_load_keeps_previous_items() {
    let (collection, transport) = loaded(&[1, 2, 3]).await;
    let before = collection.snapshot();

    transport.push_failure();
    assert!(collection.load_all(&ListParams::default()).await.is_err());

    let after = collection.snapshot();
    assert!(Arc::ptr_eq(&before.items, &after.items));
    assert_eq!(after.state, LoadState::Error);
    assert!(after.error.is_some());
  }

  #[tokio::test]
  async fn test_malformed_load_is_an_error() {
    let (collection, transport) = loaded(&[1]).await;
    let before = collection.snapshot();

    transport.push_json(200, json!({"success": false, "message": "db down"}));
    let err = collection.load_all(&ListParams::default()).await.unwrap_err();

    assert!(matches!(err, SyncError::MalformedResponse(_)));
    assert!(Arc::ptr_eq(&before.items, &collection.snapshot().items));
  }

  #[tokio::test]
  async fn test_successful_load_clears_error() {
    let (collection, transport) = loaded(&[1]).await;
    transport.push_failure();
    let _ = collection.load_all(&ListParams::default()).await;

    transport.push_json(200, article_list(&[2]));
    collection.load_all(&ListParams::default()).await.unwrap();

    let snapshot = collection.snapshot();
    assert_eq!(snapshot.state, LoadState::Idle);
    assert_eq!(snapshot.error, None);
    assert_eq!(ids(&snapshot), vec![2]);
  }

  #[tokio::test]
  async fn test_load_one_replaces_listed_record_in_place() {
    let (collection, transport) = loaded(&[1, 2, 3]).await;
    transport.push_json(200, envelope(article(2, "Reloaded")));

    let record = collection.load_one(2).await.unwrap();

    let snapshot = collection.snapshot();
    assert_eq!(record.title, "Reloaded");
    assert_eq!(ids(&snapshot), vec![1, 2, 3]);
    assert_eq!(snapshot.items[1].title, "Reloaded");
    assert!(Arc::ptr_eq(snapshot.current.as_ref().unwrap(), &snapshot.items[1]));
    assert_eq!(transport.requests()[1].path, "/api/actualities/2");
  }

  #[tokio::test]
  async fn test_load_one_unlisted_only_sets_current() {
    let (collection, transport) = loaded(&[1, 2]).await;
    let before = collection.snapshot();
    transport.push_json(200, envelope(article(7, "Elsewhere")));

    collection.load_one(7).await.unwrap();

    let after = collection.snapshot();
    assert!(Arc::ptr_eq(&before.items, &after.items));
    assert_eq!(after.current.as_ref().unwrap().id, 7);
  }

  #[tokio::test]
  async fn test_update_replaces_at_same_index() {
    let (collection, transport) = loaded(&[10, 11, 12, 42, 13]).await;
    let before = collection.snapshot();
    transport.push_json(200, envelope(article(42, "New")));

    let patch = MutationRequest::new().field("title", "New");
    let updated = collection.apply_update(42, patch).await.unwrap();

    let after = collection.snapshot();
    assert_eq!(updated.id, 42);
    assert_eq!(after.len(), 5);
    assert_eq!(after.items[3].as_ref(), &updated);
    assert_eq!(after.items.iter().filter(|a| a.id == 42).count(), 1);
    assert!(!Arc::ptr_eq(&before.items[3], &after.items[3]));
    assert!(Arc::ptr_eq(&before.items[0], &after.items[0]));

    let request = &transport.requests()[1];
    assert_eq!(request.method, Method::PUT);
    assert_eq!(request.path, "/api/actualities/42");
    assert_eq!(request.encoding(), Encoding::Json);
  }

  #[tokio::test]
  async fn test_update_replaces_current_entirely() {
    let (collection, transport) = loaded(&[42]).await;
    transport.push_json(
      200,
      envelope(json!({"id": 42, "title": "Old", "tags": ["a"], "featured": true})),
    );
    collection.load_one(42).await.unwrap();

    transport.push_json(200, envelope(json!({"id": 42, "title": "New"})));
    collection
      .apply_update(42, MutationRequest::new().field("title", "New"))
      .await
      .unwrap();

    let snapshot = collection.snapshot();
    let current = snapshot.current.as_ref().unwrap();
    assert_eq!(current.title, "New");
    assert!(current.tags.is_empty());
    assert!(!current.featured);
    assert!(Arc::ptr_eq(current, &snapshot.items[0]));
  }

  #[tokio::test]
  async fn test_update_of_unlisted_record_appends() {
    let (collection, transport) = loaded(&[1, 2]).await;
    transport.push_json(200, envelope(article(99, "Appended")));

    collection
      .apply_update(99, MutationRequest::new().field("title", "Appended"))
      .await
      .unwrap();

    assert_eq!(ids(&collection.snapshot()), vec![1, 2, 99]);
  }

  #[tokio::test]
  async fn test_failed_update_leaves_state_untouched() {
    let (collection, transport) = loaded(&[1, 42]).await;
    transport.push_json(200, envelope(article(42, "Current")));
    collection.load_one(42).await.unwrap();
    let before = collection.snapshot();

    transport.push_json(422, json!({"message": "title too long"}));
    let err = collection
      .apply_update(42, MutationRequest::new().field("title", "x".repeat(500)))
      .await
      .unwrap_err();

    let after = collection.snapshot();
    assert!(matches!(err, SyncError::Status { status: 422, .. }));
    assert!(Arc::ptr_eq(&before.items, &after.items));
    assert!(Arc::ptr_eq(
      before.current.as_ref().unwrap(),
      after.current.as_ref().unwrap()
    ));
    assert_eq!(after.state, LoadState::Error);
  }

  #[tokio::test]
  async fn test_load_one_response_with_other_id_is_rejected() {
    let (collection, transport) = loaded(&[1, 2, 3]).await;
    let before = collection.snapshot();
    transport.push_json(200, envelope(article(3, "Wrong")));

    let err = collection.load_one(2).await.unwrap_err();

    let after = collection.snapshot();
    assert!(matches!(err, SyncError::MalformedResponse(_)));
    assert!(Arc::ptr_eq(&before.items, &after.items));
    assert_eq!(ids(&after), vec![1, 2, 3]);
    assert!(after.current.is_none());
    assert_eq!(after.state, LoadState::Error);
  }

  #[tokio::test]
  async fn test_update_response_with_other_id_is_rejected() {
    let (collection, transport) = loaded(&[42]).await;
    let before = collection.snapshot();
    transport.push_json(200, envelope(article(43, "Wrong")));

    let err = collection
      .apply_update(42, MutationRequest::new().field("title", "Wrong"))
      .await
      .unwrap_err();

    assert!(matches!(err, SyncError::MalformedResponse(_)));
    assert!(Arc::ptr_eq(&before.items, &collection.snapshot().items));
  }

  #[tokio::test]
  async fn test_update_with_attachment_uses_multipart() {
    let (collection, transport) = loaded(&[42]).await;
    transport.push_json(200, envelope(article(42, "With image")));

    let patch = MutationRequest::new()
      .field("title", "With image")
      .attach("image", Attachment::new("cover.jpg", vec![0xffu8, 0xd8]));
    collection.apply_update(42, patch).await.unwrap();

    let request = &transport.requests()[1];
    assert_eq!(request.method, Method::POST);
    assert_eq!(request.encoding(), Encoding::Multipart);
    assert_eq!(request.text_part(METHOD_OVERRIDE_FIELD), Some("PUT"));
  }

  #[tokio::test]
  async fn test_create_prepends() {
    let (collection, transport) = loaded(&[1, 2, 3]).await;
    transport.push_json(201, envelope(article(4, "Fresh")));

    let created = collection
      .apply_create(MutationRequest::new().field("title", "Fresh"))
      .await
      .unwrap();

    let snapshot = collection.snapshot();
    assert_eq!(created.title, "Fresh");
    assert_eq!(ids(&snapshot), vec![4, 1, 2, 3]);

    let request = &transport.requests()[1];
    assert_eq!(request.method, Method::POST);
    assert_eq!(request.path, "/api/actualities");
  }

  #[tokio::test]
  async fn test_create_keeps_ids_unique() {
    let (collection, transport) = loaded(&[1, 4, 2]).await;
    transport.push_json(201, envelope(article(4, "Again")));

    collection
      .apply_create(MutationRequest::new().field("title", "Again"))
      .await
      .unwrap();

    assert_eq!(ids(&collection.snapshot()), vec![4, 1, 2]);
  }

  #[tokio::test]
  async fn test_failed_create_leaves_list() {
    let (collection, transport) = loaded(&[1]).await;
    let before = collection.snapshot();
    transport.push_failure();

    assert!(collection
      .apply_create(MutationRequest::new().field("title", "Lost"))
      .await
      .is_err());
    assert!(Arc::ptr_eq(&before.items, &collection.snapshot().items));
  }

  #[tokio::test]
  async fn test_subscribers_see_mutations() {
    let (collection, transport) = loaded(&[42]).await;
    let mut receiver = collection.subscribe();

    transport.push_json(200, envelope(article(42, "New")));
    collection
      .apply_update(42, MutationRequest::new().field("title", "New"))
      .await
      .unwrap();

    assert!(receiver.has_changed().unwrap());
    let snapshot = receiver.borrow_and_update().clone();
    assert_eq!(snapshot.items[0].title, "New");
    assert_eq!(snapshot.revision, collection.snapshot().revision);
  }

  async fn race(ordering: LoadOrdering) -> Snapshot<Article> {
    let transport = ScriptedTransport::new();
    let collection: Collection<Article> =
      Collection::new(transport.clone()).with_ordering(ordering);
    transport.push_json(200, article_list(&[1, 42]));
    collection.load_all(&ListParams::default()).await.unwrap();

    let gate = Arc::new(Notify::new());
    transport.push_gated(gate.clone(), 200, article_list(&[1, 42]));
    transport.push_json(200, envelope(article(42, "Updated")));

    let params = ListParams::default();
    let load = collection.load_all(&params);
    let update = async {
      let result = collection
        .apply_update(42, MutationRequest::new().field("title", "Updated"))
        .await;
      gate.notify_one();
      result
    };
    let (load_result, update_result) = futures::join!(load, update);
    load_result.unwrap();
    update_result.unwrap();

    collection.snapshot().as_ref().clone()
  }

  #[tokio::test]
  async fn test_slow_load_overwrites_update_by_default() {
    let snapshot = race(LoadOrdering::LastResolvedWins).await;
    assert_eq!(snapshot.items[1].title, "A42");
  }

  #[tokio::test]
  async fn test_out_of_order_load_is_discarded() {
    let snapshot = race(LoadOrdering::DiscardOutOfOrder).await;
    assert_eq!(snapshot.items[1].title, "Updated");
    assert_eq!(snapshot.state, LoadState::Idle);
  }

  #[tokio::test]
  async fn test_article_views() {
    let transport = ScriptedTransport::new();
    let collection: Collection<Article> = Collection::new(transport.clone());
    transport.push_json(
      200,
      json!({"success": true, "data": [
        {"id": 1, "status": "published", "featured": true, "category": "market"},
        {"id": 2, "status": "draft", "category": "market"},
        {"id": 3, "status": "published", "category": "tips"}
      ]}),
    );
    collection.load_all(&ListParams::default()).await.unwrap();

    let published: Vec<u64> = collection.published().iter().map(|a| a.id).collect();
    let featured: Vec<u64> = collection.featured().iter().map(|a| a.id).collect();
    let market: Vec<u64> = collection.by_category("market").iter().map(|a| a.id).collect();
    assert_eq!(published, vec![1, 3]);
    assert_eq!(featured, vec![1]);
    assert_eq!(market, vec![1, 2]);
  }

  #[tokio::test]
  async fn test_property_collection() {
    let transport = ScriptedTransport::new();
    let collection: Collection<Property> = Collection::new(transport.clone());
    transport.push_json(
      200,
      json!({"properties": {"content": [
        {"propertyId": 8, "title": "Studio", "propertyType": {"name": "Studio"}},
        {"propertyId": 9, "title": "Terrain", "propertyType": {"name": "Terrain"}}
      ], "totalElements": 2}}),
    );
    collection
      .load_all(&ListParams::default().page(0).size(20))
      .await
      .unwrap();

    transport.push_json(200, json!({"propertyId": 9, "title": "Terrain 500m²"}));
    let property = collection.load_one(9).await.unwrap();

    let snapshot = collection.snapshot();
    assert_eq!(property.title, "Terrain 500m²");
    assert_eq!(snapshot.items[1].title, "Terrain 500m²");
    assert_eq!(transport.requests()[1].path, "/api/property/9");
  }
}
