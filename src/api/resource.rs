//! Bindings between domain records and their backend endpoints.

use serde_json::Value;

use crate::error::{SyncError, SyncResult};

use super::api_types::{ApiEnvelope, ApiPropertiesResponse};
use super::types::{Article, Property};

/// A domain record that can be listed, fetched and mutated on the backend.
///
/// Implementors describe where their collection lives and how the
/// backend wraps records; normalization turns each raw record into `Self`.
pub trait Resource: Clone + Send + Sync + 'static {
  /// Collection endpoint (e.g. "/api/property")
  const PATH: &'static str;

  /// Human-readable name for logs
  const NAME: &'static str;

  fn id(&self) -> u64;

  fn normalize(raw: &Value) -> Self;

  /// Extract the raw records from a list response.
  fn unwrap_list(body: Value) -> SyncResult<Vec<Value>>;

  /// Extract the raw record from a single-record or mutation response.
  fn unwrap_one(body: Value) -> SyncResult<Value>;

  fn item_path(id: u64) -> String {
    format!("{}/{}", Self::PATH, id)
  }
}

// ============================================================================
// Envelope helpers
// ============================================================================

/// Open a `{ success: true, data }` envelope.
fn open_envelope(body: Value) -> SyncResult<Value> {
  let envelope: ApiEnvelope = serde_json::from_value(body)
    .map_err(|_| SyncError::MalformedResponse("expected an object envelope".to_string()))?;

  if envelope.success != Some(true) {
    return Err(SyncError::MalformedResponse(
      envelope
        .message
        .unwrap_or_else(|| "success flag missing or false".to_string()),
    ));
  }

  envelope
    .data
    .filter(|data| !data.is_null())
    .ok_or_else(|| SyncError::MalformedResponse("envelope has no data".to_string()))
}

fn require_object(body: Value) -> SyncResult<Value> {
  if body.is_object() {
    Ok(body)
  } else {
    Err(SyncError::MalformedResponse(
      "expected a record object".to_string(),
    ))
  }
}

// ============================================================================
// Resource implementations
// ============================================================================

impl Resource for Property {
  const PATH: &'static str = "/api/property";
  const NAME: &'static str = "property";

  fn id(&self) -> u64 {
    self.id
  }

  fn normalize(raw: &Value) -> Self {
    Property::normalize(raw)
  }

  fn unwrap_list(body: Value) -> SyncResult<Vec<Value>> {
    let response: ApiPropertiesResponse = serde_json::from_value(body)
      .map_err(|e| SyncError::MalformedResponse(format!("expected a properties page: {}", e)))?;
    tracing::debug!(
      total = ?response.properties.total_elements,
      page_len = response.properties.content.len(),
      "unwrapped properties page"
    );
    Ok(response.properties.content)
  }

  fn unwrap_one(body: Value) -> SyncResult<Value> {
    require_object(body)
  }
}

impl Resource for Article {
  const PATH: &'static str = "/api/actualities";
  const NAME: &'static str = "article";

  fn id(&self) -> u64 {
    self.id
  }

  fn normalize(raw: &Value) -> Self {
    Article::normalize(raw)
  }

  fn unwrap_list(body: Value) -> SyncResult<Vec<Value>> {
    match open_envelope(body)? {
      Value::Array(items) => Ok(items),
      single @ Value::Object(_) => Ok(vec![single]),
      _ => Err(SyncError::MalformedResponse(
        "article list data is neither a list nor a record".to_string(),
      )),
    }
  }

  fn unwrap_one(body: Value) -> SyncResult<Value> {
    require_object(open_envelope(body)?)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_property_page_unwrap() {
    let body = json!({"properties": {"content": [{"propertyId": 1}, {"propertyId": 2}], "totalElements": 2}});
    assert_eq!(Property::unwrap_list(body).unwrap().len(), 2);
  }

  #[test]
  fn test_property_page_missing_is_malformed() {
    assert!(matches!(
      Property::unwrap_list(json!({"content": []})),
      Err(SyncError::MalformedResponse(_))
    ));
  }

  #[test]
  fn test_article_single_object_list() {
    let body = json!({"success": true, "data": {"id": 3}});
    assert_eq!(Article::unwrap_list(body).unwrap(), vec![json!({"id": 3})]);
  }

  #[test]
  fn test_article_envelope_requires_success() {
    let body = json!({"success": false, "message": "nope", "data": {"id": 3}});
    match Article::unwrap_one(body) {
      Err(SyncError::MalformedResponse(message)) => assert_eq!(message, "nope"),
      other => panic!("unexpected {:?}", other),
    }

    assert!(Article::unwrap_one(json!({"id": 3})).is_err());
    assert!(Article::unwrap_one(json!({"success": true, "data": null})).is_err());
    assert!(Article::unwrap_one(json!({"success": true, "data": [1]})).is_err());
  }

  #[test]
  fn test_item_path() {
    assert_eq!(Article::item_path(42), "/api/actualities/42");
    assert_eq!(Property::item_path(7), "/api/property/7");
  }
}
