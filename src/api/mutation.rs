//! Mutation requests and the dual-encoding request builder.
//!
//! A mutation with no attachments goes out as JSON with its natural verb.
//! Once a binary attachment is present the body switches to multipart and
//! the verb to POST, because the backend only decodes multipart over POST.
//! The logical verb then travels in a `_method` text part.

use reqwest::Method;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::client::{FormPart, RequestBody, RequestDescriptor};

/// Text part telling the backend which verb the request stands for.
pub const METHOD_OVERRIDE_FIELD: &str = "_method";

/// A single field value in a mutation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
  Text(String),
  Integer(i64),
  Number(f64),
  Bool(bool),
  List(Vec<String>),
}

impl FieldValue {
  /// Text form used for multipart scalar parts.
  fn to_form_text(&self) -> String {
    match self {
      FieldValue::Text(s) => s.clone(),
      FieldValue::Integer(n) => n.to_string(),
      FieldValue::Number(n) => n.to_string(),
      FieldValue::Bool(b) => b.to_string(),
      FieldValue::List(items) => Value::from(items.clone()).to_string(),
    }
  }
}

impl From<&str> for FieldValue {
  fn from(s: &str) -> Self {
    FieldValue::Text(s.to_string())
  }
}

impl From<String> for FieldValue {
  fn from(s: String) -> Self {
    FieldValue::Text(s)
  }
}

impl From<i64> for FieldValue {
  fn from(n: i64) -> Self {
    FieldValue::Integer(n)
  }
}

impl From<f64> for FieldValue {
  fn from(n: f64) -> Self {
    FieldValue::Number(n)
  }
}

impl From<bool> for FieldValue {
  fn from(b: bool) -> Self {
    FieldValue::Bool(b)
  }
}

impl From<Vec<String>> for FieldValue {
  fn from(items: Vec<String>) -> Self {
    FieldValue::List(items)
  }
}

/// Raw file data sent alongside text fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
  pub file_name: String,
  pub content_type: Option<String>,
  pub bytes: Vec<u8>,
}

impl Attachment {
  pub fn new(file_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
    Self {
      file_name: file_name.into(),
      content_type: None,
      bytes: bytes.into(),
    }
  }

  pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
    self.content_type = Some(content_type.into());
    self
  }
}

/// A partial update or a creation payload.
///
/// Only fields explicitly set are sent; nothing is defaulted to null.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MutationRequest {
  pub fields: BTreeMap<String, FieldValue>,
  pub attachments: BTreeMap<String, Attachment>,
}

impl MutationRequest {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
    self.fields.insert(name.into(), value.into());
    self
  }

  pub fn attach(mut self, name: impl Into<String>, attachment: Attachment) -> Self {
    self.attachments.insert(name.into(), attachment);
    self
  }

  pub fn has_attachments(&self) -> bool {
    !self.attachments.is_empty()
  }
}

/// The logical operation a mutation performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
  Create,
  Update,
}

impl MutationKind {
  /// The verb the backend should treat the request as.
  pub fn method(self) -> Method {
    match self {
      MutationKind::Create => Method::POST,
      MutationKind::Update => Method::PUT,
    }
  }
}

/// Builds request descriptors for mutations.
#[derive(Debug, Clone, Copy, Default)]
pub struct MutationBuilder;

impl MutationBuilder {
  /// Build the request for `kind` against `path`, consuming the mutation.
  pub fn build(kind: MutationKind, path: &str, request: MutationRequest) -> RequestDescriptor {
    let logical = kind.method();

    if !request.has_attachments() {
      let body: Map<String, Value> = request
        .fields
        .into_iter()
        .map(|(name, value)| (name, to_json(value)))
        .collect();

      return RequestDescriptor {
        method: logical,
        path: path.to_string(),
        query: Vec::new(),
        body: RequestBody::Json(Value::Object(body)),
      };
    }

    let mut parts = Vec::new();
    if logical != Method::POST {
      parts.push(FormPart::text(METHOD_OVERRIDE_FIELD, logical.as_str()));
    }

    for (name, value) in request.fields {
      match value {
        FieldValue::List(items) => {
          // Indexed parts for bracket-array decoders, plus a JSON copy for
          // backends that decode the `_json` form instead.
          let json = Value::from(items.clone()).to_string();
          for (index, item) in items.into_iter().enumerate() {
            parts.push(FormPart::text(format!("{}[{}]", name, index), item));
          }
          parts.push(FormPart::text(format!("{}_json", name), json));
        }
        scalar => parts.push(FormPart::text(name, scalar.to_form_text())),
      }
    }

    for (name, attachment) in request.attachments {
      parts.push(FormPart::file(name, attachment));
    }

    RequestDescriptor {
      method: Method::POST,
      path: path.to_string(),
      query: Vec::new(),
      body: RequestBody::Multipart(parts),
    }
  }
}

fn to_json(value: FieldValue) -> Value {
  // Untagged serialization of these variants cannot fail.
  serde_json::to_value(value).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::client::{Encoding, PartValue};
  use serde_json::json;

  fn part_names(descriptor: &RequestDescriptor) -> Vec<&str> {
    match &descriptor.body {
      RequestBody::Multipart(parts) => parts.iter().map(|p| p.name.as_str()).collect(),
      _ => Vec::new(),
    }
  }

  #[test]
  fn test_update_without_attachments_is_json_put() {
    let request = MutationRequest::new()
      .field("title", "New")
      .field("featured", true);
    let descriptor = MutationBuilder::build(MutationKind::Update, "/api/actualities/42", request);

    assert_eq!(descriptor.method, Method::PUT);
    assert_eq!(descriptor.encoding(), Encoding::Json);
    assert_eq!(
      descriptor.body,
      RequestBody::Json(json!({"title": "New", "featured": true}))
    );
  }

  #[test]
  fn test_json_body_only_contains_present_fields() {
    let request = MutationRequest::new().field("read_time", 7i64);
    let descriptor = MutationBuilder::build(MutationKind::Update, "/x", request);
    assert_eq!(descriptor.body, RequestBody::Json(json!({"read_time": 7})));
  }

  #[test]
  fn test_create_without_attachments_is_json_post() {
    let request = MutationRequest::new().field("title", "Fresh");
    let descriptor = MutationBuilder::build(MutationKind::Create, "/api/actualities", request);
    assert_eq!(descriptor.method, Method::POST);
    assert_eq!(descriptor.encoding(), Encoding::Json);
  }

  #[test]
  fn test_update_with_attachment_tunnels_put_over_post() {
    let request = MutationRequest::new()
      .field("title", "New")
      .attach("image", Attachment::new("cover.png", vec![1u8, 2, 3]).with_content_type("image/png"));
    let descriptor = MutationBuilder::build(MutationKind::Update, "/api/actualities/42", request);

    assert_eq!(descriptor.method, Method::POST);
    assert_eq!(descriptor.encoding(), Encoding::Multipart);
    assert_eq!(descriptor.text_part(METHOD_OVERRIDE_FIELD), Some("PUT"));
    assert_eq!(part_names(&descriptor)[0], METHOD_OVERRIDE_FIELD);
    assert_eq!(descriptor.text_part("title"), Some("New"));

    let RequestBody::Multipart(parts) = &descriptor.body else {
      panic!("expected multipart");
    };
    let image = parts.iter().find(|p| p.name == "image").unwrap();
    match &image.value {
      PartValue::File(file) => {
        assert_eq!(file.file_name, "cover.png");
        assert_eq!(file.bytes, vec![1u8, 2, 3]);
        assert_eq!(file.content_type.as_deref(), Some("image/png"));
      }
      other => panic!("unexpected {:?}", other),
    }
  }

  #[test]
  fn test_create_with_attachment_has_no_override() {
    let request = MutationRequest::new()
      .field("title", "Fresh")
      .attach("image", Attachment::new("a.jpg", vec![0u8]));
    let descriptor = MutationBuilder::build(MutationKind::Create, "/api/actualities", request);

    assert_eq!(descriptor.method, Method::POST);
    assert_eq!(descriptor.text_part(METHOD_OVERRIDE_FIELD), None);
  }

  #[test]
  fn test_lists_are_indexed_and_duplicated_as_json() {
    let request = MutationRequest::new()
      .field("tags", vec!["a".to_string(), "b".to_string()])
      .field("read_time", 5i64)
      .field("featured", false)
      .attach("image", Attachment::new("a.jpg", vec![0u8]));
    let descriptor = MutationBuilder::build(MutationKind::Update, "/x", request);

    assert_eq!(descriptor.text_part("tags[0]"), Some("a"));
    assert_eq!(descriptor.text_part("tags[1]"), Some("b"));
    assert_eq!(descriptor.text_part("tags_json"), Some(r#"["a","b"]"#));
    assert_eq!(descriptor.text_part("read_time"), Some("5"));
    assert_eq!(descriptor.text_part("featured"), Some("false"));
  }

  #[test]
  fn test_empty_list_still_sends_json_copy() {
    let request = MutationRequest::new()
      .field("tags", Vec::<String>::new())
      .attach("image", Attachment::new("a.jpg", vec![0u8]));
    let descriptor = MutationBuilder::build(MutationKind::Update, "/x", request);

    assert_eq!(descriptor.text_part("tags_json"), Some("[]"));
    assert!(!part_names(&descriptor).contains(&"tags[0]"));
  }
}
