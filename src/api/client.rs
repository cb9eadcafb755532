//! Network transport: request descriptors, responses, and the reqwest-backed client.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CACHE_CONTROL, CONTENT_TYPE, PRAGMA};
use reqwest::Method;
use serde_json::Value;
use std::time::Duration;
use url::Url;

use crate::error::{SyncError, SyncResult};

use super::mutation::Attachment;

/// How a request body is encoded on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
  None,
  Json,
  Multipart,
}

/// One part of a multipart body.
#[derive(Debug, Clone, PartialEq)]
pub struct FormPart {
  pub name: String,
  pub value: PartValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PartValue {
  Text(String),
  File(Attachment),
}

impl FormPart {
  pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      value: PartValue::Text(value.into()),
    }
  }

  pub fn file(name: impl Into<String>, attachment: Attachment) -> Self {
    Self {
      name: name.into(),
      value: PartValue::File(attachment),
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
  Empty,
  Json(Value),
  Multipart(Vec<FormPart>),
}

/// A transport-independent description of one HTTP request.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
  pub method: Method,
  /// Path relative to the configured base URL (e.g. `/api/property/3`)
  pub path: String,
  pub query: Vec<(String, String)>,
  pub body: RequestBody,
}

impl RequestDescriptor {
  pub fn get(path: impl Into<String>) -> Self {
    Self {
      method: Method::GET,
      path: path.into(),
      query: Vec::new(),
      body: RequestBody::Empty,
    }
  }

  pub fn with_query(mut self, query: Vec<(String, String)>) -> Self {
    self.query = query;
    self
  }

  pub fn encoding(&self) -> Encoding {
    match self.body {
      RequestBody::Empty => Encoding::None,
      RequestBody::Json(_) => Encoding::Json,
      RequestBody::Multipart(_) => Encoding::Multipart,
    }
  }

  /// Look up a text part by name. Only meaningful for multipart bodies.
  pub fn text_part(&self, name: &str) -> Option<&str> {
    match &self.body {
      RequestBody::Multipart(parts) => parts.iter().find_map(|p| match &p.value {
        PartValue::Text(text) if p.name == name => Some(text.as_str()),
        _ => None,
      }),
      _ => None,
    }
  }
}

/// A completed HTTP exchange.
#[derive(Debug, Clone)]
pub struct Response {
  pub status: u16,
  pub body: Vec<u8>,
}

impl Response {
  pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
    Self {
      status,
      body: body.into(),
    }
  }

  /// Shorthand for a response with a JSON body.
  pub fn json_body(status: u16, body: &Value) -> Self {
    Self::new(status, body.to_string())
  }

  pub fn is_success(&self) -> bool {
    (200..300).contains(&self.status)
  }

  pub fn json(&self) -> SyncResult<Value> {
    serde_json::from_slice(&self.body)
      .map_err(|e| SyncError::MalformedResponse(format!("body is not JSON: {}", e)))
  }

  /// Parse the body of a successful response, or turn a failed one into
  /// `SyncError::Status` carrying the server's `message` when it sent one.
  pub fn into_success(self) -> SyncResult<Value> {
    if self.is_success() {
      return self.json();
    }

    let message = serde_json::from_slice::<Value>(&self.body)
      .ok()
      .and_then(|v| v.get("message").and_then(Value::as_str).map(String::from))
      .unwrap_or_else(|| format!("HTTP {}", self.status));

    Err(SyncError::Status {
      status: self.status,
      message,
    })
  }
}

/// The network-call primitive used by every operation in this crate.
#[async_trait]
pub trait Transport: Send + Sync {
  async fn send(&self, request: RequestDescriptor) -> SyncResult<Response>;
}

/// reqwest-backed transport. Response caching is disabled on every request.
#[derive(Clone)]
pub struct HttpTransport {
  client: reqwest::Client,
  base_url: Url,
}

impl HttpTransport {
  pub fn new(base_url: &str, timeout: Duration) -> SyncResult<Self> {
    let mut base_url =
      Url::parse(base_url).map_err(|e| SyncError::Config(format!("invalid base url: {}", e)))?;
    if !base_url.path().ends_with('/') {
      let path = format!("{}/", base_url.path());
      base_url.set_path(&path);
    }

    let client = reqwest::Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| SyncError::Config(format!("failed to build http client: {}", e)))?;

    Ok(Self { client, base_url })
  }

  fn url_for(&self, path: &str) -> SyncResult<Url> {
    self
      .base_url
      .join(path.trim_start_matches('/'))
      .map_err(|e| SyncError::Config(format!("invalid request path {}: {}", path, e)))
  }

  /// Assemble the wire request. Every request opts out of response caching.
  fn build_request(&self, request: RequestDescriptor) -> SyncResult<reqwest::Request> {
    let url = self.url_for(&request.path)?;

    let mut headers = HeaderMap::new();
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store, no-cache"));
    headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));

    let mut builder = self.client.request(request.method, url).headers(headers);
    if !request.query.is_empty() {
      builder = builder.query(&request.query);
    }
    builder = match request.body {
      RequestBody::Empty => builder,
      RequestBody::Json(value) => builder
        .header(CONTENT_TYPE, "application/json")
        .body(value.to_string()),
      RequestBody::Multipart(parts) => builder.multipart(build_form(parts)?),
    };

    Ok(builder.build()?)
  }
}

fn build_form(parts: Vec<FormPart>) -> SyncResult<reqwest::multipart::Form> {
  let mut form = reqwest::multipart::Form::new();
  for part in parts {
    form = match part.value {
      PartValue::Text(text) => form.text(part.name, text),
      PartValue::File(attachment) => {
        let mut file = reqwest::multipart::Part::bytes(attachment.bytes)
          .file_name(attachment.file_name);
        if let Some(content_type) = attachment.content_type {
          file = file.mime_str(&content_type)?;
        }
        form.part(part.name, file)
      }
    };
  }
  Ok(form)
}

#[async_trait]
impl Transport for HttpTransport {
  async fn send(&self, request: RequestDescriptor) -> SyncResult<Response> {
    let encoding = request.encoding();
    let request = self.build_request(request)?;
    tracing::debug!(method = %request.method(), url = %request.url(), ?encoding, "sending request");

    let response = self.client.execute(request).await?;
    let status = response.status().as_u16();
    let body = response.bytes().await?.to_vec();
    tracing::debug!(status, bytes = body.len(), "received response");

    Ok(Response::new(status, body))
  }
}
