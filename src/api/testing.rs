//! Scripted transport for tests.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use crate::error::{SyncError, SyncResult};

use super::client::{RequestDescriptor, Response, Transport};

struct Reply {
  result: SyncResult<Response>,
  gate: Option<Arc<Notify>>,
}

/// Answers requests from a queue of canned replies and records every request.
#[derive(Default)]
pub struct ScriptedTransport {
  replies: Mutex<VecDeque<Reply>>,
  requests: Mutex<Vec<RequestDescriptor>>,
}

impl ScriptedTransport {
  pub fn new() -> Arc<Self> {
    Arc::new(Self::default())
  }

  pub fn push(&self, result: SyncResult<Response>) {
    self.replies.lock().unwrap().push_back(Reply { result, gate: None });
  }

  pub fn push_json(&self, status: u16, body: Value) {
    self.push(Ok(Response::json_body(status, &body)));
  }

  /// Queue a reply that is only delivered after `gate` is notified.
  pub fn push_gated(&self, gate: Arc<Notify>, status: u16, body: Value) {
    self.replies.lock().unwrap().push_back(Reply {
      result: Ok(Response::json_body(status, &body)),
      gate: Some(gate),
    });
  }

  pub fn push_failure(&self) {
    self.push(Err(SyncError::Transport("connection refused".to_string())));
  }

  pub fn calls(&self) -> usize {
    self.requests.lock().unwrap().len()
  }

  pub fn requests(&self) -> Vec<RequestDescriptor> {
    self.requests.lock().unwrap().clone()
  }
}

#[async_trait]
impl Transport for ScriptedTransport {
  async fn send(&self, request: RequestDescriptor) -> SyncResult<Response> {
    self.requests.lock().unwrap().push(request);
    let reply = self
      .replies
      .lock()
      .unwrap()
      .pop_front()
      .unwrap_or_else(|| Reply {
        result: Err(SyncError::Transport("no scripted reply".to_string())),
        gate: None,
      });

    if let Some(gate) = reply.gate {
      gate.notified().await;
    }
    reply.result
  }
}
