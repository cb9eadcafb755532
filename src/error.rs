//! Error taxonomy for the synchronization layer.

use thiserror::Error;

/// Errors surfaced to callers of the cache and collection operations.
///
/// Durable-storage corruption never shows up here: it is absorbed as a
/// cache miss. `Storage` is only returned when the store itself cannot
/// be opened or written and no fallback applies.
#[derive(Debug, Error)]
pub enum SyncError {
  /// The request never produced a response (connection, timeout, body read).
  #[error("request failed: {0}")]
  Transport(String),

  /// The server answered with a non-success status code.
  #[error("server returned {status}: {message}")]
  Status { status: u16, message: String },

  /// The response body lacked the expected envelope or was not JSON.
  #[error("malformed response: {0}")]
  MalformedResponse(String),

  #[error("storage error: {0}")]
  Storage(String),

  #[error("configuration error: {0}")]
  Config(String),
}

impl SyncError {
  /// Whether this failure came from the network round-trip (as opposed
  /// to local storage or configuration).
  pub fn is_fetch_failure(&self) -> bool {
    matches!(
      self,
      SyncError::Transport(_) | SyncError::Status { .. } | SyncError::MalformedResponse(_)
    )
  }
}

impl From<reqwest::Error> for SyncError {
  fn from(err: reqwest::Error) -> Self {
    SyncError::Transport(err.to_string())
  }
}

impl From<color_eyre::Report> for SyncError {
  fn from(err: color_eyre::Report) -> Self {
    SyncError::Storage(err.to_string())
  }
}

pub type SyncResult<T> = std::result::Result<T, SyncError>;
