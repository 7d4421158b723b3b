//! Error types for the upstream feed client.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("upstream returned {status} for {url}")]
  Status { status: u16, url: String },

  #[error("not found: {0}")]
  NotFound(String),

  #[error("request timed out: {0}")]
  Timeout(String),

  #[error("malformed payload: {0}")]
  Json(#[from] serde_json::Error),
}

impl Error {
  /// Whether another attempt could plausibly succeed.
  pub fn is_transient(&self) -> bool {
    match self {
      Self::Timeout(_) => true,
      Self::Http(e) => e.is_connect() || e.is_timeout() || e.is_request(),
      Self::Status { status, .. } => *status >= 500 || *status == 429,
      Self::NotFound(_) | Self::Json(_) => false,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
