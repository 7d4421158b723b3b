//! Error type for `tulos-ingest`.

use thiserror::Error;
use tulos_core::model::CompetitionId;

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Core(#[from] tulos_core::Error),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("upstream error: {0}")]
  Source(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("competition {0} does not exist upstream")]
  CompetitionNotFound(CompetitionId),

  #[error("post-ingest command failed: {0}")]
  Hook(String),
}

impl Error {
  pub fn store(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Store(Box::new(e))
  }

  pub fn upstream(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Source(Box::new(e))
  }

  /// Whether retrying the same competition could change the outcome.
  pub fn is_retryable(&self) -> bool {
    !matches!(self, Self::CompetitionNotFound(_) | Self::Core(_))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
