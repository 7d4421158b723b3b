//! Error types for `tulos-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid competition id range: {from}..={to}")]
  InvalidRange { from: i64, to: i64 },

  #[error("unknown gender code: {0:?}")]
  UnknownGender(String),

  #[error("invalid date: {0:?}")]
  InvalidDate(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
