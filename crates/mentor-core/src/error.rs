//! Error types for `mentor-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("record is missing field {0:?}")]
  MissingField(String),

  #[error("record field {field:?} is not a string")]
  NotAString { field: String },

  #[error("record decode error: {0}")]
  Decode(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
