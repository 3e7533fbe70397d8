//! Error type for `mentor-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("date/time out of range: {0}")]
  DateRange(i64),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
