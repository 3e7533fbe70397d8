//! Conversions between domain timestamps and SQLite column values.
//!
//! Timestamps are stored as integer unix milliseconds so that range
//! comparisons in SQL are numeric.

use chrono::{DateTime, Utc};

use crate::{Error, Result};

pub fn encode_dt(dt: DateTime<Utc>) -> i64 { dt.timestamp_millis() }

pub fn decode_dt(ms: i64) -> Result<DateTime<Utc>> {
  DateTime::from_timestamp_millis(ms).ok_or(Error::DateRange(ms))
}
