pub mod auth;
pub mod matching;
pub mod records;

use crate::error::ApiError;

/// Liveness text.
pub async fn root() -> &'static str { "You have reached the Match backend!" }

/// A query parameter that must be present and non-blank.
pub(super) fn required(value: Option<String>, name: &'static str) -> Result<String, ApiError> {
  value
    .map(|v| v.trim().to_owned())
    .filter(|v| !v.is_empty())
    .ok_or(ApiError::MissingParameter(name))
}
