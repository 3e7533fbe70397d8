//! API error type and [`axum::response::IntoResponse`] implementation.
//!
//! Every failure reaches the client as `{ "error": .., "kind": .. }`.
//! Upstream failures are logged in full here and reported to the client
//! only by kind.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use mentor_core::{crm::CrmError, workflow::MatchError};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// An error returned by a handler or extractor.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("no active session")]
  Unauthenticated,

  #[error("missing required parameter `{0}`")]
  MissingParameter(&'static str),

  #[error(transparent)]
  Match(#[from] MatchError),

  #[error(transparent)]
  Crm(#[from] CrmError),

  #[error("session store error: {0}")]
  Session(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl From<mentor_core::Error> for ApiError {
  fn from(e: mentor_core::Error) -> Self { ApiError::Crm(e.into()) }
}

impl ApiError {
  pub fn session(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    ApiError::Session(Box::new(e))
  }

  /// The CRM error underneath, if any.
  fn crm(&self) -> Option<&CrmError> {
    match self {
      ApiError::Crm(e) | ApiError::Match(MatchError::Crm(e)) => Some(e),
      _ => None,
    }
  }

  fn classify(&self) -> (StatusCode, &'static str) {
    match self {
      ApiError::Unauthenticated => (StatusCode::UNAUTHORIZED, "Unauthenticated"),
      ApiError::MissingParameter(_) => (StatusCode::BAD_REQUEST, "MissingParameter"),
      ApiError::Match(MatchError::InvalidNewbee(_)) => (StatusCode::NOT_ACCEPTABLE, "InvalidNewbee"),
      ApiError::Match(MatchError::InvalidMentor(_)) => (StatusCode::NOT_ACCEPTABLE, "InvalidMentor"),
      ApiError::Match(MatchError::AlreadyMatched(_)) => {
        (StatusCode::NOT_ACCEPTABLE, "AlreadyMatched")
      }
      ApiError::Match(MatchError::NoMatchFound { .. }) => {
        (StatusCode::NOT_ACCEPTABLE, "NoMatchFound")
      }
      ApiError::Crm(e) | ApiError::Match(MatchError::Crm(e)) => match e {
        CrmError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthenticated"),
        CrmError::Timeout => (StatusCode::GATEWAY_TIMEOUT, "Timeout"),
        _ => (StatusCode::BAD_GATEWAY, "UpstreamError"),
      },
      ApiError::Session(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Internal"),
    }
  }

  /// Machine-readable error kind sent to the client.
  pub fn kind(&self) -> &'static str { self.classify().1 }

  pub fn status(&self) -> StatusCode { self.classify().0 }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    let message = match (&self, self.crm()) {
      (_, Some(CrmError::Unauthorized)) => "CRM session expired or revoked".to_string(),
      (_, Some(CrmError::Timeout)) => {
        error!(error = %self, "CRM call timed out");
        "CRM call timed out".to_string()
      }
      (_, Some(e)) => {
        error!(error = %e, "CRM call failed");
        "CRM call failed".to_string()
      }
      (ApiError::Session(e), None) => {
        error!(error = %e, "session store failed");
        "internal error".to_string()
      }
      (e, None) => e.to_string(),
    };
    (status, Json(json!({ "error": message, "kind": self.kind() }))).into_response()
  }
}
