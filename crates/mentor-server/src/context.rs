//! The per-request CRM context extractor.

use axum::{extract::FromRequestParts, http::request::Parts};
use mentor_core::{
  crm::{CrmAuth, CrmConnector},
  session::{SessionId, SessionStore},
};
use tracing::debug;

use crate::{AppState, cookie, error::ApiError};

/// A CRM client for the caller's session.
///
/// Extracting it resolves the session cookie and builds the client once per
/// request. Requests without a live session are rejected with
/// [`ApiError::Unauthenticated`] before the handler runs, so no CRM call is
/// ever made on their behalf.
pub struct CrmContext<C: CrmConnector> {
  pub client:  C::Client,
  pub auth:    CrmAuth,
  pub session: SessionId,
}

impl<C, S> FromRequestParts<AppState<C, S>> for CrmContext<C>
where
  C: CrmConnector,
  S: SessionStore,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<C, S>,
  ) -> Result<Self, Self::Rejection> {
    let session = cookie::read(&parts.headers, &state.config.session.cookie_name)
      .map(SessionId::from)
      .ok_or(ApiError::Unauthenticated)?;

    let Some(auth) = state
      .sessions
      .resolve(&session)
      .await
      .map_err(ApiError::session)?
    else {
      debug!("session cookie did not resolve");
      return Err(ApiError::Unauthenticated);
    };

    Ok(CrmContext {
      client: state.connector.connect(&auth),
      auth,
      session,
    })
  }
}
