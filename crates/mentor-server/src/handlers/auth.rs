//! OAuth login, callback, logout and identity.

use axum::{
  Json,
  extract::{Query, State},
  http::{HeaderMap, header},
  response::{AppendHeaders, IntoResponse, Redirect},
};
use mentor_core::{
  contact::Record,
  crm::{CrmClient, CrmConnector},
  session::SessionStore,
};
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{AppState, context::CrmContext, cookie, error::ApiError, handlers::required};

#[derive(Deserialize)]
pub struct CallbackParams {
  code:  Option<String>,
  state: Option<String>,
}

/// `GET /auth/login`: send the browser to the CRM's authorize page.
pub async fn login<C, S>(State(state): State<AppState<C, S>>) -> Result<impl IntoResponse, ApiError>
where
  C: CrmConnector,
  S: SessionStore,
{
  let nonce = Uuid::new_v4().to_string();
  let url = state.connector.authorization_url(&nonce)?;

  Ok((
    AppendHeaders([(header::SET_COOKIE, cookie::state(&state.config.session, &nonce))]),
    Redirect::to(&url),
  ))
}

/// `GET /auth/callback?code=&state=`: finish the login and open a session.
pub async fn callback<C, S>(
  State(state): State<AppState<C, S>>,
  headers: HeaderMap,
  Query(params): Query<CallbackParams>,
) -> Result<impl IntoResponse, ApiError>
where
  C: CrmConnector,
  S: SessionStore,
{
  let code = required(params.code, "code")?;

  let session_config = &state.config.session;
  let expected = cookie::read(&headers, &session_config.state_cookie_name());
  if expected.is_none() || expected != params.state {
    warn!("OAuth state missing or mismatched");
    return Err(ApiError::Unauthenticated);
  }

  let auth = state.connector.exchange_code(&code).await?;
  let id = state
    .sessions
    .create(auth)
    .await
    .map_err(ApiError::session)?;
  info!("session opened");

  Ok((
    AppendHeaders([
      (header::SET_COOKIE, cookie::session(session_config, id.as_str())),
      (header::SET_COOKIE, cookie::clear_state(session_config)),
    ]),
    Redirect::to(&state.config.app.post_login_redirect),
  ))
}

/// `GET /auth/logout`: revoke the token, then drop the session.
///
/// A failed revoke leaves the session in place.
pub async fn logout<C, S>(
  State(state): State<AppState<C, S>>,
  ctx: CrmContext<C>,
) -> Result<impl IntoResponse, ApiError>
where
  C: CrmConnector,
  S: SessionStore,
{
  state.connector.revoke(&ctx.auth).await?;
  state
    .sessions
    .destroy(&ctx.session)
    .await
    .map_err(ApiError::session)?;
  info!("session closed");

  Ok((
    AppendHeaders([(header::SET_COOKIE, cookie::clear_session(&state.config.session))]),
    Redirect::to(&state.config.app.post_login_redirect),
  ))
}

/// `GET /auth/whoami`
pub async fn whoami<C: CrmConnector>(ctx: CrmContext<C>) -> Result<Json<Record>, ApiError> {
  Ok(Json(ctx.client.identity().await?))
}
