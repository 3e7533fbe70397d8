//! Match and unmatch endpoints.
//!
//! Both hold the newbee's lock for the whole workflow, so two requests for
//! the same newbee never interleave their CRM calls.

use axum::{
  Json,
  extract::{Query, State},
  http::StatusCode,
};
use mentor_core::{
  crm::CrmConnector,
  session::SessionStore,
  workflow::{self, UnmatchOutcome},
};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{AppState, context::CrmContext, error::ApiError, handlers::required};

#[derive(Deserialize)]
pub struct PairParams {
  newbee: Option<String>,
  mentor: Option<String>,
}

impl PairParams {
  fn into_pair(self) -> Result<(String, String), ApiError> {
    Ok((required(self.newbee, "newbee")?, required(self.mentor, "mentor")?))
  }
}

/// `POST /match?newbee=&mentor=`: 201 with the new relationship id.
pub async fn match_pair<C, S>(
  State(state): State<AppState<C, S>>,
  ctx: CrmContext<C>,
  Query(params): Query<PairParams>,
) -> Result<(StatusCode, Json<Value>), ApiError>
where
  C: CrmConnector,
  S: SessionStore,
{
  let (newbee, mentor) = params.into_pair()?;

  let _guard = state.locks.lock(&newbee).await;
  let id = workflow::match_contacts(&ctx.client, &state.settings, &newbee, &mentor).await?;

  Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}

/// `POST|GET /unmatch?newbee=&mentor=`
pub async fn unmatch_pair<C, S>(
  State(state): State<AppState<C, S>>,
  ctx: CrmContext<C>,
  Query(params): Query<PairParams>,
) -> Result<Json<UnmatchOutcome>, ApiError>
where
  C: CrmConnector,
  S: SessionStore,
{
  let (newbee, mentor) = params.into_pair()?;

  let _guard = state.locks.lock(&newbee).await;
  let outcome = workflow::unmatch_contacts(&ctx.client, &state.settings, &newbee, &mentor).await?;

  Ok(Json(outcome))
}
