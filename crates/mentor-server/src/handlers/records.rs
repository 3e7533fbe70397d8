//! Read-only CRM endpoints: raw SOQL, the fixed listings and the
//! left/right report.

use axum::{
  Json,
  extract::{Query, State},
};
use mentor_core::{
  contact::{Contact, Relationship},
  crm::{CrmClient, CrmConnector, QueryResult},
  report::{self, LeftRightData},
  session::SessionStore,
  soql,
};
use serde::Deserialize;
use tracing::debug;

use crate::{AppState, context::CrmContext, error::ApiError, handlers::required};

#[derive(Deserialize)]
pub struct QueryParams {
  q: Option<String>,
}

/// `GET /query?q=`: run the caller's SOQL verbatim.
pub async fn query<C: CrmConnector>(
  ctx: CrmContext<C>,
  Query(params): Query<QueryParams>,
) -> Result<Json<QueryResult>, ApiError> {
  let soql = required(params.q, "q")?;
  Ok(Json(ctx.client.query(&soql).await?))
}

/// `GET /contacts`
pub async fn contacts<C: CrmConnector>(ctx: CrmContext<C>) -> Result<Json<QueryResult>, ApiError> {
  let soql = soql::select(Contact::OBJECT, Contact::FIELDS, None);
  Ok(Json(ctx.client.query(&soql).await?))
}

/// `GET /relationships`
pub async fn relationships<C, S>(
  State(state): State<AppState<C, S>>,
  ctx: CrmContext<C>,
) -> Result<Json<QueryResult>, ApiError>
where
  C: CrmConnector,
  S: SessionStore,
{
  let schema = &state.settings.relationship;
  let soql = soql::select(&schema.object, &schema.fields(), None);
  Ok(Json(ctx.client.query(&soql).await?))
}

/// `GET /leftRightData`: contacts, then relationships, joined into the
/// newbee and mentor tables.
pub async fn left_right_data<C, S>(
  State(state): State<AppState<C, S>>,
  ctx: CrmContext<C>,
) -> Result<Json<LeftRightData>, ApiError>
where
  C: CrmConnector,
  S: SessionStore,
{
  let schema = &state.settings.relationship;

  let contacts = ctx
    .client
    .query(&soql::select(Contact::OBJECT, Contact::FIELDS, None))
    .await?
    .records
    .iter()
    .map(Contact::from_record)
    .collect::<Result<Vec<_>, _>>()?;

  let relationships = ctx
    .client
    .query(&soql::select(&schema.object, &schema.fields(), None))
    .await?
    .records
    .iter()
    .map(|r| Relationship::from_record(r, schema))
    .collect::<Result<Vec<_>, _>>()?;

  debug!(
    contacts = contacts.len(),
    relationships = relationships.len(),
    "building left/right tables"
  );
  Ok(Json(report::left_right(&contacts, &relationships, &state.settings)))
}
