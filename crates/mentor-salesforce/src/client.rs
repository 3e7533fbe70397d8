//! [`SalesforceClient`]: the Salesforce REST implementation of [`CrmClient`].

use mentor_core::{
  contact::Record,
  crm::{CrmAuth, CrmClient, CrmError, DeleteOutcome, QueryResult},
  soql::{self, Filter},
};
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::response::{read_json, transport};

// ─── Wire types ───────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct SaveError {
  #[serde(rename = "statusCode", default)]
  status_code: String,
  #[serde(default)]
  message:     String,
}

impl SaveError {
  fn render(&self) -> String { format!("{}: {}", self.status_code, self.message) }
}

/// One entry of a create or composite-delete response.
#[derive(Deserialize)]
struct SaveResult {
  id:      Option<String>,
  success: bool,
  #[serde(default)]
  errors:  Vec<SaveError>,
}

// ─── Client ───────────────────────────────────────────────────────────────────

/// A Salesforce REST client bound to one session.
#[derive(Clone)]
pub struct SalesforceClient {
  http:     Client,
  auth:     CrmAuth,
  data_url: String,
}

impl SalesforceClient {
  pub(crate) fn new(http: Client, auth: CrmAuth, api_version: &str) -> Self {
    let data_url = format!(
      "{}/services/data/v{}",
      auth.instance_url.trim_end_matches('/'),
      api_version
    );
    Self { http, auth, data_url }
  }

  fn bearer(&self, req: RequestBuilder) -> RequestBuilder {
    req.bearer_auth(&self.auth.access_token)
  }
}

impl CrmClient for SalesforceClient {
  /// `GET /services/data/vXX.X/query?q=<soql>`
  #[instrument(skip(self))]
  async fn query(&self, soql: &str) -> Result<QueryResult, CrmError> {
    let resp = self
      .bearer(self.http.get(format!("{}/query", self.data_url)))
      .query(&[("q", soql)])
      .send()
      .await
      .map_err(transport)?;
    let result: QueryResult = read_json(resp).await?;
    debug!(total_size = result.total_size, done = result.done, "query answered");
    Ok(result)
  }

  async fn find(
    &self,
    object: &str,
    filter: &Filter,
    fields: &[&str],
  ) -> Result<Vec<Record>, CrmError> {
    let soql = soql::select(object, fields, Some(filter));
    Ok(self.query(&soql).await?.records)
  }

  /// `POST /services/data/vXX.X/sobjects/<object>/`
  #[instrument(skip(self, fields))]
  async fn create(&self, object: &str, fields: Record) -> Result<String, CrmError> {
    let resp = self
      .bearer(self.http.post(format!("{}/sobjects/{object}/", self.data_url)))
      .json(&fields)
      .send()
      .await
      .map_err(transport)?;
    let result: SaveResult = read_json(resp).await?;

    match result {
      SaveResult { success: true, id: Some(id), .. } => Ok(id),
      SaveResult { errors, .. } => Err(CrmError::Api {
        status:  200,
        message: errors
          .iter()
          .map(SaveError::render)
          .collect::<Vec<_>>()
          .join("; "),
      }),
    }
  }

  /// `DELETE /services/data/vXX.X/composite/sobjects?ids=..&allOrNone=false`
  ///
  /// Salesforce leaves `id` null on failed entries, so outcomes are matched
  /// to the requested ids by position.
  #[instrument(skip(self))]
  async fn delete(&self, object: &str, ids: &[String]) -> Result<Vec<DeleteOutcome>, CrmError> {
    if ids.is_empty() {
      return Ok(vec![]);
    }
    let resp = self
      .bearer(self.http.delete(format!("{}/composite/sobjects", self.data_url)))
      .query(&[("ids", ids.join(",").as_str()), ("allOrNone", "false")])
      .send()
      .await
      .map_err(transport)?;
    let results: Vec<SaveResult> = read_json(resp).await?;

    if results.len() != ids.len() {
      return Err(CrmError::Decode(format!(
        "delete of {} ids answered with {} results",
        ids.len(),
        results.len()
      )));
    }

    Ok(
      ids
        .iter()
        .zip(results)
        .map(|(id, r)| DeleteOutcome {
          id:      r.id.unwrap_or_else(|| id.clone()),
          success: r.success,
          errors:  r.errors.iter().map(SaveError::render).collect(),
        })
        .collect(),
    )
  }

  /// `GET /services/oauth2/userinfo` on the instance.
  async fn identity(&self) -> Result<Record, CrmError> {
    let url = format!(
      "{}/services/oauth2/userinfo",
      self.auth.instance_url.trim_end_matches('/')
    );
    let resp = self
      .bearer(self.http.get(url))
      .send()
      .await
      .map_err(transport)?;
    read_json(resp).await
  }
}
