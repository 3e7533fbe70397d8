//! OAuth2 web-server flow: code exchange and token revocation.

use mentor_core::crm::{CrmAuth, CrmError};
use reqwest::{Client, Url};
use serde::Deserialize;
use tracing::debug;

use crate::{
  SalesforceConfig,
  response::{read_empty, read_json, transport},
};

#[derive(Deserialize)]
struct TokenResponse {
  access_token: String,
  instance_url: String,
}

/// `POST /services/oauth2/token` with `grant_type=authorization_code`.
pub(crate) async fn exchange_code(
  http: &Client,
  endpoint: Url,
  config: &SalesforceConfig,
  code: &str,
) -> Result<CrmAuth, CrmError> {
  let resp = http
    .post(endpoint)
    .form(&[
      ("grant_type", "authorization_code"),
      ("code", code),
      ("client_id", config.consumer_key.as_str()),
      ("client_secret", config.consumer_secret.as_str()),
      ("redirect_uri", config.callback_url.as_str()),
    ])
    .send()
    .await
    .map_err(transport)?;

  let token: TokenResponse = read_json(resp).await?;
  debug!(instance_url = %token.instance_url, "authorization code exchanged");
  Ok(CrmAuth {
    instance_url: token.instance_url,
    access_token: token.access_token,
  })
}

/// `POST /services/oauth2/revoke`.
pub(crate) async fn revoke(http: &Client, endpoint: Url, auth: &CrmAuth) -> Result<(), CrmError> {
  let resp = http
    .post(endpoint)
    .form(&[("token", auth.access_token.as_str())])
    .send()
    .await
    .map_err(transport)?;
  read_empty(resp).await
}
