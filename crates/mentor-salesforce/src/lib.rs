//! Salesforce REST backend for the mentor-match CRM facade.
//!
//! [`SalesforceConnector`] runs the OAuth2 web-server flow against the
//! configured login host and hands out [`SalesforceClient`]s bound to one
//! session's instance URL and access token. All calls share one
//! [`reqwest::Client`], whose timeout applies to every round trip.

mod client;
mod oauth;
mod response;

pub mod error;

pub use client::SalesforceClient;
pub use error::{Error, Result};

use std::{sync::Arc, time::Duration};

use mentor_core::crm::{CrmAuth, CrmConnector, CrmError};
use reqwest::{Client, Url};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Connected-app settings plus transport tuning.
#[derive(Clone)]
pub struct SalesforceConfig {
  /// Login host, e.g. `https://login.salesforce.com` or a My Domain URL.
  pub login_url:       String,
  pub consumer_key:    String,
  pub consumer_secret: String,
  /// Redirect URI registered on the connected app.
  pub callback_url:    String,
  /// REST API version without the `v`, e.g. `"48.0"`.
  pub api_version:     String,
  /// Per-call timeout, covering connect through the end of the body.
  pub timeout:         Duration,
}

// ─── Connector ────────────────────────────────────────────────────────────────

/// Process-wide Salesforce entry point.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct SalesforceConnector {
  http:      Client,
  config:    Arc<SalesforceConfig>,
  login_url: Url,
}

impl SalesforceConnector {
  pub fn new(config: SalesforceConfig) -> Result<Self> {
    let login_url = Url::parse(config.login_url.trim_end_matches('/'))
      .map_err(|e| Error::LoginUrl(e.to_string()))?;
    let http = Client::builder()
      .timeout(config.timeout)
      .build()
      .map_err(Error::Client)?;
    Ok(Self {
      http,
      config: Arc::new(config),
      login_url,
    })
  }

  fn oauth_endpoint(&self, name: &str) -> Url {
    let mut url = self.login_url.clone();
    url.set_path(&format!("/services/oauth2/{name}"));
    url
  }
}

impl CrmConnector for SalesforceConnector {
  type Client = SalesforceClient;

  fn authorization_url(&self, state: &str) -> Result<String, CrmError> {
    let mut url = self.oauth_endpoint("authorize");
    url
      .query_pairs_mut()
      .append_pair("response_type", "code")
      .append_pair("client_id", &self.config.consumer_key)
      .append_pair("redirect_uri", &self.config.callback_url)
      .append_pair("scope", "api")
      .append_pair("state", state);
    Ok(url.into())
  }

  async fn exchange_code(&self, code: &str) -> Result<CrmAuth, CrmError> {
    oauth::exchange_code(&self.http, self.oauth_endpoint("token"), &self.config, code).await
  }

  async fn revoke(&self, auth: &CrmAuth) -> Result<(), CrmError> {
    oauth::revoke(&self.http, self.oauth_endpoint("revoke"), auth).await
  }

  fn connect(&self, auth: &CrmAuth) -> SalesforceClient {
    SalesforceClient::new(self.http.clone(), auth.clone(), &self.config.api_version)
  }
}

#[cfg(test)]
mod tests;
