//! HTTP layer for the mentor-match backend.
//!
//! Exposes an axum [`Router`] that fronts the CRM for a browser client:
//! OAuth login and logout, SOQL passthrough, the left/right report and the
//! match/unmatch workflow. Generic over the [`CrmConnector`] and the
//! [`SessionStore`] so tests can run the whole router in memory.

pub mod context;
pub mod cookie;
pub mod error;
pub mod handlers;

pub use context::CrmContext;
pub use error::ApiError;

use std::{path::PathBuf, sync::Arc, time::Duration};

use axum::{
  Router,
  routing::{get, post},
};
use mentor_core::{
  contact::{RecordTypeIds, RelationshipSchema},
  crm::CrmConnector,
  session::SessionStore,
  workflow::{KeyedLocks, MatchSettings},
};
use mentor_salesforce::SalesforceConfig;
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use handlers::{auth, matching, records};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `MATCH__*` environment variables.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:         String,
  #[serde(default = "default_port")]
  pub port:         u16,
  #[serde(default)]
  pub app:          AppConfig,
  pub salesforce:   SalesforceSection,
  #[serde(default)]
  pub crm:          CrmConfig,
  pub record_types: RecordTypeIds,
  #[serde(default)]
  pub relationship: RelationshipSchema,
  #[serde(default)]
  pub session:      SessionConfig,
}

#[derive(Deserialize, Clone)]
#[serde(default)]
pub struct AppConfig {
  /// Where the browser lands after login and logout.
  pub post_login_redirect: String,
}

impl Default for AppConfig {
  fn default() -> Self {
    Self { post_login_redirect: "/".to_string() }
  }
}

/// The connected app registered in Salesforce.
#[derive(Deserialize, Clone)]
pub struct SalesforceSection {
  #[serde(default = "default_login_url")]
  pub login_url:       String,
  pub consumer_key:    String,
  pub consumer_secret: String,
  pub callback_url:    String,
  #[serde(default = "default_api_version")]
  pub api_version:     String,
}

#[derive(Deserialize, Clone)]
#[serde(default)]
pub struct CrmConfig {
  pub timeout_secs: u64,
}

impl Default for CrmConfig {
  fn default() -> Self { Self { timeout_secs: 30 } }
}

#[derive(Deserialize, Clone)]
#[serde(default)]
pub struct SessionConfig {
  pub cookie_name:   String,
  pub ttl_secs:      u64,
  /// Add `Secure` to cookies; set when served over HTTPS.
  pub secure_cookie: bool,
  /// SQLite file for sessions. Sessions live in memory when unset.
  pub store_path:    Option<PathBuf>,
}

impl Default for SessionConfig {
  fn default() -> Self {
    Self {
      cookie_name:   "match_sid".to_string(),
      ttl_secs:      8 * 60 * 60,
      secure_cookie: false,
      store_path:    None,
    }
  }
}

/// Upper bound on the session TTL, ten years.
const MAX_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

impl SessionConfig {
  /// Session TTL in seconds, clamped to [`MAX_TTL_SECS`].
  pub fn max_age_secs(&self) -> i64 { self.ttl_secs.min(MAX_TTL_SECS) as i64 }

  pub fn ttl(&self) -> chrono::Duration { chrono::Duration::seconds(self.max_age_secs()) }

  /// Name of the short-lived cookie carrying the OAuth `state`.
  pub fn state_cookie_name(&self) -> String { format!("{}_state", self.cookie_name) }
}

fn default_host() -> String { "127.0.0.1".to_string() }
fn default_port() -> u16 { 8080 }
fn default_login_url() -> String { "https://login.salesforce.com".to_string() }
fn default_api_version() -> String { "48.0".to_string() }

impl ServerConfig {
  pub fn salesforce_config(&self) -> SalesforceConfig {
    SalesforceConfig {
      login_url:       self.salesforce.login_url.clone(),
      consumer_key:    self.salesforce.consumer_key.clone(),
      consumer_secret: self.salesforce.consumer_secret.clone(),
      callback_url:    self.salesforce.callback_url.clone(),
      api_version:     self.salesforce.api_version.clone(),
      timeout:         Duration::from_secs(self.crm.timeout_secs),
    }
  }

  pub fn match_settings(&self) -> MatchSettings {
    MatchSettings {
      record_types: self.record_types.clone(),
      relationship: self.relationship.clone(),
    }
  }
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<C, S> {
  pub connector: Arc<C>,
  pub sessions:  Arc<S>,
  pub config:    Arc<ServerConfig>,
  pub settings:  Arc<MatchSettings>,
  /// Serialises match and unmatch per newbee.
  pub locks:     KeyedLocks,
}

// Derived `Clone` would demand `C: Clone` and `S: Clone`.
impl<C, S> Clone for AppState<C, S> {
  fn clone(&self) -> Self {
    Self {
      connector: Arc::clone(&self.connector),
      sessions:  Arc::clone(&self.sessions),
      config:    Arc::clone(&self.config),
      settings:  Arc::clone(&self.settings),
      locks:     self.locks.clone(),
    }
  }
}

impl<C: CrmConnector, S: SessionStore> AppState<C, S> {
  pub fn new(connector: C, sessions: S, config: ServerConfig) -> Self {
    Self {
      connector: Arc::new(connector),
      sessions:  Arc::new(sessions),
      settings:  Arc::new(config.match_settings()),
      config:    Arc::new(config),
      locks:     KeyedLocks::new(),
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the axum [`Router`] for the backend.
pub fn router<C, S>(state: AppState<C, S>) -> Router
where
  C: CrmConnector,
  S: SessionStore,
{
  Router::new()
    .route("/",              get(handlers::root))
    .route("/auth/login",    get(auth::login::<C, S>))
    .route("/auth/callback", get(auth::callback::<C, S>))
    .route("/auth/logout",   get(auth::logout::<C, S>))
    .route("/auth/whoami",   get(auth::whoami::<C>))
    .route("/query",         get(records::query::<C>))
    .route("/contacts",      get(records::contacts::<C>))
    .route("/relationships", get(records::relationships::<C, S>))
    .route("/leftRightData", get(records::left_right_data::<C, S>))
    .route("/match",         post(matching::match_pair::<C, S>))
    .route(
      "/unmatch",
      post(matching::unmatch_pair::<C, S>).get(matching::unmatch_pair::<C, S>),
    )
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}
