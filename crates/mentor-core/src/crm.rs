//! The CRM client facade.
//!
//! [`CrmConnector`] is the process-wide half: it holds the OAuth application
//! credentials and turns an authorization code into a [`CrmAuth`].
//! [`CrmClient`] is the per-request half, bound to one session's
//! [`CrmAuth`]. Every method is exactly one round trip to the CRM; nothing is
//! cached, batched or retried.

use std::{fmt, future::Future};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{contact::Record, soql::Filter};

// ─── Credentials ─────────────────────────────────────────────────────────────

/// An OAuth-delegated CRM session: where to talk to and with which token.
///
/// Deliberately not `Serialize`; it must never reach a client.
#[derive(Clone, PartialEq, Eq)]
pub struct CrmAuth {
  pub instance_url: String,
  pub access_token: String,
}

impl fmt::Debug for CrmAuth {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CrmAuth")
      .field("instance_url", &self.instance_url)
      .field("access_token", &"<redacted>")
      .finish()
  }
}

// ─── Results ─────────────────────────────────────────────────────────────────

/// The result of a query, in the CRM's own JSON shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
  pub total_size: u64,
  pub done:       bool,
  pub records:    Vec<Record>,
}

/// Per-id outcome of a delete call. Deletes are not atomic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteOutcome {
  pub id:      String,
  pub success: bool,
  #[serde(default)]
  pub errors:  Vec<String>,
}

// ─── Errors ──────────────────────────────────────────────────────────────────

/// A failed CRM call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CrmError {
  /// The call could not be delivered or the connection failed.
  #[error("transport error: {0}")]
  Transport(String),

  #[error("CRM call timed out")]
  Timeout,

  /// The CRM rejected the access token.
  #[error("CRM rejected the session token")]
  Unauthorized,

  /// The CRM answered with an API-level error.
  #[error("CRM API error ({status}): {message}")]
  Api { status: u16, message: String },

  #[error("unexpected CRM response: {0}")]
  Decode(String),
}

impl From<crate::Error> for CrmError {
  fn from(e: crate::Error) -> Self { CrmError::Decode(e.to_string()) }
}

// ─── Traits ──────────────────────────────────────────────────────────────────

/// A CRM connection bound to one session.
pub trait CrmClient: Send + Sync {
  /// Run a query string verbatim.
  fn query<'a>(
    &'a self,
    soql: &'a str,
  ) -> impl Future<Output = Result<QueryResult, CrmError>> + Send + 'a;

  /// Return `fields` of every `object` record matching all of `filter`'s
  /// equality clauses.
  fn find<'a>(
    &'a self,
    object: &'a str,
    filter: &'a Filter,
    fields: &'a [&'a str],
  ) -> impl Future<Output = Result<Vec<Record>, CrmError>> + Send + 'a;

  /// Create one record and return its id.
  fn create<'a>(
    &'a self,
    object: &'a str,
    fields: Record,
  ) -> impl Future<Output = Result<String, CrmError>> + Send + 'a;

  /// Delete records by id. Each id succeeds or fails on its own; the
  /// returned outcomes are in the same order as `ids`.
  fn delete<'a>(
    &'a self,
    object: &'a str,
    ids: &'a [String],
  ) -> impl Future<Output = Result<Vec<DeleteOutcome>, CrmError>> + Send + 'a;

  /// Identity of the user the session belongs to.
  fn identity(&self) -> impl Future<Output = Result<Record, CrmError>> + Send + '_;
}

/// Process-wide entry point to the CRM: OAuth flow plus client construction.
pub trait CrmConnector: Send + Sync + 'static {
  type Client: CrmClient;

  /// URL the browser is redirected to for login. `state` is echoed back to
  /// the callback.
  fn authorization_url(&self, state: &str) -> Result<String, CrmError>;

  /// Exchange an authorization code for session credentials.
  fn exchange_code<'a>(
    &'a self,
    code: &'a str,
  ) -> impl Future<Output = Result<CrmAuth, CrmError>> + Send + 'a;

  /// Revoke the session's token at the CRM.
  fn revoke<'a>(
    &'a self,
    auth: &'a CrmAuth,
  ) -> impl Future<Output = Result<(), CrmError>> + Send + 'a;

  /// Build a client bound to `auth`.
  fn connect(&self, auth: &CrmAuth) -> Self::Client;
}
