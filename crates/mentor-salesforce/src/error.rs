//! Error type for building a Salesforce connector.
//!
//! Call-time failures use [`mentor_core::crm::CrmError`].

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid login url: {0}")]
  LoginUrl(String),

  #[error("failed to build HTTP client: {0}")]
  Client(#[source] reqwest::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
