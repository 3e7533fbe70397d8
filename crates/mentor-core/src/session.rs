//! Server-side sessions mapping an opaque cookie value to CRM credentials.
//!
//! The cookie value ([`SessionId`]) is the only thing a client ever sees.
//! Stores key sessions by [`SessionId::storage_key`], the SHA-256 of the
//! cookie value, so the store's contents alone cannot be replayed as cookies.

use std::{collections::HashMap, convert::Infallible, future::Future, sync::Arc};

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD as B64;
use chrono::{DateTime, Duration, Utc};
use rand_core::{OsRng, RngCore};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;

use crate::crm::CrmAuth;

// ─── Session id ──────────────────────────────────────────────────────────────

/// The opaque session identifier carried in the session cookie.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
  /// 32 bytes from the OS RNG, base64url without padding.
  pub fn generate() -> Self {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    Self(B64.encode(bytes))
  }

  pub fn as_str(&self) -> &str { &self.0 }

  /// Hex SHA-256 of the id; the key stores index sessions by.
  pub fn storage_key(&self) -> String {
    hex::encode(Sha256::digest(self.0.as_bytes()))
  }
}

impl From<String> for SessionId {
  fn from(s: String) -> Self { Self(s) }
}

impl std::fmt::Debug for SessionId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str("SessionId(<redacted>)")
  }
}

// ─── Session ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Session {
  pub auth:       CrmAuth,
  pub created_at: DateTime<Utc>,
  pub expires_at: DateTime<Utc>,
}

impl Session {
  pub fn new(auth: CrmAuth, now: DateTime<Utc>, ttl: Duration) -> Self {
    Self {
      auth,
      created_at: now,
      expires_at: now + ttl,
    }
  }

  pub fn is_expired(&self, now: DateTime<Utc>) -> bool { self.expires_at <= now }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Storage for server-side sessions.
///
/// Expiry is sliding: a successful [`resolve`](SessionStore::resolve) pushes
/// the session's expiry one TTL into the future.
pub trait SessionStore: Send + Sync + 'static {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Persist a new session for `auth` and return its id.
  fn create(
    &self,
    auth: CrmAuth,
  ) -> impl Future<Output = Result<SessionId, Self::Error>> + Send + '_;

  /// Look up a live session. Missing and expired sessions are `None`.
  fn resolve<'a>(
    &'a self,
    id: &'a SessionId,
  ) -> impl Future<Output = Result<Option<CrmAuth>, Self::Error>> + Send + 'a;

  /// Remove a session. Removing an unknown session is not an error.
  fn destroy<'a>(
    &'a self,
    id: &'a SessionId,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Drop every expired session and return how many were removed.
  fn purge_expired(&self) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;
}

// ─── In-memory store ─────────────────────────────────────────────────────────

/// A [`SessionStore`] held in process memory. Sessions do not survive a
/// restart.
///
/// Cloning is cheap; clones share the same sessions.
#[derive(Clone)]
pub struct MemorySessionStore {
  sessions: Arc<RwLock<HashMap<String, Session>>>,
  ttl:      Duration,
}

impl MemorySessionStore {
  pub fn new(ttl: Duration) -> Self {
    Self {
      sessions: Arc::default(),
      ttl,
    }
  }

  pub async fn len(&self) -> usize { self.sessions.read().await.len() }

  pub async fn is_empty(&self) -> bool { self.len().await == 0 }
}

impl SessionStore for MemorySessionStore {
  type Error = Infallible;

  async fn create(&self, auth: CrmAuth) -> Result<SessionId, Infallible> {
    let id = SessionId::generate();
    let session = Session::new(auth, Utc::now(), self.ttl);
    self.sessions.write().await.insert(id.storage_key(), session);
    Ok(id)
  }

  async fn resolve(&self, id: &SessionId) -> Result<Option<CrmAuth>, Infallible> {
    let key = id.storage_key();
    let now = Utc::now();
    let mut sessions = self.sessions.write().await;

    match sessions.get_mut(&key) {
      None => return Ok(None),
      Some(session) if !session.is_expired(now) => {
        session.expires_at = now + self.ttl;
        return Ok(Some(session.auth.clone()));
      }
      Some(_) => {}
    }

    sessions.remove(&key);
    Ok(None)
  }

  async fn destroy(&self, id: &SessionId) -> Result<(), Infallible> {
    self.sessions.write().await.remove(&id.storage_key());
    Ok(())
  }

  async fn purge_expired(&self) -> Result<usize, Infallible> {
    let now = Utc::now();
    let mut sessions = self.sessions.write().await;
    let before = sessions.len();
    sessions.retain(|_, s| !s.is_expired(now));
    Ok(before - sessions.len())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn auth() -> CrmAuth {
    CrmAuth {
      instance_url: "https://example.my.salesforce.com".into(),
      access_token: "00Dxx!token".into(),
    }
  }

  #[test]
  fn generated_ids_are_unique_and_url_safe() {
    let a = SessionId::generate();
    let b = SessionId::generate();
    assert_ne!(a, b);
    assert_eq!(a.as_str().len(), 43);
    assert!(a.as_str().chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
  }

  #[test]
  fn storage_key_is_not_the_id() {
    let id = SessionId::generate();
    let key = id.storage_key();
    assert_eq!(key.len(), 64);
    assert_ne!(key, id.as_str());
    assert_eq!(key, id.storage_key());
  }

  #[test]
  fn debug_output_hides_secrets() {
    let id = SessionId::from("cookie-value".to_string());
    assert!(!format!("{id:?}").contains("cookie-value"));
    assert!(!format!("{:?}", auth()).contains("token"));
  }

  #[tokio::test]
  async fn create_resolve_destroy() {
    let store = MemorySessionStore::new(Duration::hours(8));
    let id = store.create(auth()).await.unwrap();

    assert_eq!(store.resolve(&id).await.unwrap(), Some(auth()));

    store.destroy(&id).await.unwrap();
    assert_eq!(store.resolve(&id).await.unwrap(), None);
  }

  #[tokio::test]
  async fn unknown_id_does_not_resolve() {
    let store = MemorySessionStore::new(Duration::hours(8));
    store.create(auth()).await.unwrap();
    let stranger = SessionId::generate();
    assert_eq!(store.resolve(&stranger).await.unwrap(), None);
  }

  #[tokio::test]
  async fn expired_session_does_not_resolve() {
    let store = MemorySessionStore::new(Duration::zero());
    let id = store.create(auth()).await.unwrap();
    assert_eq!(store.resolve(&id).await.unwrap(), None);
    assert!(store.is_empty().await);
  }

  #[tokio::test]
  async fn resolve_slides_expiry_forward() {
    let store = MemorySessionStore::new(Duration::hours(8));
    let id = store.create(auth()).await.unwrap();
    let before = store.sessions.read().await[&id.storage_key()].expires_at;

    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    store.resolve(&id).await.unwrap();

    let after = store.sessions.read().await[&id.storage_key()].expires_at;
    assert!(after > before);
  }

  #[tokio::test]
  async fn purge_removes_only_expired() {
    let store = MemorySessionStore::new(Duration::hours(8));
    let live = store.create(auth()).await.unwrap();
    let stale = store.create(auth()).await.unwrap();
    store
      .sessions
      .write()
      .await
      .get_mut(&stale.storage_key())
      .unwrap()
      .expires_at = Utc::now() - Duration::seconds(1);

    assert_eq!(store.purge_expired().await.unwrap(), 1);
    assert!(store.resolve(&live).await.unwrap().is_some());
    assert_eq!(store.len().await, 1);
  }
}
