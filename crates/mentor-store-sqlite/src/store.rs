//! [`SqliteSessionStore`]: the SQLite implementation of [`SessionStore`].

use std::path::Path;

use chrono::{Duration, Utc};
use rusqlite::OptionalExtension as _;
use tracing::debug;

use mentor_core::{
  crm::CrmAuth,
  session::{Session, SessionId, SessionStore},
};

use crate::{
  Result,
  encode::{decode_dt, encode_dt},
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A session store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteSessionStore {
  conn: tokio_rusqlite::Connection,
  ttl:  Duration,
}

impl SqliteSessionStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>, ttl: Duration) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn, ttl };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory(ttl: Duration) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn, ttl };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  #[cfg(test)]
  pub(crate) fn conn_for_tests(&self) -> &tokio_rusqlite::Connection { &self.conn }

  /// Read a session row without touching its expiry.
  pub async fn get(&self, id: &SessionId) -> Result<Option<Session>> {
    let key = id.storage_key();

    let raw: Option<(String, String, i64, i64)> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT instance_url, access_token, created_at, expires_at
                 FROM sessions WHERE session_key = ?1",
              rusqlite::params![key],
              |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?,
        )
      })
      .await?;

    raw
      .map(|(instance_url, access_token, created_at, expires_at)| -> Result<Session> {
        Ok(Session {
          auth:       CrmAuth { instance_url, access_token },
          created_at: decode_dt(created_at)?,
          expires_at: decode_dt(expires_at)?,
        })
      })
      .transpose()
  }
}

// ─── SessionStore impl ───────────────────────────────────────────────────────

impl SessionStore for SqliteSessionStore {
  type Error = crate::Error;

  async fn create(&self, auth: CrmAuth) -> Result<SessionId> {
    let id = SessionId::generate();
    let session = Session::new(auth, Utc::now(), self.ttl);

    let key        = id.storage_key();
    let created_at = encode_dt(session.created_at);
    let expires_at = encode_dt(session.expires_at);
    let CrmAuth { instance_url, access_token } = session.auth;

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO sessions (session_key, instance_url, access_token, created_at, expires_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![key, instance_url, access_token, created_at, expires_at],
        )?;
        Ok(())
      })
      .await?;

    Ok(id)
  }

  async fn resolve(&self, id: &SessionId) -> Result<Option<CrmAuth>> {
    let key         = id.storage_key();
    let now         = Utc::now();
    let now_ms      = encode_dt(now);
    let slid_to_ms  = encode_dt(now + self.ttl);

    let auth = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let row: Option<(String, String, i64)> = tx
          .query_row(
            "SELECT instance_url, access_token, expires_at FROM sessions WHERE session_key = ?1",
            rusqlite::params![key],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
          )
          .optional()?;

        let auth = match row {
          None => None,
          Some((_, _, expires_at)) if expires_at <= now_ms => {
            tx.execute(
              "DELETE FROM sessions WHERE session_key = ?1",
              rusqlite::params![key],
            )?;
            None
          }
          Some((instance_url, access_token, _)) => {
            tx.execute(
              "UPDATE sessions SET expires_at = ?2 WHERE session_key = ?1",
              rusqlite::params![key, slid_to_ms],
            )?;
            Some(CrmAuth { instance_url, access_token })
          }
        };
        tx.commit()?;
        Ok(auth)
      })
      .await?;

    Ok(auth)
  }

  async fn destroy(&self, id: &SessionId) -> Result<()> {
    let key = id.storage_key();
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "DELETE FROM sessions WHERE session_key = ?1",
          rusqlite::params![key],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn purge_expired(&self) -> Result<usize> {
    let now_ms = encode_dt(Utc::now());
    let removed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM sessions WHERE expires_at <= ?1",
          rusqlite::params![now_ms],
        )?)
      })
      .await?;
    debug!(removed, "purged expired sessions");
    Ok(removed)
  }
}
