//! SQL schema for the session store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- One row per live session. Rows are deleted on logout, on expiry, or by
-- the periodic purge.
CREATE TABLE IF NOT EXISTS sessions (
    session_key   TEXT PRIMARY KEY,    -- hex SHA-256 of the cookie value
    instance_url  TEXT NOT NULL,
    access_token  TEXT NOT NULL,
    created_at    INTEGER NOT NULL,    -- unix milliseconds, UTC
    expires_at    INTEGER NOT NULL     -- unix milliseconds, UTC; slides on use
);

CREATE INDEX IF NOT EXISTS sessions_expiry_idx ON sessions(expires_at);

PRAGMA user_version = 1;
";
