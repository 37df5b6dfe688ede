//! Server-side session storage.
//!
//! Clients hold an opaque token: 32 random bytes, URL-safe base64. The
//! database only ever sees `HMAC-SHA256(secret, token)`, so a leaked sessions
//! table cannot be replayed without the server secret.
//!
//! Lifetimes follow a rolling window with a hard cap: every successful
//! [`SessionStore::resolve`] pushes `expires_at` to `now + idle`, but never
//! past `absolute_expires_at`, which is fixed at creation.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, TimeDelta, Utc};
use hmac::{Hmac, Mac};
use medibills_types::{UserId, config::SessionConfig};
use rand::RngCore;
use sha2::Sha256;
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    Database,
    error::{Result, StoreError},
    repository::now,
};

/// Raw token length in bytes.
pub const TOKEN_BYTES: usize = 32;

/// A live session as seen by request handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// The authenticated user.
    pub user_id: UserId,
    /// When the session was established.
    pub created_at: DateTime<Utc>,
    /// Current rolling expiry.
    pub expires_at: DateTime<Utc>,
    /// Hard expiry, never extended.
    pub absolute_expires_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct SessionRow {
    user_id: Uuid,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    absolute_expires_at: DateTime<Utc>,
}

/// Handle to the sessions table.
#[derive(Clone)]
pub struct SessionStore {
    pool: SqlitePool,
    mac: Hmac<Sha256>,
    idle: TimeDelta,
    absolute: TimeDelta,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("idle", &self.idle)
            .field("absolute", &self.absolute)
            .finish_non_exhaustive()
    }
}

impl SessionStore {
    /// Creates a store over `db` keyed by `secret`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::SessionSetup`] if the secret is empty or a
    /// lifetime does not fit in a timestamp delta.
    pub fn new(db: &Database, secret: &[u8], config: &SessionConfig) -> Result<Self> {
        if secret.is_empty() {
            return Err(StoreError::SessionSetup { message: "secret is empty".to_string() });
        }
        let mac = <Hmac<Sha256>>::new_from_slice(secret)
            .map_err(|e| StoreError::SessionSetup { message: e.to_string() })?;
        let idle = TimeDelta::from_std(config.idle_timeout)
            .map_err(|e| StoreError::SessionSetup { message: format!("idle timeout: {e}") })?;
        let absolute = TimeDelta::from_std(config.absolute_timeout)
            .map_err(|e| StoreError::SessionSetup { message: format!("absolute timeout: {e}") })?;
        Ok(Self { pool: db.pool().clone(), mac, idle, absolute })
    }

    fn digest(&self, token: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(token.as_bytes());
        URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
    }

    /// Starts a session for `user`. Returns the client token and the session.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the row cannot be written.
    pub async fn create(&self, user: UserId) -> Result<(String, Session)> {
        self.create_at(user, now()).await
    }

    /// [`SessionStore::create`] at an explicit instant.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the row cannot be written.
    pub async fn create_at(&self, user: UserId, at: DateTime<Utc>) -> Result<(String, Session)> {
        let mut raw = [0u8; TOKEN_BYTES];
        rand::thread_rng().fill_bytes(&mut raw);
        let token = URL_SAFE_NO_PAD.encode(raw);

        let session = Session {
            user_id: user,
            created_at: at,
            expires_at: at + self.idle.min(self.absolute),
            absolute_expires_at: at + self.absolute,
        };
        sqlx::query(
            "INSERT INTO sessions (id, user_id, created_at, last_seen_at, expires_at, \
             absolute_expires_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(self.digest(&token))
        .bind(user.as_uuid())
        .bind(session.created_at)
        .bind(session.created_at)
        .bind(session.expires_at)
        .bind(session.absolute_expires_at)
        .execute(&self.pool)
        .await?;

        debug!(user = %user, expires_at = %session.expires_at, "Session created");
        Ok((token, session))
    }

    /// Looks up a token and slides its expiry.
    ///
    /// Unknown and expired tokens resolve to `None`; expired rows are deleted
    /// on the way out.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on query failure.
    pub async fn resolve(&self, token: &str) -> Result<Option<Session>> {
        self.resolve_at(token, now()).await
    }

    /// [`SessionStore::resolve`] at an explicit instant.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on query failure.
    pub async fn resolve_at(&self, token: &str, at: DateTime<Utc>) -> Result<Option<Session>> {
        let digest = self.digest(token);
        let row: Option<SessionRow> = sqlx::query_as(
            "SELECT user_id, created_at, expires_at, absolute_expires_at FROM sessions WHERE id = ?",
        )
        .bind(&digest)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        if at >= row.expires_at || at >= row.absolute_expires_at {
            sqlx::query("DELETE FROM sessions WHERE id = ?").bind(&digest).execute(&self.pool).await?;
            debug!(user = %UserId::from_uuid(row.user_id), "Expired session rejected");
            return Ok(None);
        }

        let expires_at = (at + self.idle).min(row.absolute_expires_at);
        sqlx::query("UPDATE sessions SET expires_at = ?, last_seen_at = ? WHERE id = ?")
            .bind(expires_at)
            .bind(at)
            .bind(&digest)
            .execute(&self.pool)
            .await?;

        Ok(Some(Session {
            user_id: UserId::from_uuid(row.user_id),
            created_at: row.created_at,
            expires_at,
            absolute_expires_at: row.absolute_expires_at,
        }))
    }

    /// Ends the session behind `token`. Returns whether one existed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on query failure.
    pub async fn destroy(&self, token: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(self.digest(token))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Ends every session of `user`. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on query failure.
    pub async fn destroy_all_for_user(&self, user: UserId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE user_id = ?")
            .bind(user.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Drops every expired session. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on query failure.
    pub async fn purge_expired(&self) -> Result<u64> {
        let at = now();
        let result =
            sqlx::query("DELETE FROM sessions WHERE expires_at <= ? OR absolute_expires_at <= ?")
                .bind(at)
                .bind(at)
                .execute(&self.pool)
                .await?;
        let purged = result.rows_affected();
        if purged > 0 {
            info!(purged, "Expired sessions purged");
        }
        Ok(purged)
    }

    /// Rolling idle window.
    pub fn idle_timeout(&self) -> TimeDelta {
        self.idle
    }
}
