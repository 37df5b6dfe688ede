//! User account storage.
//!
//! The password hash never leaves this module except through
//! [`Credentials`], which only the auth service asks for.

use chrono::{DateTime, Utc};
use medibills_types::{
    User, UserId,
    inputs::{NewUser, ProfilePatch},
};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    error::{Result, StoreError},
    repository::{begin_write, now},
};

const USER: &str = "User";

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    email: String,
    password_hash: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    fn into_credentials(self) -> Credentials {
        Credentials {
            user: User {
                id: self.id.into(),
                username: self.username,
                email: self.email,
                created_at: self.created_at,
                updated_at: self.updated_at,
            },
            password_hash: self.password_hash,
        }
    }
}

/// A user together with the stored bcrypt hash.
#[derive(Clone)]
pub struct Credentials {
    /// The public part of the account.
    pub user: User,
    /// bcrypt hash of the current password.
    pub password_hash: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password_hash", &"<redacted>")
            .finish()
    }
}

const SELECT_USER: &str =
    "SELECT id, username, email, password_hash, created_at, updated_at FROM users";

/// Registered accounts.
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    pub(crate) fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Inserts a new account.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] if the username or email is taken,
    /// including when a concurrent insert wins the race.
    pub async fn create(&self, input: NewUser) -> Result<User> {
        let taken: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM users WHERE username = ? OR email = ?")
                .bind(&input.username)
                .bind(&input.email)
                .fetch_optional(&self.pool)
                .await?;
        if taken.is_some() {
            return Err(StoreError::Conflict {
                message: "User with this username or email already exists".to_string(),
            });
        }

        let id = UserId::generate();
        let at = now();
        sqlx::query(
            "INSERT INTO users (id, username, email, password_hash, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(id.as_uuid())
        .bind(&input.username)
        .bind(&input.email)
        .bind(&input.password_hash)
        .bind(at)
        .bind(at)
        .execute(&self.pool)
        .await?;

        info!(user = %id, username = %input.username, "User created");
        Ok(User { id, username: input.username, email: input.email, created_at: at, updated_at: at })
    }

    /// Looks up an account by username, or by email (compared lowercased).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on query failure. A miss is `Ok(None)`.
    pub async fn find_by_login(&self, username_or_email: &str) -> Result<Option<Credentials>> {
        let sql = format!("{SELECT_USER} WHERE username = ? OR email = ? LIMIT 1");
        let row: Option<UserRow> = sqlx::query_as(&sql)
            .bind(username_or_email)
            .bind(username_or_email.trim().to_lowercase())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(UserRow::into_credentials))
    }

    /// Loads an account with its hash.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the account does not exist.
    pub async fn credentials(&self, id: UserId) -> Result<Credentials> {
        let sql = format!("{SELECT_USER} WHERE id = ?");
        let row: Option<UserRow> =
            sqlx::query_as(&sql).bind(id.as_uuid()).fetch_optional(&self.pool).await?;
        row.map(UserRow::into_credentials).ok_or(StoreError::NotFound { entity: USER })
    }

    /// Loads an account.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the account does not exist.
    pub async fn get(&self, id: UserId) -> Result<User> {
        Ok(self.credentials(id).await?.user)
    }

    /// Replaces the stored hash.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the account does not exist.
    pub async fn update_password(&self, id: UserId, password_hash: &str) -> Result<()> {
        let result = sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
            .bind(password_hash)
            .bind(now())
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound { entity: USER });
        }
        debug!(user = %id, "Password updated");
        Ok(())
    }

    /// Changes username and/or email.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] if either value belongs to another
    /// account, or [`StoreError::NotFound`] if this one does not exist.
    pub async fn update_profile(&self, id: UserId, patch: ProfilePatch) -> Result<User> {
        let mut tx = begin_write(&self.pool).await?;

        if !patch.is_empty() {
            let mut check: QueryBuilder<'_, Sqlite> =
                QueryBuilder::new("SELECT 1 FROM users WHERE id != ");
            check.push_bind(id.as_uuid()).push(" AND (");
            let mut clauses = check.separated(" OR ");
            if let Some(username) = &patch.username {
                clauses.push("username = ").push_bind_unseparated(username.clone());
            }
            if let Some(email) = &patch.email {
                clauses.push("email = ").push_bind_unseparated(email.clone());
            }
            check.push(") LIMIT 1");
            let taken: Option<i64> = check.build_query_scalar().fetch_optional(&mut *tx).await?;
            if taken.is_some() {
                return Err(StoreError::Conflict {
                    message: "Username or email already taken".to_string(),
                });
            }
        }

        let mut query: QueryBuilder<'_, Sqlite> = QueryBuilder::new("UPDATE users SET updated_at = ");
        query.push_bind(now());
        if let Some(username) = patch.username {
            query.push(", username = ").push_bind(username);
        }
        if let Some(email) = patch.email {
            query.push(", email = ").push_bind(email);
        }
        query.push(" WHERE id = ").push_bind(id.as_uuid());

        if query.build().execute(&mut *tx).await?.rows_affected() == 0 {
            return Err(StoreError::NotFound { entity: USER });
        }

        let sql = format!("{SELECT_USER} WHERE id = ?");
        let row: UserRow = sqlx::query_as(&sql).bind(id.as_uuid()).fetch_one(&mut *tx).await?;
        tx.commit().await?;
        debug!(user = %id, "Profile updated");
        Ok(row.into_credentials().user)
    }

    /// Deletes the account. Every owned row and session goes with it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the account does not exist.
    pub async fn delete(&self, id: UserId) -> Result<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound { entity: USER });
        }
        info!(user = %id, "User deleted");
        Ok(())
    }
}
