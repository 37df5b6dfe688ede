//! Account lifecycle: registration, login, and credential changes.
//!
//! bcrypt is CPU-bound, so hashing and verification run on the blocking pool.
//! Every password failure surfaces as a deliberately generic
//! [`ApiError::InvalidCredentials`].

use medibills_store::Database;
use medibills_types::{
    User, UserId,
    inputs::{NewUser, ProfilePatch},
};
use snafu::ResultExt;
use tracing::{info, warn};

use crate::{
    error::{ApiError, ApiResult, HashSnafu, JoinSnafu},
    metrics,
};

/// Account operations over the user repository.
#[derive(Debug, Clone)]
pub struct AuthService {
    db: Database,
    cost: u32,
}

impl AuthService {
    /// Creates a service hashing new passwords at bcrypt `cost`.
    pub fn new(db: Database, cost: u32) -> Self {
        Self { db, cost }
    }

    /// Creates an account.
    ///
    /// # Errors
    ///
    /// Returns a conflict if the username or email is taken.
    pub async fn register(&self, username: String, email: String, password: String) -> ApiResult<User> {
        let password_hash = hash_password(password, self.cost).await?;
        let result = self.db.users().create(NewUser { username, email, password_hash }).await;
        metrics::record_auth_event("register", result.is_ok());
        Ok(result?)
    }

    /// Checks a username-or-email and password pair.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidCredentials`] when the account is unknown or
    /// the password does not match; the two cases are indistinguishable.
    pub async fn login(&self, username_or_email: &str, password: String) -> ApiResult<User> {
        let Some(credentials) = self.db.users().find_by_login(username_or_email).await? else {
            metrics::record_auth_event("login", false);
            warn!("Login attempt for unknown account");
            return Err(ApiError::invalid_credentials());
        };

        let matches = verify_password(password, credentials.password_hash).await?;
        metrics::record_auth_event("login", matches);
        if !matches {
            warn!(user = %credentials.user.id, "Login attempt with wrong password");
            return Err(ApiError::invalid_credentials());
        }
        info!(user = %credentials.user.id, "User logged in");
        Ok(credentials.user)
    }

    /// Loads the account behind a session.
    ///
    /// # Errors
    ///
    /// Returns not-found if the account no longer exists.
    pub async fn get_user(&self, id: UserId) -> ApiResult<User> {
        Ok(self.db.users().get(id).await?)
    }

    /// Replaces the password after checking the current one.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidCredentials`] if `current` is wrong.
    pub async fn update_password(&self, id: UserId, current: String, new: String) -> ApiResult<()> {
        let credentials = self.db.users().credentials(id).await?;
        if !verify_password(current, credentials.password_hash).await? {
            metrics::record_auth_event("password_change", false);
            return Err(ApiError::InvalidCredentials { message: "Current password is incorrect" });
        }
        let password_hash = hash_password(new, self.cost).await?;
        self.db.users().update_password(id, &password_hash).await?;
        metrics::record_auth_event("password_change", true);
        info!(user = %id, "Password changed");
        Ok(())
    }

    /// Changes username and/or email.
    ///
    /// # Errors
    ///
    /// Returns a conflict if a new value belongs to another account.
    pub async fn update_profile(&self, id: UserId, patch: ProfilePatch) -> ApiResult<User> {
        Ok(self.db.users().update_profile(id, patch).await?)
    }

    /// Deletes the account and, by cascade, everything it owns.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidCredentials`] if `password` is wrong.
    pub async fn delete_account(&self, id: UserId, password: String) -> ApiResult<()> {
        let credentials = self.db.users().credentials(id).await?;
        if !verify_password(password, credentials.password_hash).await? {
            metrics::record_auth_event("delete_account", false);
            return Err(ApiError::InvalidCredentials { message: "Password is incorrect" });
        }
        self.db.users().delete(id).await?;
        metrics::record_auth_event("delete_account", true);
        Ok(())
    }
}

async fn hash_password(password: String, cost: u32) -> ApiResult<String> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .context(JoinSnafu)?
        .context(HashSnafu)
}

async fn verify_password(password: String, hash: String) -> ApiResult<bool> {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .context(JoinSnafu)?
        .context(HashSnafu)
}
