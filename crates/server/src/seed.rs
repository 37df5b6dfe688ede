//! Demo account seeding.

use medibills_api::{ApiResult, AppState};
use medibills_types::UserId;
use tracing::info;

/// Demo account username.
pub const DEMO_USERNAME: &str = "demo";
/// Demo account email.
pub const DEMO_EMAIL: &str = "demo@medibills.com";
/// Demo account password.
pub const DEMO_PASSWORD: &str = "Demo123!";

/// Result of [`seed_demo_user`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedOutcome {
    /// The account was created.
    Created(UserId),
    /// An account with the demo username or email already existed.
    AlreadyPresent(UserId),
}

/// Creates the demo account unless it exists.
///
/// # Errors
///
/// Returns an error if the lookup or registration fails.
pub async fn seed_demo_user(state: &AppState) -> ApiResult<SeedOutcome> {
    let users = state.db.users();
    for login in [DEMO_USERNAME, DEMO_EMAIL] {
        if let Some(existing) = users.find_by_login(login).await? {
            info!(user_id = %existing.user.id, "Demo user already present");
            return Ok(SeedOutcome::AlreadyPresent(existing.user.id));
        }
    }

    let user = state
        .auth
        .register(DEMO_USERNAME.to_string(), DEMO_EMAIL.to_string(), DEMO_PASSWORD.to_string())
        .await?;
    info!(user_id = %user.id, username = DEMO_USERNAME, "Demo user created");
    Ok(SeedOutcome::Created(user.id))
}
