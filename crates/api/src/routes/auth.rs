//! `/auth`: registration, login, logout, and account management.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{delete, get, post, put},
};
use axum_extra::extract::CookieJar;
use medibills_types::{
    User, UserId,
    inputs::ProfilePatch,
    validation::{ValidationError, normalize_email, validate_email, validate_password, validate_username},
};
use serde_json::Value;
use tracing::info;

use crate::{
    cookies::{removal_cookie, session_cookie},
    envelope::Envelope,
    error::ApiResult,
    extract::JsonBody,
    fields::{Field, as_str, non_empty},
    middleware::{AuthenticatedSession, RequireAuth, RequireGuest},
    state::AppState,
};

const USERNAME: Field = Field::new("username", "Username must be between 3 and 50 characters");
const EMAIL: Field = Field::new("email", "Please provide a valid email address");
const PASSWORD: Field =
    Field::new("password", "Password must be at least 8 characters long");
const LOGIN: Field = Field::new("username", "Username or email is required");
const LOGIN_PASSWORD: Field = Field::new("password", "Password is required");
const CURRENT_PASSWORD: Field = Field::new("currentPassword", "Current password is required");
const NEW_PASSWORD: Field =
    Field::new("newPassword", "New password must be at least 8 characters long");

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me", get(me))
        .route("/password", put(update_password))
        .route("/profile", put(update_profile))
        .route("/account", delete(delete_account))
}

// ============================================================================
// Field parsers
// ============================================================================

fn username(field: &Field, value: &Value) -> Result<String, ValidationError> {
    let raw = as_str(field, value)?.trim();
    validate_username(raw)?;
    Ok(raw.to_owned())
}

fn email(field: &Field, value: &Value) -> Result<String, ValidationError> {
    let raw = as_str(field, value)?.trim();
    validate_email(field.name, raw)?;
    Ok(normalize_email(raw))
}

fn strong_password(
    label: &'static str,
) -> impl FnOnce(&Field, &Value) -> Result<String, ValidationError> {
    move |field, value| {
        let raw = as_str(field, value)?;
        validate_password(field.name, label, raw)?;
        Ok(raw.to_owned())
    }
}

// ============================================================================
// Handlers
// ============================================================================

async fn start_session(state: &AppState, jar: CookieJar, user: UserId) -> ApiResult<CookieJar> {
    let (token, _) = state.sessions.create(user).await?;
    Ok(jar.add(session_cookie(&state.settings.session, token)))
}

async fn register(
    State(state): State<AppState>,
    _guest: RequireGuest,
    jar: CookieJar,
    JsonBody(mut fields): JsonBody,
) -> ApiResult<(StatusCode, CookieJar, Json<Envelope<User>>)> {
    let username = fields.required(&USERNAME, username);
    let email = fields.required(&EMAIL, email);
    let password = fields.required(&PASSWORD, strong_password("Password"));
    let (username, email, password) = fields.finish(match (username, email, password) {
        (Some(u), Some(e), Some(p)) => Some((u, e, p)),
        _ => None,
    })?;

    let user = state.auth.register(username, email, password).await?;
    let jar = start_session(&state, jar, user.id).await?;
    info!(user = %user.id, "User registered");
    Ok((
        StatusCode::CREATED,
        jar,
        Json(Envelope::data(user).with_message("User registered successfully")),
    ))
}

async fn login(
    State(state): State<AppState>,
    _guest: RequireGuest,
    jar: CookieJar,
    JsonBody(mut fields): JsonBody,
) -> ApiResult<(CookieJar, Json<Envelope<User>>)> {
    let login = fields.required(&LOGIN, non_empty);
    let password = fields.required(&LOGIN_PASSWORD, non_empty);
    let (login, password) = fields.finish(login.zip(password))?;

    let user = state.auth.login(login.trim(), password).await?;
    let jar = start_session(&state, jar, user.id).await?;
    Ok((jar, Json(Envelope::data(user).with_message("Login successful"))))
}

async fn logout(
    State(state): State<AppState>,
    AuthenticatedSession(session): AuthenticatedSession,
    jar: CookieJar,
) -> ApiResult<(CookieJar, Json<Envelope<()>>)> {
    state.sessions.destroy(&session.token).await?;
    info!(user = %session.user_id, "User logged out");
    let jar = jar.add(removal_cookie(&state.settings.session));
    Ok((jar, Json(Envelope::message("Logout successful"))))
}

async fn me(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> ApiResult<Json<Envelope<User>>> {
    let user = state.auth.get_user(user).await?;
    Ok(Json(Envelope::data(user)))
}

async fn update_password(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    JsonBody(mut fields): JsonBody,
) -> ApiResult<Json<Envelope<()>>> {
    let current = fields.required(&CURRENT_PASSWORD, non_empty);
    let new = fields.required(&NEW_PASSWORD, strong_password("New password"));
    let (current, new) = fields.finish(current.zip(new))?;

    state.auth.update_password(user, current, new).await?;
    Ok(Json(Envelope::message("Password updated successfully")))
}

async fn update_profile(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    JsonBody(mut fields): JsonBody,
) -> ApiResult<Json<Envelope<User>>> {
    let patch = ProfilePatch {
        username: fields.patch(&USERNAME, username),
        email: fields.patch(&EMAIL, email),
    };
    let patch = fields.finish(Some(patch))?;

    let user = state.auth.update_profile(user, patch).await?;
    Ok(Json(Envelope::data(user).with_message("Profile updated successfully")))
}

async fn delete_account(
    State(state): State<AppState>,
    AuthenticatedSession(session): AuthenticatedSession,
    jar: CookieJar,
    JsonBody(mut fields): JsonBody,
) -> ApiResult<(CookieJar, Json<Envelope<()>>)> {
    let password = fields.required(&LOGIN_PASSWORD, non_empty);
    let password = fields.finish(password)?;

    state.auth.delete_account(session.user_id, password).await?;
    info!(user = %session.user_id, "Account deleted");
    let jar = jar.add(removal_cookie(&state.settings.session));
    Ok((jar, Json(Envelope::message("Account deleted successfully"))))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_email_is_normalized() {
        let parsed = email(&EMAIL, &json!("  Demo@Example.COM ")).unwrap();
        assert_eq!(parsed, "demo@example.com");
        assert!(email(&EMAIL, &json!("not-an-email")).is_err());
    }

    #[test]
    fn test_username_rules() {
        assert_eq!(username(&USERNAME, &json!("demo_1")).unwrap(), "demo_1");
        let err = username(&USERNAME, &json!("bad name")).unwrap_err();
        assert_eq!(err.constraint, "Username can only contain letters, numbers, and underscores");
        assert!(username(&USERNAME, &json!(42)).is_err());
    }

    #[test]
    fn test_password_label_in_message() {
        let err = strong_password("New password")(&NEW_PASSWORD, &json!("short")).unwrap_err();
        assert_eq!(err.field, "newPassword");
        assert_eq!(err.constraint, "New password must be at least 8 characters long");
    }
}
