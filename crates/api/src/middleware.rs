//! Session resolution, guard extractors, and error-detail rendering.
//!
//! [`resolve_session`] runs before every handler. It looks up the session
//! cookie, slides the session's expiry, and attaches a [`SessionIdentity`] to
//! the request. Handlers then state their requirement through an extractor:
//!
//! - [`RequireAuth`]: 401 unless a session is attached
//! - [`RequireGuest`]: 400 if a session is attached
//! - [`AuthenticatedSession`]: like `RequireAuth`, but also yields the token

use axum::{
    Json,
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{HeaderValue, header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::{CookieJar, cookie::Cookie};
use medibills_types::UserId;
use tracing::debug;

use crate::{
    cookies::{removal_cookie, session_cookie},
    envelope::Envelope,
    error::{ApiError, INTERNAL_ERROR_MESSAGE, InternalErrorDetail},
    state::AppState,
};

/// The session attached to a request.
#[derive(Debug, Clone)]
pub struct SessionIdentity {
    /// Owner of the session.
    pub user_id: UserId,
    /// The raw token from the cookie.
    pub token: String,
}

/// Middleware resolving the session cookie into a [`SessionIdentity`].
///
/// A live session has its cookie re-issued on the way out unless the handler
/// set its own. A cookie naming an unknown or expired session is cleared.
pub async fn resolve_session(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Response {
    let token = jar.get(&state.settings.session.cookie_name).map(|c| c.value().to_string());

    let mut refresh = None;
    let mut stale = false;
    if let Some(token) = token.filter(|t| !t.is_empty()) {
        match state.sessions.resolve(&token).await {
            Ok(Some(session)) => {
                req.extensions_mut()
                    .insert(SessionIdentity { user_id: session.user_id, token: token.clone() });
                refresh = Some(token);
            },
            Ok(None) => {
                debug!("Session cookie does not name a live session");
                stale = true;
            },
            Err(e) => return ApiError::from(e).into_response(),
        }
    }

    let mut response = next.run(req).await;
    if response.headers().contains_key(header::SET_COOKIE) {
        return response;
    }
    let cookie = match (refresh, stale) {
        (Some(token), _) => Some(session_cookie(&state.settings.session, token)),
        (None, true) => Some(removal_cookie(&state.settings.session)),
        (None, false) => None,
    };
    if let Some(cookie) = cookie {
        append_cookie(&mut response, &cookie);
    }
    response
}

fn append_cookie(response: &mut Response, cookie: &Cookie<'_>) {
    if let Ok(value) = HeaderValue::from_str(&cookie.to_string()) {
        response.headers_mut().append(header::SET_COOKIE, value);
    }
}

/// Middleware re-rendering suppressed 500 bodies with the real message when
/// the environment allows it.
pub async fn expose_error_details(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let mut response = next.run(req).await;
    if !state.settings.environment.exposes_error_details() {
        return response;
    }
    match response.extensions_mut().remove::<InternalErrorDetail>() {
        Some(InternalErrorDetail(detail)) => (
            response.status(),
            Json(Envelope::failure(INTERNAL_ERROR_MESSAGE).with_message(detail)),
        )
            .into_response(),
        None => response,
    }
}

// ============================================================================
// Guards
// ============================================================================

/// Rejects the request with 401 unless a session is attached.
#[derive(Debug, Clone, Copy)]
pub struct RequireAuth(pub UserId);

#[async_trait]
impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<SessionIdentity>()
            .map(|identity| Self(identity.user_id))
            .ok_or(ApiError::Unauthenticated)
    }
}

/// Rejects the request with 400 if a session is attached.
#[derive(Debug, Clone, Copy)]
pub struct RequireGuest;

#[async_trait]
impl<S> FromRequestParts<S> for RequireGuest
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if parts.extensions.get::<SessionIdentity>().is_some() {
            return Err(ApiError::AlreadyAuthenticated);
        }
        Ok(Self)
    }
}

/// The full session identity, for handlers that end the session.
#[derive(Debug, Clone)]
pub struct AuthenticatedSession(pub SessionIdentity);

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedSession
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<SessionIdentity>()
            .cloned()
            .map(Self)
            .ok_or(ApiError::Unauthenticated)
    }
}
