//! Session cookie construction.

use axum_extra::extract::cookie::{Cookie, SameSite};
use medibills_types::config::SessionConfig;

/// Builds the cookie carrying a session token.
///
/// `Max-Age` equals the idle window; every authenticated response re-issues
/// the cookie so the browser's copy slides along with the server's.
pub(crate) fn session_cookie(config: &SessionConfig, token: String) -> Cookie<'static> {
    let max_age = time::Duration::try_from(config.idle_timeout).unwrap_or(time::Duration::DAY);
    let mut cookie = Cookie::build((config.cookie_name.clone(), token))
        .http_only(true)
        .path("/")
        .max_age(max_age)
        .build();
    if config.secure_cookies {
        cookie.set_same_site(SameSite::Strict);
        cookie.set_secure(true);
    } else {
        cookie.set_same_site(SameSite::Lax);
    }
    cookie
}

/// Builds the cookie that clears the session on the client.
pub(crate) fn removal_cookie(config: &SessionConfig) -> Cookie<'static> {
    let mut cookie = Cookie::build((config.cookie_name.clone(), "")).path("/").build();
    cookie.make_removal();
    cookie
}
