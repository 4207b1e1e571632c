//! Session cookie extraction.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum_extra::extract::cookie::{Cookie, CookieJar};
use tracing::debug;

use super::handlers::AppState;
use crate::security::WebUser;

/// The user behind a valid session cookie.
///
/// Rejects with 401 when the cookie is missing, unknown or expired. Each
/// successful extraction refreshes the session's idle clock.
#[derive(Debug, Clone)]
pub struct SessionUser(pub WebUser);

/// Reads the session token from the request cookies.
pub(crate) fn session_token(jar: &CookieJar, state: &AppState) -> Option<String> {
    jar.get(&state.config.session_cookie_name)
        .map(Cookie::value)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl FromRequestParts<AppState> for SessionUser {
    type Rejection = StatusCode;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let Some(token) = session_token(&jar, state) else {
            debug!("no session cookie");
            return Err(StatusCode::UNAUTHORIZED);
        };
        state.sessions.validate(&token).map(Self).ok_or_else(|| {
            debug!("session cookie does not match a live session");
            StatusCode::UNAUTHORIZED
        })
    }
}
