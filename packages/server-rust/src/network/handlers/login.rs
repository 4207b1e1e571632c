//! Credential exchange and session teardown.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Form;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use opcall_core::protocol::{MAX_CREDENTIAL_LENGTH, PASSWORD_PARAM, USERNAME_PARAM};
use opcall_core::{validate_text, Params};
use tracing::{debug, error, info, warn};

use super::AppState;
use crate::network::auth::session_token;

/// `POST {login_path}`: checks `tfUsername`/`tfPassword` and opens a session.
///
/// | outcome | status |
/// |---|---|
/// | field missing, empty or longer than 45 chars | 412 |
/// | unknown user or wrong password | 401 |
/// | verifier failure or post-login veto | 500 |
/// | success | 200 with the session cookie |
///
/// Any session already attached to the request is ended first.
pub async fn login_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(fields): Form<Vec<(String, String)>>,
) -> Response {
    let params: Params = fields.into_iter().collect();
    let username = params.get(USERNAME_PARAM);
    let password = params.get(PASSWORD_PARAM);

    if !validate_text(username, USERNAME_PARAM, true, MAX_CREDENTIAL_LENGTH)
        || !validate_text(password, PASSWORD_PARAM, true, MAX_CREDENTIAL_LENGTH)
    {
        return StatusCode::PRECONDITION_FAILED.into_response();
    }
    let (Some(username), Some(password)) = (username, password) else {
        return StatusCode::PRECONDITION_FAILED.into_response();
    };

    if let Some(previous) = session_token(&jar, &state) {
        state.sessions.invalidate(&previous);
    }

    let user = match state.verifier.find_user(username, password).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            warn!(username, "login rejected");
            return StatusCode::UNAUTHORIZED.into_response();
        }
        Err(e) => {
            error!(username, error = %e, "credential lookup failed");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    match state.verifier.post_login(&user).await {
        Ok(true) => {}
        Ok(false) => {
            warn!(username, "post-login processing vetoed the session");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
        Err(e) => {
            error!(username, error = %e, "post-login processing failed");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    }

    let token = state.sessions.create(user);
    info!(username, "login succeeded");
    let cookie = Cookie::build((state.config.session_cookie_name.clone(), token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.config.tls.is_some());
    (jar.add(cookie), StatusCode::OK).into_response()
}

/// `POST {logout_path}`: ends the current session, if any, and clears the
/// cookie. Always 200.
pub async fn logout_handler(State(state): State<AppState>, jar: CookieJar) -> Response {
    if let Some(token) = session_token(&jar, &state) {
        let existed = state.sessions.invalidate(&token);
        debug!(existed, "logout");
    }
    let removal = Cookie::build((state.config.session_cookie_name.clone(), "")).path("/");
    (jar.remove(removal), StatusCode::OK).into_response()
}
