//! Session cookies captured from `Set-Cookie` headers.
//!
//! The store only tracks `name=value` pairs. A cookie that is already
//! expired, by `Max-Age` or by `Expires`, deletes any stored cookie of the
//! same name. `Max-Age` wins when both are present.

use cookie::time::{Duration, OffsetDateTime};
use cookie::Cookie;
use http::header::SET_COOKIE;
use http::HeaderMap;

/// One stored cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
}

impl SessionCookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

enum Directive {
    Store(SessionCookie),
    Delete(String),
}

fn is_expired(cookie: &Cookie<'_>, now: OffsetDateTime) -> bool {
    match cookie.max_age() {
        Some(age) => age <= Duration::ZERO,
        None => cookie.expires_datetime().is_some_and(|at| at <= now),
    }
}

fn parse_set_cookie(header: &str, now: OffsetDateTime) -> Option<Directive> {
    let cookie = match Cookie::parse(header) {
        Ok(cookie) => cookie,
        Err(e) => {
            tracing::debug!(error = %e, "ignoring malformed Set-Cookie header");
            return None;
        }
    };
    if is_expired(&cookie, now) {
        Some(Directive::Delete(cookie.name().to_string()))
    } else {
        Some(Directive::Store(SessionCookie::new(cookie.name(), cookie.value())))
    }
}

/// Cookies kept across calls, most recently stored last.
#[derive(Debug, Default)]
pub struct CookieStore {
    cookies: Vec<SessionCookie>,
}

impl CookieStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one `Set-Cookie` header value. A cookie with a known name
    /// replaces the old one and becomes the most recent.
    pub fn apply_set_cookie(&mut self, header: &str) {
        match parse_set_cookie(header, OffsetDateTime::now_utc()) {
            Some(Directive::Store(cookie)) => {
                self.cookies.retain(|c| c.name != cookie.name);
                self.cookies.push(cookie);
            }
            Some(Directive::Delete(name)) => self.cookies.retain(|c| c.name != name),
            None => {}
        }
    }

    /// Applies every `Set-Cookie` header of a response.
    pub fn apply_response_headers(&mut self, headers: &HeaderMap) {
        for value in headers.get_all(SET_COOKIE) {
            if let Ok(text) = value.to_str() {
                self.apply_set_cookie(text);
            }
        }
    }

    /// The most recently stored cookie.
    #[must_use]
    pub fn latest(&self) -> Option<&SessionCookie> {
        self.cookies.last()
    }

    /// `Cookie` request header value, or `None` when the store is empty.
    #[must_use]
    pub fn header_value(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        let pairs: Vec<String> = self
            .cookies
            .iter()
            .map(|c| format!("{}={}", c.name, c.value))
            .collect();
        Some(pairs.join("; "))
    }

    pub fn clear(&mut self) {
        self.cookies.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }
}
