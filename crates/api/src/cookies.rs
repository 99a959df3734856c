//! Session and login-flash cookies.

use axum::http::{header, HeaderMap, HeaderValue};
use cookie::{Cookie, SameSite};

use rolegate_auth::{LoginFailure, SessionId};

/// HttpOnly cookie holding the session id.
pub const SESSION_COOKIE: &str = "ROLEGATE_SESSION";

/// Short-lived cookie telling the login page which failure to show.
pub const LOGIN_ERROR_COOKIE: &str = "ROLEGATE_LOGIN_ERROR";

const LOGIN_ERROR_MAX_AGE_SECONDS: i64 = 60;

/// Attributes shared by every cookie the service sets.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CookiePolicy {
    pub secure: bool,
    pub session_max_age_minutes: i64,
}

impl CookiePolicy {
    fn base(&self, name: &'static str, value: String) -> cookie::CookieBuilder<'static> {
        Cookie::build((name, value))
            .path("/")
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
    }

    pub fn session(&self, id: SessionId) -> Cookie<'static> {
        self.base(SESSION_COOKIE, id.to_string())
            .max_age(cookie::time::Duration::minutes(self.session_max_age_minutes))
            .build()
    }

    pub fn login_error(&self, failure: LoginFailure) -> Cookie<'static> {
        self.base(LOGIN_ERROR_COOKIE, failure.code().to_string())
            .max_age(cookie::time::Duration::seconds(LOGIN_ERROR_MAX_AGE_SECONDS))
            .build()
    }

    /// Expire `name` in the browser.
    pub fn removal(&self, name: &'static str) -> Cookie<'static> {
        self.base(name, String::new())
            .max_age(cookie::time::Duration::ZERO)
            .build()
    }
}

/// Value of the first request cookie called `name`.
pub fn read(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|c| c.name() == name)
        .map(|c| c.value().to_string())
}

pub fn session_id(headers: &HeaderMap) -> Option<SessionId> {
    read(headers, SESSION_COOKIE)?.parse().ok()
}

/// Append a `Set-Cookie` header.
pub fn set(headers: &mut HeaderMap, cookie: &Cookie<'_>) {
    match HeaderValue::from_str(&cookie.to_string()) {
        Ok(value) => {
            headers.append(header::SET_COOKIE, value);
        }
        Err(e) => tracing::warn!(cookie = cookie.name(), error = %e, "cookie not representable as a header"),
    }
}
