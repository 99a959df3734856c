//! Login and logout.
//!
//! The form flow answers with redirects like a server-rendered login page;
//! `/api/login` is the JSON variant over the same authenticator.

use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Form, Json,
};
use chrono::Utc;
use serde_json::json;

use rolegate_auth::{AuthError, LoginFailure, Principal, ROLE_ADMIN};

use crate::app::dto::{ApiResponse, LoginForm, LoginPageQuery, LoginRequest};
use crate::app::errors::{auth_error_to_response, json_error};
use crate::app::services::AppServices;
use crate::cookies::{self, LOGIN_ERROR_COOKIE, SESSION_COOKIE};

/// Where a freshly logged-in principal lands.
pub fn landing_path(principal: &Principal) -> &'static str {
    if principal.has_authority(&ROLE_ADMIN) {
        "/admin"
    } else {
        "/user"
    }
}

/// GET /login - report the pending login error (if any).
pub async fn login_page(
    Extension(services): Extension<Arc<AppServices>>,
    headers: HeaderMap,
    Query(query): Query<LoginPageQuery>,
) -> Response {
    let error = query.error.as_ref().map(|_| {
        cookies::read(&headers, LOGIN_ERROR_COOKIE)
            .and_then(|code| LoginFailure::from_code(&code))
            .unwrap_or(LoginFailure::InvalidCredentials)
            .message()
    });

    let mut response = Json(json!({
        "error": error,
        "loggedOut": query.logout.is_some(),
    }))
    .into_response();
    if error.is_some() {
        cookies::set(
            response.headers_mut(),
            &services.cookies.removal(LOGIN_ERROR_COOKIE),
        );
    }
    response
}

/// POST /login - form login.
pub async fn login_form(
    Extension(services): Extension<Arc<AppServices>>,
    Form(form): Form<LoginForm>,
) -> Response {
    match services
        .authenticator
        .authenticate(&form.username, &form.password)
        .await
    {
        Ok(principal) => {
            let mut response = Redirect::to(landing_path(&principal)).into_response();
            start_session(&services, &principal, response.headers_mut());
            response
        }
        Err(err) => match err.login_failure() {
            Some(failure) => {
                let mut response = Redirect::to("/login?error").into_response();
                cookies::set(response.headers_mut(), &services.cookies.login_error(failure));
                response
            }
            None => auth_error_to_response(err),
        },
    }
}

/// POST /api/login - JSON login.
pub async fn api_login(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<LoginRequest>,
) -> Response {
    match services
        .authenticator
        .authenticate(&body.email, &body.password)
        .await
    {
        Ok(principal) => {
            let mut response = (
                StatusCode::OK,
                Json(ApiResponse::success("Login successful", principal.view())),
            )
                .into_response();
            start_session(&services, &principal, response.headers_mut());
            response
        }
        Err(err @ (AuthError::UserNotFound | AuthError::BadCredentials | AuthError::AccountDisabled)) => {
            let failure = err.login_failure().unwrap_or(LoginFailure::InvalidCredentials);
            json_error(StatusCode::UNAUTHORIZED, failure.code(), failure.message())
        }
        Err(err) => auth_error_to_response(err),
    }
}

/// POST /logout - end the session and return to the login page.
pub async fn logout(Extension(services): Extension<Arc<AppServices>>, headers: HeaderMap) -> Response {
    if let Some(session_id) = cookies::session_id(&headers) {
        if services.sessions.revoke(&session_id) {
            tracing::info!("session closed");
        }
    }
    let mut response = Redirect::to("/login?logout").into_response();
    cookies::set(response.headers_mut(), &services.cookies.removal(SESSION_COOKIE));
    response
}

fn start_session(services: &AppServices, principal: &Principal, headers: &mut HeaderMap) {
    let claims = services
        .sessions
        .create(principal.user_id(), principal.identifier(), Utc::now());
    cookies::set(headers, &services.cookies.session(claims.session_id));
    cookies::set(headers, &services.cookies.removal(LOGIN_ERROR_COOKIE));
}
