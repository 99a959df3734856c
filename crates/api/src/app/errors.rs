use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use rolegate_auth::{AuthError, StoreError};
use rolegate_core::DomainError;

pub fn auth_error_to_response(err: AuthError) -> axum::response::Response {
    match err {
        AuthError::UserNotFound => json_error(StatusCode::NOT_FOUND, "not_found", "user not found"),
        AuthError::AccountDisabled | AuthError::BadCredentials => {
            let message = err.user_message();
            let code = err.login_failure().map(|f| f.code()).unwrap_or("unauthenticated");
            json_error(StatusCode::UNAUTHORIZED, code, message)
        }
        AuthError::RoleNotFound(id) => json_error(
            StatusCode::BAD_REQUEST,
            "role_not_found",
            format!("role not found with ID: {id}"),
        ),
        AuthError::RoleNameConflict(name) => json_error(
            StatusCode::CONFLICT,
            "conflict",
            format!("role already exists: {name}"),
        ),
        AuthError::EmailConflict(email) => json_error(
            StatusCode::CONFLICT,
            "conflict",
            format!("user already exists with email: {email}"),
        ),
        AuthError::Domain(DomainError::Validation(msg)) => {
            json_error(StatusCode::BAD_REQUEST, "validation_error", msg)
        }
        AuthError::Domain(DomainError::InvalidId(msg)) => {
            json_error(StatusCode::BAD_REQUEST, "invalid_id", msg)
        }
        AuthError::Domain(DomainError::InvariantViolation(msg)) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", msg)
        }
        AuthError::Store(StoreError::NotFound) => {
            json_error(StatusCode::NOT_FOUND, "not_found", "not found")
        }
        AuthError::Store(StoreError::UniqueViolation { field, value }) => json_error(
            StatusCode::CONFLICT,
            "conflict",
            format!("{field} already exists: {value}"),
        ),
        AuthError::Store(e) => {
            tracing::error!(error = %e, "credential store failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", "internal storage error")
        }
        AuthError::Hashing(e) => {
            tracing::error!(error = %e, "password hashing failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "hashing_error", "internal error")
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
