use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::app::errors::json_error;
use crate::context::PrincipalContext;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(Extension(ctx): Extension<PrincipalContext>) -> impl IntoResponse {
    Json(ctx.principal().view())
}

/// Landing page after an administrator logs in.
pub async fn admin_home(Extension(ctx): Extension<PrincipalContext>) -> impl IntoResponse {
    Json(json!({ "area": "admin", "principal": ctx.principal().view() }))
}

/// Landing page after a regular user logs in.
pub async fn user_home(Extension(ctx): Extension<PrincipalContext>) -> impl IntoResponse {
    Json(json!({ "area": "user", "principal": ctx.principal().view() }))
}

pub async fn not_found() -> Response {
    json_error(StatusCode::NOT_FOUND, "not_found", "no such resource")
}
