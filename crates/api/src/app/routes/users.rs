//! Routes for any authenticated user (`/api/users`).

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};

use rolegate_auth::AuthError;

use crate::app::dto::{ApiResponse, RoleDto, UserDto};
use crate::app::errors::{auth_error_to_response, json_error};
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/current", get(current_user))
        .route("/roles", get(list_roles))
}

/// GET /api/users/current
pub async fn current_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<PrincipalContext>,
) -> Response {
    match services.accounts.get_user(ctx.principal().user_id()).await {
        Ok(user) => Json(ApiResponse::success(
            "Current user retrieved successfully",
            UserDto::from(&user),
        ))
        .into_response(),
        Err(AuthError::UserNotFound) => {
            json_error(StatusCode::NOT_FOUND, "not_found", "Current user not found")
        }
        Err(e) => auth_error_to_response(e),
    }
}

/// GET /api/users/roles
pub async fn list_roles(Extension(services): Extension<Arc<AppServices>>) -> Response {
    match services.roles().list().await {
        Ok(roles) => {
            let dtos: Vec<RoleDto> = roles.iter().map(RoleDto::from).collect();
            Json(ApiResponse::success("Roles retrieved successfully", dtos)).into_response()
        }
        Err(e) => auth_error_to_response(e),
    }
}
