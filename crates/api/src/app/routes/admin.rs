//! Admin routes for account and role management.
//!
//! Everything here sits under `/api/admin`, which the route table reserves
//! for `ROLE_ADMIN`.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, put},
    Json, Router,
};

use rolegate_auth::{explain, AuthError, HttpMethod, Principal};
use rolegate_core::{RoleId, UserId};

use crate::app::dto::{
    ApiResponse, CreateUserRequest, DashboardStats, ExplainQuery, RoleDto, RoleRequest,
    UpdateUserRequest, UserDto,
};
use crate::app::errors::{auth_error_to_response, json_error};
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

// ─────────────────────────────────────────────────────────────────────────────
// Router
// ─────────────────────────────────────────────────────────────────────────────

pub fn router() -> Router {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/:id", get(get_user).put(update_user).delete(delete_user))
        .route("/users/:id/enable", put(enable_user))
        .route("/users/:id/disable", put(disable_user))
        .route("/current-user", get(current_user))
        .route("/roles", get(list_roles).post(create_role))
        .route("/roles/:id", put(update_role).delete(delete_role))
        .route("/dashboard/stats", get(dashboard_stats))
        .route("/access/explain", get(explain_access))
}

// ─────────────────────────────────────────────────────────────────────────────
// Users
// ─────────────────────────────────────────────────────────────────────────────

/// GET /api/admin/users
pub async fn list_users(Extension(services): Extension<Arc<AppServices>>) -> Response {
    match services.accounts.list_users().await {
        Ok(users) => {
            let dtos: Vec<UserDto> = users.iter().map(UserDto::from).collect();
            Json(ApiResponse::success("Users retrieved successfully", dtos)).into_response()
        }
        Err(e) => auth_error_to_response(e),
    }
}

/// POST /api/admin/users
pub async fn create_user(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<CreateUserRequest>,
) -> Response {
    let account = match body.into_account() {
        Ok(account) => account,
        Err(e) => return auth_error_to_response(e.into()),
    };
    match services.accounts.create_user(account).await {
        Ok(user) => (
            StatusCode::CREATED,
            Json(ApiResponse::success("User created successfully", UserDto::from(&user))),
        )
            .into_response(),
        Err(e) => auth_error_to_response(e),
    }
}

/// GET /api/admin/users/:id
pub async fn get_user(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<i64>,
) -> Response {
    match services.accounts.get_user(UserId::new(id)).await {
        Ok(user) => {
            Json(ApiResponse::success("User retrieved successfully", UserDto::from(&user))).into_response()
        }
        Err(AuthError::UserNotFound) => user_not_found(id),
        Err(e) => auth_error_to_response(e),
    }
}

/// PUT /api/admin/users/:id
pub async fn update_user(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateUserRequest>,
) -> Response {
    let id = UserId::new(id);
    let current = match services.accounts.get_user(id).await {
        Ok(user) => user,
        Err(AuthError::UserNotFound) => return user_not_found(id.get()),
        Err(e) => return auth_error_to_response(e),
    };
    let update = match body.into_update(current.is_active) {
        Ok(update) => update,
        Err(e) => return auth_error_to_response(e.into()),
    };

    match services.accounts.update_user(id, update).await {
        Ok(user) => {
            if !user.is_active {
                services.sessions.revoke_user(user.id);
            }
            Json(ApiResponse::success("User updated successfully", UserDto::from(&user))).into_response()
        }
        Err(AuthError::UserNotFound) => user_not_found(id.get()),
        Err(e) => auth_error_to_response(e),
    }
}

/// DELETE /api/admin/users/:id
pub async fn delete_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<PrincipalContext>,
    Path(id): Path<i64>,
) -> Response {
    let id = UserId::new(id);
    if id == ctx.principal().user_id() {
        return json_error(
            StatusCode::CONFLICT,
            "conflict",
            "administrators cannot delete their own account",
        );
    }
    match services.accounts.delete_user(id).await {
        Ok(()) => {
            services.sessions.revoke_user(id);
            Json(ApiResponse::success(
                "User deleted successfully",
                format!("User with ID {id} has been deleted"),
            ))
            .into_response()
        }
        Err(AuthError::UserNotFound) => user_not_found(id.get()),
        Err(e) => auth_error_to_response(e),
    }
}

/// PUT /api/admin/users/:id/enable
pub async fn enable_user(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<i64>,
) -> Response {
    set_active(&services, id, true).await
}

/// PUT /api/admin/users/:id/disable
pub async fn disable_user(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<i64>,
) -> Response {
    set_active(&services, id, false).await
}

async fn set_active(services: &AppServices, id: i64, active: bool) -> Response {
    match services.accounts.set_active(UserId::new(id), active).await {
        Ok(user) => {
            if !active {
                services.sessions.revoke_user(user.id);
            }
            let message = if active {
                "User enabled successfully"
            } else {
                "User disabled successfully"
            };
            Json(ApiResponse::success(message, UserDto::from(&user))).into_response()
        }
        Err(AuthError::UserNotFound) => user_not_found(id),
        Err(e) => auth_error_to_response(e),
    }
}

/// GET /api/admin/current-user
pub async fn current_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<PrincipalContext>,
) -> Response {
    match services.accounts.current_user(ctx.principal().identifier()).await {
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

/// GET /api/admin/dashboard/stats
pub async fn dashboard_stats(Extension(services): Extension<Arc<AppServices>>) -> Response {
    let users = match services.accounts.list_users().await {
        Ok(users) => users,
        Err(e) => return auth_error_to_response(e),
    };
    let roles = match services.roles().list().await {
        Ok(roles) => roles,
        Err(e) => return auth_error_to_response(e),
    };

    let admin_users = users.iter().filter(|u| u.has_role("ADMIN")).count();
    let stats = DashboardStats {
        total_users: users.len(),
        admin_users,
        regular_users: users.len() - admin_users,
        active_users: users.iter().filter(|u| u.is_active).count(),
        total_roles: roles.len(),
    };
    Json(ApiResponse::success("Dashboard statistics retrieved successfully", stats)).into_response()
}

fn user_not_found(id: i64) -> Response {
    json_error(
        StatusCode::NOT_FOUND,
        "not_found",
        format!("User not found with ID: {id}"),
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// Roles
// ─────────────────────────────────────────────────────────────────────────────

/// GET /api/admin/roles
pub async fn list_roles(Extension(services): Extension<Arc<AppServices>>) -> Response {
    match services.roles().list().await {
        Ok(roles) => {
            let dtos: Vec<RoleDto> = roles.iter().map(RoleDto::from).collect();
            Json(ApiResponse::success("Roles retrieved successfully", dtos)).into_response()
        }
        Err(e) => auth_error_to_response(e),
    }
}

/// POST /api/admin/roles
pub async fn create_role(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<RoleRequest>,
) -> Response {
    match services.roles().create(&body.name, body.description).await {
        Ok(role) => (
            StatusCode::CREATED,
            Json(ApiResponse::success("Role created successfully", RoleDto::from(&role))),
        )
            .into_response(),
        Err(e) => auth_error_to_response(e),
    }
}

/// PUT /api/admin/roles/:id
pub async fn update_role(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<i64>,
    Json(body): Json<RoleRequest>,
) -> Response {
    match services
        .roles()
        .update(RoleId::new(id), &body.name, body.description)
        .await
    {
        Ok(role) => Json(ApiResponse::success("Role updated successfully", RoleDto::from(&role))).into_response(),
        Err(AuthError::RoleNotFound(id)) => role_not_found(id),
        Err(e) => auth_error_to_response(e),
    }
}

/// DELETE /api/admin/roles/:id
///
/// Holders lose the role's authority on their next request.
pub async fn delete_role(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<i64>,
) -> Response {
    let id = RoleId::new(id);
    match services.roles().delete(id).await {
        Ok(()) => Json(ApiResponse::success(
            "Role deleted successfully",
            format!("Role with ID {id} has been deleted"),
        ))
        .into_response(),
        Err(AuthError::RoleNotFound(id)) => role_not_found(id),
        Err(e) => auth_error_to_response(e),
    }
}

fn role_not_found(id: RoleId) -> Response {
    json_error(
        StatusCode::NOT_FOUND,
        "not_found",
        format!("Role not found with ID: {id}"),
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// Access audit
// ─────────────────────────────────────────────────────────────────────────────

/// GET /api/admin/access/explain?path=/admin&method=GET[&userId=2|&anonymous=true]
pub async fn explain_access(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<PrincipalContext>,
    Query(query): Query<ExplainQuery>,
) -> Response {
    let method = match query.method.as_deref().unwrap_or("GET").parse::<HttpMethod>() {
        Ok(method) => method,
        Err(e) => return json_error(StatusCode::BAD_REQUEST, "validation_error", e.to_string()),
    };

    let subject: Option<Principal> = if query.anonymous {
        None
    } else if let Some(user_id) = query.user_id {
        match services.authenticator.load_principal(UserId::new(user_id)).await {
            Ok(Some(principal)) => Some(principal),
            Ok(None) => return user_not_found(user_id),
            Err(e) => return auth_error_to_response(e),
        }
    } else {
        Some(ctx.principal().clone())
    };

    let explanation = explain(subject.as_ref(), method, &query.path);
    Json(ApiResponse::success("Access decision explained", explanation)).into_response()
}
