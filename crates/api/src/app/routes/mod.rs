use axum::{
    routing::{get, post},
    Router,
};

pub mod admin;
pub mod login;
pub mod system;
pub mod users;

/// Router for everything behind the access middleware.
pub fn router() -> Router {
    Router::new()
        .route("/login", get(login::login_page).post(login::login_form))
        .route("/logout", get(login::logout).post(login::logout))
        .route("/api/login", post(login::api_login))
        .route("/admin", get(system::admin_home))
        .route("/user", get(system::user_home))
        .route("/whoami", get(system::whoami))
        .nest("/api/admin", admin::router())
        .nest("/api/users", users::router())
}
