use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use chrono::Utc;

use rolegate_auth::{decide, Decision, DenyReason, HttpMethod};

use crate::app::errors::{auth_error_to_response, json_error};
use crate::app::services::AppServices;
use crate::context::PrincipalContext;
use crate::cookies;

/// Resolve the session principal and apply the route table to every request.
///
/// Allowed requests continue with a [`PrincipalContext`] extension when a
/// principal is present.
pub async fn access_middleware(
    State(services): State<Arc<AppServices>>,
    mut req: Request,
    next: Next,
) -> Response {
    let path = req.uri().path().to_string();
    let Ok(method) = req.method().as_str().parse::<HttpMethod>() else {
        return json_error(StatusCode::BAD_REQUEST, "rejected", "unsupported method");
    };

    let context = match resolve_principal(&services, req.headers()).await {
        Ok(context) => context,
        // Without the store only paths open to anonymous callers can proceed.
        Err(response) => match decide(None, method, &path) {
            Decision::Allow => None,
            Decision::Deny(_) => return response,
        },
    };

    match decide(context.as_ref().map(|c| c.principal()), method, &path) {
        Decision::Allow => {
            if let Some(context) = context {
                req.extensions_mut().insert(context);
            }
            next.run(req).await
        }
        Decision::Deny(reason) => {
            tracing::info!(%method, path = %path, reason = ?reason, "request denied");
            deny_response(reason, &path)
        }
    }
}

async fn resolve_principal(
    services: &AppServices,
    headers: &axum::http::HeaderMap,
) -> Result<Option<PrincipalContext>, Response> {
    let Some(session_id) = cookies::session_id(headers) else {
        return Ok(None);
    };
    let Some(claims) = services.sessions.lookup(&session_id, Utc::now()) else {
        return Ok(None);
    };

    match services.authenticator.load_principal(claims.user_id).await {
        Ok(Some(principal)) => Ok(Some(PrincipalContext::new(principal, session_id))),
        Ok(None) => {
            // The account was deleted while the session was open.
            services.sessions.revoke(&session_id);
            Ok(None)
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to load session principal");
            Err(auth_error_to_response(e))
        }
    }
}

fn deny_response(reason: DenyReason, path: &str) -> Response {
    let api = path == "/api" || path.starts_with("/api/");
    match reason {
        DenyReason::Unauthenticated if api => json_error(
            StatusCode::UNAUTHORIZED,
            "unauthenticated",
            "authentication required",
        ),
        DenyReason::Unauthenticated => Redirect::to("/login").into_response(),
        DenyReason::Forbidden | DenyReason::NoMatchingRule => {
            json_error(StatusCode::FORBIDDEN, "forbidden", "access denied")
        }
        DenyReason::Rejected => json_error(
            StatusCode::BAD_REQUEST,
            "rejected",
            "the request was rejected because the URL was not normalized",
        ),
    }
}
