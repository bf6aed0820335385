use axum::{
    extract::{Query, Request, State},
    http::{header::ACCEPT, HeaderMap},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tower_cookies::Cookies;

use crate::{
    auth::{cookies::HandlerCookies, role::decode_role, session::SessionClient},
    errors::{AppError, AppResult},
    middleware::{
        auth_guard::found,
        route_policy::{self, AccessRequest, Verdict, ADMIN_PREFIX, AUTH_CALLBACK_PATH, HOME_PATH},
    },
    models::AuthContext,
    state::AppState,
};

/// Where a completed login lands when the callback names no destination.
const DEFAULT_NEXT: &str = "/admin";

#[derive(Deserialize)]
struct CallbackQuery {
    code: Option<String>,
    next: Option<String>,
}

// ── Router ────────────────────────────────────────────────────

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/callback", get(callback))
        .route("/auth/signout",  post(signout))
        .route("/auth/me",       get(me))
}

// ── Handlers ──────────────────────────────────────────────────

/// GET /auth/callback — finish a login and bounce to `next`.
async fn callback(
    State(state): State<AppState>,
    cookies: Cookies,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let next = same_site_path(query.next.as_deref()).unwrap_or(DEFAULT_NEXT).to_owned();

    if let Some(code) = query.code.as_deref() {
        let mut client = SessionClient::from_state(&state, HandlerCookies(cookies));
        match client.exchange_code(code).await {
            Ok(session) => {
                let role = decode_role(&session.access_token, &state.config.role_claim);
                let verdict = route_policy::authorize(&AccessRequest {
                    path:              AUTH_CALLBACK_PATH,
                    has_identity:      true,
                    role:              &role,
                    callback_to_admin: next.starts_with(ADMIN_PREFIX),
                });
                if verdict == Verdict::RedirectHome {
                    tracing::warn!(role = %role.role, %next, "Access denied: admin requested after login");
                    return found(HOME_PATH);
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "Auth code exchange failed");
            }
        }
    }

    found(&next)
}

/// POST /auth/signout — end the session. JSON for fetch callers, a redirect
/// home for form posts.
async fn signout(
    State(state): State<AppState>,
    cookies: Cookies,
    headers: HeaderMap,
) -> Response {
    let mut client = SessionClient::from_state(&state, HandlerCookies(cookies));
    client.sign_out().await;

    let wants_json = headers
        .get(ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|accept| accept.contains("application/json"));

    if wants_json {
        Json(serde_json::json!({
            "success": true,
            "message": "Successfully signed out",
        }))
        .into_response()
    } else {
        found(HOME_PATH)
    }
}

/// GET /auth/me — who the session middleware resolved for this request.
async fn me(req: Request) -> AppResult<Json<AuthContext>> {
    let ctx = req.extensions().get::<AuthContext>().cloned().ok_or_else(|| {
        AppError::Internal(anyhow::anyhow!("session middleware is not layered on /auth/me"))
    })?;
    if ctx.user.is_none() {
        return Err(AppError::Unauthorized);
    }
    Ok(Json(ctx))
}

// ── Internal helpers ──────────────────────────────────────────

/// Only same-site absolute paths are followed after login.
fn same_site_path(next: Option<&str>) -> Option<&str> {
    next.filter(|p| p.starts_with('/') && !p.starts_with("//") && !p.contains('\\'))
}
