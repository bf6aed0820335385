//! Session middleware.
//!
//! Runs on every matched request: refreshes the session from cookies,
//! resolves the caller's role, applies the route policy, and either
//! forwards the request or redirects. Rotated session cookies ride on
//! whichever response goes out, redirects included.

use axum::{
    extract::{Request, State},
    http::{header::LOCATION, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{
    auth::{cookies::RequestCookies, role::role_from_session, session::SessionClient},
    middleware::route_policy::{self, AccessRequest, Verdict, HOME_PATH},
    models::{AuthContext, RoleInfo},
    state::AppState,
};

/// Middleware: resolve the session and enforce the route policy.
/// On pass-through, inserts `AuthContext` into request extensions.
pub async fn update_session(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    // Policy decisions use the path as the file server will resolve it.
    let path = route_policy::normalize_path(req.uri().path());
    if !route_policy::middleware_applies(&path) {
        return next.run(req).await;
    }
    let query = req.uri().query().map(str::to_owned);

    let mut client = SessionClient::from_state(&state, RequestCookies::from_headers(req.headers()));

    let user = match client.get_user().await {
        Ok(user) => user,
        Err(err) => {
            tracing::warn!(error = %err, %path, "Session lookup failed; continuing unauthenticated");
            None
        }
    };

    // Without a provider-confirmed identity the token's claims mean nothing.
    let role = if user.is_some() {
        role_from_session(&mut client, &state.config.role_claim, state.config.is_development()).await
    } else {
        RoleInfo::none()
    };
    let cookies = client.into_cookies();

    let verdict = route_policy::authorize(&AccessRequest {
        path:              &path,
        has_identity:      user.is_some(),
        role:              &role,
        callback_to_admin: route_policy::callback_targets_admin(&path, query.as_deref()),
    });

    let mut response = match verdict.location(query.as_deref()) {
        None => {
            cookies.write_request_header(req.headers_mut());
            req.extensions_mut().insert(AuthContext { user, role });
            next.run(req).await
        }
        Some(location) => {
            match &verdict {
                Verdict::RedirectLogin { .. } => {
                    tracing::warn!(%path, "Access denied: unauthenticated request to protected route");
                }
                _ => {
                    let user_id = user.as_ref().map_or("-", |u| u.id.as_str());
                    tracing::warn!(user = user_id, role = %role.role, %path, "Access denied: admin role required");
                }
            }
            found(&location)
        }
    };

    cookies.apply_to_response(response.headers_mut());
    response
}

/// `302 Found` to a same-site location. Falls back to the home page if
/// `location` cannot be carried in a header.
pub fn found(location: &str) -> Response {
    let value = HeaderValue::from_str(location).unwrap_or_else(|_| HeaderValue::from_static(HOME_PATH));
    (StatusCode::FOUND, [(LOCATION, value)]).into_response()
}
