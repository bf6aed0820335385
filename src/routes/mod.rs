use axum::{middleware, Router};
use tower_cookies::CookieManagerLayer;
use tower_http::services::ServeDir;

use crate::{middleware::auth_guard::update_session, state::AppState};

mod auth;

/// Build the full site router.
///
/// Auth routes are handled here; every other path falls through to the
/// pre-rendered pages in `SITE_DIR`. All of it sits behind [`guarded`].
pub fn all_routes(state: AppState) -> Router {
    let site = ServeDir::new(&state.config.site_dir);
    guarded(
        Router::new()
            .merge(auth::router())
            .fallback_service(site),
        state,
    )
}

/// Wrap `routes` in the session middleware.
///
/// The cookie manager sits inside the middleware so handlers' `Cookies`
/// are parsed from the refreshed `Cookie` header, not the stale inbound one.
pub fn guarded(routes: Router<AppState>, state: AppState) -> Router {
    let session_mw = middleware::from_fn_with_state(state.clone(), update_session);
    routes
        .layer(CookieManagerLayer::new())
        .layer(session_mw)
        .with_state(state)
}
