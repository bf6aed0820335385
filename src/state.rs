//! Shared application state — injected into every handler via `axum::extract::State`.

use std::sync::Arc;

use crate::{auth::provider::IdentityProvider, config::Config};

/// Application-wide state passed via axum `State<AppState>`.
///
/// The provider sits behind an `Arc<dyn _>` so the middleware and handlers
/// share one HTTP client, and tests can swap in an in-memory provider.
#[derive(Clone)]
pub struct AppState {
    pub provider: Arc<dyn IdentityProvider>,
    pub config:   Config,
}
