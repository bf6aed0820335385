use std::{net::SocketAddr, sync::Arc};

use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod auth;
mod config;
mod errors;
mod middleware;
mod models;
mod routes;
mod state;

use auth::provider::GoTrueProvider;
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Logging ───────────────────────────────────────────────
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // ── Config ────────────────────────────────────────────────
    let config = config::Config::from_env()?;
    tracing::info!(env = %config.app_env, "Starting site gate");

    // ── Identity provider ─────────────────────────────────────
    let provider = GoTrueProvider::from_config(&config)?;
    tracing::info!(
        url = %config.supabase_url,
        timeout = ?config.provider_timeout,
        role_claim = %config.role_claim,
        "Identity provider configured"
    );

    let addr: SocketAddr = format!("{}:{}", config.backend_host, config.backend_port).parse()?;
    let app_state = AppState { provider: Arc::new(provider), config };

    // ── Router ────────────────────────────────────────────────
    let app = routes::all_routes(app_state).layer(TraceLayer::new_for_http());
    tracing::info!(%addr, "Listening");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
