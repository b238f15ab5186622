//! Dashboard: read-only JSON status API served by Axum.
//!
//! CORS enabled for local development.

pub mod routes;

use anyhow::{Context, Result};
use axum::{
    http::{header, Method},
    routing::get,
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

pub use routes::{AppState, DashboardState};

/// Bind and serve in a background task. Returns once the port is bound.
pub async fn spawn_dashboard(state: AppState, port: u16) -> Result<()> {
    let app = build_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context(format!("Failed to bind dashboard port {port}"))?;
    info!(port, "Dashboard server starting on http://localhost:{port}");

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "Dashboard server error");
        }
    });
    Ok(())
}

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(routes::health))
        .route("/api/status", get(routes::get_status))
        .route("/api/portfolio", get(routes::get_portfolio))
        .route("/api/portfolio/history", get(routes::get_portfolio_history))
        .route("/api/trades", get(routes::get_trades))
        .route("/api/logs", get(routes::get_logs))
        .route("/api/decisions", get(routes::get_decisions))
        .route("/api/signals", get(routes::get_signals))
        .route("/api/markets/watched", get(routes::get_watched))
        .route("/api/whales/activity", get(routes::get_whale_activity))
        .route("/api/whales/leaderboard", get(routes::get_leaderboard))
        .route("/api/alpha/signals", get(routes::get_alpha_signals))
        .route("/api/alpha/spot", get(routes::get_spot_history))
        .route("/api/agents", get(routes::get_agents))
        .layer(cors)
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
