//! Dashboard API route handlers.
//!
//! All endpoints return JSON snapshots copied out of the state store.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::council::AgentStatus;
use crate::state::StateStore;
use crate::strategy::{WhaleProfile, WhaleWatcher};
use crate::types::{
    AlphaSignal, CouncilDecision, LogEntry, Portfolio, PortfolioPoint, SpotPoint, SystemStatus,
    Trade, TradeSignal, WatchedMarket, WhaleActivity,
};

/// Default page size for list endpoints.
const DEFAULT_LIMIT: usize = 50;

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

pub struct DashboardState {
    pub store: Arc<StateStore>,
    pub whales: Arc<WhaleWatcher>,
    pub agents: Vec<AgentStatus>,
}

pub type AppState = Arc<DashboardState>;

#[derive(Debug, Deserialize)]
pub struct LimitParams {
    pub limit: Option<usize>,
}

impl LimitParams {
    fn get(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LIMIT)
    }
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    #[serde(flatten)]
    pub system: SystemStatus,
    pub total_value: f64,
    pub cash_balance: f64,
    pub total_pnl: f64,
    pub win_rate: f64,
    pub trade_count: usize,
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

pub async fn health() -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
        }),
    )
}

pub async fn get_status(State(app): State<AppState>) -> Json<StatusResponse> {
    let portfolio = app.store.portfolio();
    Json(StatusResponse {
        system: app.store.status(),
        total_value: portfolio.total_value,
        cash_balance: portfolio.cash_balance,
        total_pnl: portfolio.total_pnl,
        win_rate: portfolio.win_rate(),
        trade_count: app.store.trade_count(),
    })
}

pub async fn get_portfolio(State(app): State<AppState>) -> Json<Portfolio> {
    Json(app.store.portfolio())
}

pub async fn get_portfolio_history(State(app): State<AppState>) -> Json<Vec<PortfolioPoint>> {
    Json(app.store.portfolio_history())
}

pub async fn get_trades(
    State(app): State<AppState>,
    Query(params): Query<LimitParams>,
) -> Json<Vec<Trade>> {
    Json(app.store.trades(params.get()))
}

pub async fn get_logs(
    State(app): State<AppState>,
    Query(params): Query<LimitParams>,
) -> Json<Vec<LogEntry>> {
    Json(app.store.logs(params.get()))
}

pub async fn get_decisions(
    State(app): State<AppState>,
    Query(params): Query<LimitParams>,
) -> Json<Vec<CouncilDecision>> {
    Json(app.store.decisions(params.get()))
}

pub async fn get_signals(State(app): State<AppState>) -> Json<Vec<TradeSignal>> {
    Json(app.store.pending_signals())
}

pub async fn get_watched(State(app): State<AppState>) -> Json<Vec<WatchedMarket>> {
    Json(app.store.watched_markets())
}

pub async fn get_whale_activity(
    State(app): State<AppState>,
    Query(params): Query<LimitParams>,
) -> Json<Vec<WhaleActivity>> {
    Json(app.store.whale_activities(params.get()))
}

pub async fn get_leaderboard(State(app): State<AppState>) -> Json<Vec<WhaleProfile>> {
    Json(app.whales.leaderboard())
}

pub async fn get_alpha_signals(
    State(app): State<AppState>,
    Query(params): Query<LimitParams>,
) -> Json<Vec<AlphaSignal>> {
    Json(app.store.alpha_signals(params.get()))
}

pub async fn get_spot_history(State(app): State<AppState>) -> Json<Vec<SpotPoint>> {
    Json(app.store.spot_history())
}

pub async fn get_agents(State(app): State<AppState>) -> Json<Vec<AgentStatus>> {
    Json(app.agents.clone())
}
