//! ALPHA COUNCIL: council-of-agents trading bot for prediction markets.
//!
//! Entry point. Loads configuration, initialises structured logging,
//! restores the paper portfolio from disk (or starts fresh), wires the
//! council, execution gate and background loops, and runs until Ctrl+C.

use anyhow::Result;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

use alpha_council::config::{self, AppConfig};
use alpha_council::council::Council;
use alpha_council::dashboard::{self, DashboardState};
use alpha_council::engine::{Engine, EngineSettings, ExecutionGate};
use alpha_council::llm::LlmAdvisor;
use alpha_council::platforms::binance::BinanceClient;
use alpha_council::platforms::news::NewsApiClient;
use alpha_council::platforms::paper::PaperVenue;
use alpha_council::platforms::polymarket::PolymarketClient;
use alpha_council::platforms::{NewsFeed, OrderVenue};
use alpha_council::state::StateStore;
use alpha_council::storage;
use alpha_council::strategy::{
    default_whales, AlphaPolicy, CopyPolicy, CorrelationAlpha, WhaleWatcher,
};
use alpha_council::types::LogLevel;

const BANNER: &str = r#"
    _    _     ____  _   _    _       ____ ___  _   _ _   _  ____ ___ _
   / \  | |   |  _ \| | | |  / \     / ___/ _ \| | | | \ | |/ ___|_ _| |
  / _ \ | |   | |_) | |_| | / _ \   | |  | | | | | | |  \| | |    | || |
 / ___ \| |___|  __/|  _  |/ ___ \  | |__| |_| | |_| | |\  | |___ | || |___
/_/   \_\_____|_|   |_| |_/_/   \_\  \____\___/ \___/|_| \_|\____|___|_____|

  Three agents. One vote. Risk holds the veto.
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cfg = config::AppConfig::load("config.toml")?;
    init_logging(&cfg);

    println!("{BANNER}");
    info!(
        paper = cfg.paper.enabled,
        threshold = cfg.council.voting_threshold,
        max_single_trade = cfg.risk.max_single_trade,
        "ALPHA COUNCIL starting up"
    );

    // -- Restore or create state -----------------------------------------

    let state = match storage::load_state(&cfg.paper.state_file)? {
        Some(saved) => Arc::new(saved.into_store()),
        None => {
            info!(cash = cfg.paper.starting_cash, "Fresh start");
            Arc::new(StateStore::with_starting_cash(cfg.paper.starting_cash))
        }
    };

    // -- Initialise components -------------------------------------------

    let polymarket = Arc::new(PolymarketClient::new(&cfg.venue)?);
    let venue: Arc<dyn OrderVenue> = if cfg.paper.enabled {
        info!("Paper trading: orders are simulated");
        Arc::new(PaperVenue::new())
    } else {
        if !polymarket.has_credentials() {
            warn!("Live trading without CLOB credentials - every order will be rejected");
        }
        Arc::clone(&polymarket) as Arc<dyn OrderVenue>
    };

    let advisor = LlmAdvisor::from_settings(&cfg.llm)?;
    let council = Arc::new(Council::from_config(&cfg, advisor, Arc::clone(&state)));
    let gate = Arc::new(ExecutionGate::new(
        venue,
        Arc::clone(&state),
        cfg.risk.max_single_trade,
    ));
    let whales = Arc::new(WhaleWatcher::new(
        default_whales(),
        CopyPolicy::from_app(&cfg),
        Arc::clone(&state),
    ));

    let news = NewsApiClient::new(&cfg.news)?;
    let news: Option<Arc<dyn NewsFeed>> = if news.has_key() {
        Some(Arc::new(news))
    } else {
        warn!("NEWS_API_KEY not set - council runs without headlines");
        None
    };

    let alpha = if cfg.correlation.enabled {
        let exchange = Arc::new(BinanceClient::new(&cfg.correlation)?);
        Some(Arc::new(CorrelationAlpha::new(
            exchange,
            AlphaPolicy::from_app(&cfg),
            Arc::clone(&state),
        )))
    } else {
        None
    };

    if cfg.dashboard.enabled {
        let app = Arc::new(DashboardState {
            store: Arc::clone(&state),
            whales: Arc::clone(&whales),
            agents: council.agent_roster(),
        });
        if let Err(e) = dashboard::spawn_dashboard(app, cfg.dashboard.port).await {
            error!(error = %e, "Dashboard disabled");
        }
    }

    let engine = Arc::new(Engine {
        council,
        gate,
        markets: Arc::clone(&polymarket) as _,
        feed: polymarket as _,
        whales,
        news,
        alpha,
        state: Arc::clone(&state),
        settings: EngineSettings::from_app(&cfg),
    });

    // -- Run until Ctrl+C ------------------------------------------------

    state.add_log(LogLevel::Success, "system", "ALPHA COUNCIL ONLINE");
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handles = engine.spawn(shutdown_rx);
    info!("Engine running. Press Ctrl+C to stop.");

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl+C");
    }
    info!("Shutdown requested");
    let _ = shutdown_tx.send(true);
    for handle in handles {
        if let Err(e) = handle.await {
            error!(error = %e, "Loop task aborted");
        }
    }

    state.set_running(false);
    state.add_log(LogLevel::Info, "system", "ALPHA COUNCIL OFFLINE");
    if let Err(e) = storage::save_state(&state, &cfg.paper.state_file) {
        error!(error = %e, "Failed to save state");
    }

    let portfolio = state.portfolio();
    info!(
        total_value = portfolio.total_value,
        cash = portfolio.cash_balance,
        trades = state.trade_count(),
        errors = state.error_count(),
        "Final state"
    );
    Ok(())
}

/// Initialise tracing. `RUST_LOG` overrides the default filter;
/// `ALPHA_LOG_JSON` switches to JSON output.
fn init_logging(cfg: &AppConfig) {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("alpha_council=info"));

    if std::env::var("ALPHA_LOG_JSON").is_ok() {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt().with_env_filter(env_filter).with_target(true).init();
    }

    if !cfg.paper.enabled {
        warn!("LIVE TRADING ENABLED");
    }
}
