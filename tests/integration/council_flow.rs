//! End-to-end flows: snapshot -> council -> decision -> execution gate ->
//! portfolio, using in-memory collaborators.

use std::sync::Arc;
use std::time::Duration;

use alpha_council::agents::DeliberationContext;
use alpha_council::config::AppConfig;
use alpha_council::council::Council;
use alpha_council::engine::{Engine, EngineSettings, ExecutionGate};
use alpha_council::llm::{parse_advice, Advice, AdvisoryProvider};
use alpha_council::platforms::paper::PaperVenue;
use alpha_council::platforms::{MarketFilter, VenueError};
use alpha_council::state::StateStore;
use alpha_council::storage;
use alpha_council::strategy::{default_whales, CopyPolicy, WhaleWatcher};
use alpha_council::types::{AgentKind, AnalysisSource, MarketSnapshot, TradeOutcome, Vote};

use crate::mock_collaborators::{QuietFeed, RecordingVenue, ScriptedAdvisor, StaticMarkets};

fn cheap_yes_market() -> MarketSnapshot {
    MarketSnapshot::new(
        "0xabc",
        "Will the Fed cut rates in March?",
        0.40,
        0.60,
        90_000.0,
        80_000.0,
    )
}

fn unanimous(confidence: f64) -> Arc<dyn AdvisoryProvider> {
    Arc::new(ScriptedAdvisor::new(move |_| {
        Ok(Advice {
            vote: Vote::Yes,
            confidence,
            rationale: "Data supports it.".into(),
        })
    }))
}

fn council(advisor: Option<Arc<dyn AdvisoryProvider>>, state: &Arc<StateStore>) -> Council {
    Council::from_config(&AppConfig::default(), advisor, Arc::clone(state))
}

#[tokio::test]
async fn test_unanimous_advice_executes_trade() {
    let state = Arc::new(StateStore::with_starting_cash(10_000.0));
    let venue = Arc::new(RecordingVenue::new());
    let gate = ExecutionGate::new(venue.clone(), Arc::clone(&state), 500.0);
    let snapshot = cheap_yes_market();

    let decision = council(Some(unanimous(0.9)), &state)
        .deliberate(&snapshot, DeliberationContext::default())
        .await;

    assert!(decision.should_execute, "{}", decision.summary);
    assert!(decision.summary.starts_with("APPROVED: 3/3"));
    assert!(decision
        .analyses
        .iter()
        .all(|a| a.source == AnalysisSource::Advisory));

    let trade = gate.execute_decision(&snapshot, &decision).await.unwrap();
    assert_eq!(trade.outcome, TradeOutcome::Yes);
    assert!((trade.size - 450.0).abs() < 1e-9);
    assert_eq!(trade.price, 0.40);

    assert_eq!(venue.orders().len(), 1);
    let portfolio = state.portfolio();
    assert!((portfolio.cash_balance - 9_550.0).abs() < 1e-9);
    assert_eq!(portfolio.positions.len(), 1);
    assert_eq!(state.decisions(10).len(), 1);
}

#[tokio::test]
async fn test_risk_manager_veto_blocks_unanimous_peers() {
    let state = Arc::new(StateStore::with_starting_cash(10_000.0));
    let advisor: Arc<dyn AdvisoryProvider> = Arc::new(ScriptedAdvisor::new(|kind| {
        Ok(match kind {
            AgentKind::RiskManager => Advice {
                vote: Vote::No,
                confidence: 0.55,
                rationale: "Too thin.".into(),
            },
            _ => Advice {
                vote: Vote::Yes,
                confidence: 1.0,
                rationale: "Go.".into(),
            },
        })
    }));

    let decision = council(Some(advisor), &state)
        .deliberate(&cheap_yes_market(), DeliberationContext::default())
        .await;

    assert!(!decision.should_execute);
    assert!(decision.was_vetoed());
    assert_eq!(decision.final_decision, Vote::No);
    assert_eq!(decision.yes_votes, 2);
    assert!(decision.summary.starts_with("VETOED"));
}

#[tokio::test]
async fn test_malformed_advice_falls_back_to_heuristics() {
    let state = Arc::new(StateStore::with_starting_cash(10_000.0));
    let advisor: Arc<dyn AdvisoryProvider> =
        Arc::new(ScriptedAdvisor::new(|_| parse_advice("Sure, I'd vote yes!")));
    let snapshot = MarketSnapshot::new("m", "Will turnout exceed 60%?", 0.62, 0.38, 125_000.0, 50_000.0);

    let decision = council(Some(advisor), &state)
        .deliberate(&snapshot, DeliberationContext::default())
        .await;

    assert!(decision
        .analyses
        .iter()
        .all(|a| a.source == AnalysisSource::Heuristic));
    let fundamentalist = decision
        .analyses
        .iter()
        .find(|a| a.agent_kind == AgentKind::Fundamentalist)
        .unwrap();
    assert_eq!(fundamentalist.vote, Vote::No);
    assert_eq!(fundamentalist.confidence, 0.5);
    // spread 0.24 pushes the risk score past the default threshold
    assert!(decision.was_vetoed());
    assert_eq!(state.error_count(), 0);
}

#[tokio::test]
async fn test_remote_failure_records_nothing() {
    let state = Arc::new(StateStore::with_starting_cash(10_000.0));
    let venue = Arc::new(RecordingVenue::new());
    venue.set_error(VenueError::Rejected {
        status: 503,
        message: "busy".into(),
    });
    let gate = ExecutionGate::new(venue.clone(), Arc::clone(&state), 500.0);
    let snapshot = cheap_yes_market();

    let decision = council(Some(unanimous(0.8)), &state)
        .deliberate(&snapshot, DeliberationContext::default())
        .await;
    assert!(gate.execute_decision(&snapshot, &decision).await.is_none());

    assert_eq!(venue.orders().len(), 1);
    assert_eq!(state.trade_count(), 0);
    assert_eq!(state.error_count(), 1);
    assert_eq!(state.portfolio().cash_balance, 10_000.0);
    assert_eq!(state.logs(1)[0].message, "ORDER FAILED: order rejected (503): busy");
}

#[tokio::test]
async fn test_engine_scan_and_persist() {
    let state = Arc::new(StateStore::with_starting_cash(2_000.0));
    let engine = Engine {
        council: Arc::new(council(Some(unanimous(0.9)), &state)),
        gate: Arc::new(ExecutionGate::new(
            Arc::new(PaperVenue::new()),
            Arc::clone(&state),
            500.0,
        )),
        markets: Arc::new(StaticMarkets::new(vec![cheap_yes_market()])),
        feed: Arc::new(QuietFeed),
        whales: Arc::new(WhaleWatcher::new(
            default_whales(),
            CopyPolicy::from_app(&AppConfig::default()),
            Arc::clone(&state),
        )),
        news: None,
        alpha: None,
        state: Arc::clone(&state),
        settings: EngineSettings {
            scan_every: Duration::from_secs(60),
            whale_every: Duration::from_secs(60),
            price_every: Duration::from_secs(60),
            portfolio_every: Duration::from_secs(60),
            alpha_every: Duration::from_secs(60),
            error_backoff: Duration::from_secs(60),
            markets_per_scan: 3,
            headlines_per_market: 5,
            auto_copy: false,
            filter: MarketFilter::default(),
        },
    };

    assert_eq!(engine.scan_once().await.unwrap(), 1);
    assert!(state.is_watched("0xabc"));
    engine.refresh_portfolio_once().await.unwrap();

    let portfolio = state.portfolio();
    assert!((portfolio.cash_balance - 1_550.0).abs() < 1e-9);
    assert!((portfolio.total_value - 2_000.0).abs() < 1e-9);

    let path = std::env::temp_dir()
        .join(format!("alpha_council_it_{}.json", uuid::Uuid::new_v4()))
        .to_string_lossy()
        .to_string();
    storage::save_state(&state, &path).unwrap();
    let restored = storage::load_state(&path).unwrap().unwrap().into_store();
    assert_eq!(restored.trade_count(), 1);
    assert!((restored.portfolio().cash_balance - 1_550.0).abs() < 1e-9);
    storage::delete_state(&path).unwrap();
}
