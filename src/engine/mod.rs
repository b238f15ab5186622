//! Background engine: the long-lived loops around the council.
//!
//! Four loops run on their own intervals and share one shutdown signal:
//! market scanner, whale poll, price tracker and portfolio updater. When the
//! correlation engine is configured a fifth loop polls the exchange order
//! book. A failed iteration is logged, counted and retried after the
//! back-off interval.

pub mod executor;

pub use executor::ExecutionGate;

use anyhow::{Context, Result};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::agents::DeliberationContext;
use crate::config::AppConfig;
use crate::council::Council;
use crate::platforms::{MarketDataProvider, MarketFilter, NewsFeed, WhaleFeed};
use crate::state::StateStore;
use crate::strategy::{CorrelationAlpha, WhaleWatcher};
use crate::types::{LogLevel, MarketSnapshot, TradeDirection, TradeOutcome, WatchedMarket};

/// Markets listed when hunting for a BTC strike to trade an alpha signal.
const ALPHA_MARKET_LIMIT: usize = 50;

/// Loop cadence and scan knobs.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub scan_every: Duration,
    pub whale_every: Duration,
    pub price_every: Duration,
    pub portfolio_every: Duration,
    pub alpha_every: Duration,
    pub error_backoff: Duration,
    pub markets_per_scan: usize,
    pub headlines_per_market: usize,
    pub auto_copy: bool,
    pub filter: MarketFilter,
}

impl EngineSettings {
    pub fn from_app(cfg: &AppConfig) -> Self {
        let i = &cfg.intervals;
        Self {
            scan_every: Duration::from_secs(i.market_scan_secs.max(1)),
            whale_every: Duration::from_secs(i.whale_poll_secs.max(1)),
            price_every: Duration::from_secs(i.price_tracker_secs.max(1)),
            portfolio_every: Duration::from_secs(i.portfolio_refresh_secs.max(1)),
            alpha_every: Duration::from_secs(i.orderbook_poll_secs.max(1)),
            error_backoff: Duration::from_secs(i.error_backoff_secs.max(1)),
            markets_per_scan: cfg.council.markets_per_scan,
            headlines_per_market: cfg.news.max_headlines,
            auto_copy: cfg.whale.auto_copy,
            filter: MarketFilter::default(),
        }
    }
}

pub struct Engine {
    pub council: Arc<Council>,
    pub gate: Arc<ExecutionGate>,
    pub markets: Arc<dyn MarketDataProvider>,
    pub feed: Arc<dyn WhaleFeed>,
    pub whales: Arc<WhaleWatcher>,
    pub news: Option<Arc<dyn NewsFeed>>,
    pub alpha: Option<Arc<CorrelationAlpha>>,
    pub state: Arc<StateStore>,
    pub settings: EngineSettings,
}

impl Engine {
    /// One scanner pass: pick the busiest markets, convene the council on
    /// each and execute approvals. Returns the number of trades placed.
    pub async fn scan_once(&self) -> Result<usize> {
        let mut markets = self
            .markets
            .list_markets(&self.settings.filter)
            .await
            .context("Market listing failed")?;

        markets.sort_by(|a, b| b.volume_24h.total_cmp(&a.volume_24h));
        markets.truncate(self.settings.markets_per_scan);
        debug!(candidates = markets.len(), "Scanner pass");

        let mut executed = 0;
        for snapshot in markets {
            if !self.state.is_watched(&snapshot.id) {
                self.state
                    .watch_market(WatchedMarket::new(snapshot.clone(), "top volume"));
            }

            let news = self.headlines_for(&snapshot).await;
            let decision = self
                .council
                .deliberate(&snapshot, DeliberationContext::default().with_news(news))
                .await;
            if self.gate.execute_decision(&snapshot, &decision).await.is_some() {
                executed += 1;
            }
        }
        Ok(executed)
    }

    /// Headlines for one market. A feed failure degrades to no news.
    async fn headlines_for(&self, snapshot: &MarketSnapshot) -> Vec<String> {
        let Some(feed) = &self.news else {
            return Vec::new();
        };
        match feed.headlines(&snapshot.question, self.settings.headlines_per_market).await {
            Ok(headlines) => headlines,
            Err(e) => {
                warn!(market = %snapshot.id, error = %e, "Headline fetch failed");
                self.state.increment_errors();
                Vec::new()
            }
        }
    }

    /// One whale poll. Agreed signals are executed when auto-copy is on.
    pub async fn whale_once(&self) -> Result<usize> {
        let signals = self.whales.poll_once(self.feed.as_ref()).await;
        if !self.settings.auto_copy {
            return Ok(0);
        }

        let mut executed = 0;
        for signal in signals.iter().filter(|s| s.ai_agrees) {
            if self.gate.execute_copy_signal(signal).await.is_some() {
                executed += 1;
            }
        }
        Ok(executed)
    }

    /// One order book poll. A confident buy signal buys YES on the cheapest
    /// BTC strike market. Returns the number of trades placed.
    pub async fn alpha_once(&self) -> Result<usize> {
        let Some(alpha) = &self.alpha else {
            return Ok(0);
        };
        let Some(signal) = alpha.poll_once().await? else {
            return Ok(0);
        };
        if !alpha.should_trade(&signal) {
            return Ok(0);
        }

        let filter = MarketFilter {
            limit: ALPHA_MARKET_LIMIT,
            tag: Some("Crypto".to_string()),
            ..MarketFilter::default()
        };
        let markets = self
            .markets
            .list_markets(&filter)
            .await
            .context("Crypto market listing failed")?;

        let Some(target) = alpha.pick_target(&markets) else {
            self.state.add_log(
                LogLevel::Warning,
                "alpha_engine",
                "No suitable BTC strike markets found for alpha signal",
            );
            return Ok(0);
        };

        let size = alpha.trade_size(&signal);
        self.state.add_log(
            LogLevel::Trade,
            "alpha_engine",
            format!(
                "EXECUTING ALPHA TRADE: BUY YES ${size:.2} on '{}' @ {:.2}",
                target.question, target.yes_price
            ),
        );
        let placed = self
            .gate
            .execute(&target, TradeDirection::Buy, TradeOutcome::Yes, size)
            .await;
        Ok(usize::from(placed.is_some()))
    }

    /// Refresh YES prices of every watched market.
    pub async fn track_prices_once(&self) -> Result<()> {
        for watched in self.state.watched_markets() {
            let id = watched.snapshot.id;
            match self.markets.get_market(&id).await {
                Ok(Some(fresh)) => self.state.record_price(&id, fresh.yes_price),
                Ok(None) => {
                    debug!(market = %id, "Watched market no longer listed");
                    self.state.unwatch_market(&id);
                }
                Err(e) => {
                    warn!(market = %id, error = %e, "Price refresh failed");
                    self.state.increment_errors();
                }
            }
        }
        Ok(())
    }

    /// Mark open positions to market and recompute total value and PnL.
    pub async fn refresh_portfolio_once(&self) -> Result<()> {
        let held: Vec<String> = self
            .state
            .portfolio()
            .positions
            .iter()
            .map(|p| p.market_id.clone())
            .collect();

        let mut fresh: Vec<MarketSnapshot> = Vec::with_capacity(held.len());
        for id in held {
            match self.markets.get_market(&id).await {
                Ok(Some(snapshot)) => fresh.push(snapshot),
                Ok(None) => {}
                Err(e) => {
                    warn!(market = %id, error = %e, "Position price refresh failed");
                    self.state.increment_errors();
                }
            }
        }

        let (total, pnl) = self.state.modify_portfolio(|p| {
            for pos in p.positions.iter_mut() {
                if let Some(s) = fresh.iter().find(|s| s.id == pos.market_id) {
                    pos.current_price = s.price_of(pos.outcome);
                }
            }
            p.mark_to_market();
            (p.total_value, p.total_pnl)
        });
        debug!(total_value = total, total_pnl = pnl, "Portfolio revalued");
        Ok(())
    }

    /// Spawn all loops. They stop once `shutdown` flips to `true`.
    pub fn spawn(self: &Arc<Self>, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        self.state.set_running(true);
        self.state.add_log(
            LogLevel::Info,
            "engine",
            format!(
                "WHALE WATCHER ACTIVE: Tracking {} wallets",
                self.whales.tracked()
            ),
        );

        if let Some(alpha) = &self.alpha {
            self.state.add_log(
                LogLevel::Info,
                "engine",
                format!("ALPHA ENGINE ACTIVE: Watching {} order book", alpha.policy().symbol),
            );
        }

        let s = &self.settings;
        let mut handles = vec![
            self.spawn_loop("scanner", s.scan_every, shutdown.clone(), |e| async move {
                let n = e.scan_once().await?;
                if n > 0 {
                    info!(trades = n, "Scanner executed trades");
                }
                Ok(())
            }),
            self.spawn_loop("whale_watcher", s.whale_every, shutdown.clone(), |e| async move {
                e.whale_once().await.map(|_| ())
            }),
            self.spawn_loop("price_tracker", s.price_every, shutdown.clone(), |e| async move {
                e.track_prices_once().await
            }),
            self.spawn_loop("portfolio", s.portfolio_every, shutdown.clone(), |e| async move {
                e.refresh_portfolio_once().await
            }),
        ];
        if self.alpha.is_some() {
            handles.push(self.spawn_loop("alpha_engine", s.alpha_every, shutdown, |e| async move {
                let n = e.alpha_once().await?;
                if n > 0 {
                    info!(trades = n, "Alpha engine executed trades");
                }
                Ok(())
            }));
        }
        handles
    }

    fn spawn_loop<F, Fut>(
        self: &Arc<Self>,
        name: &'static str,
        every: Duration,
        mut shutdown: watch::Receiver<bool>,
        tick: F,
    ) -> JoinHandle<()>
    where
        F: Fn(Arc<Engine>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            info!(task = name, every_secs = every.as_secs(), "Loop started");
            loop {
                if *shutdown.borrow() {
                    break;
                }
                let wait = match tick(Arc::clone(&engine)).await {
                    Ok(()) => every,
                    Err(e) => {
                        error!(task = name, error = %e, "Loop iteration failed");
                        engine.state.increment_errors();
                        engine.settings.error_backoff
                    }
                };
                tokio::select! {
                    _ = tokio::time::sleep(wait) => {}
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            info!(task = name, "Loop stopped");
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::Analyst;
    use crate::council::CouncilConfig;
    use crate::llm::{AdvisoryFault, MockAdvisoryProvider};
    use crate::platforms::paper::PaperVenue;
    use crate::platforms::{
        DepthSnapshot, MockMarketDataProvider, MockNewsFeed, MockOrderBookFeed, MockWhaleFeed,
        RawTrade,
    };
    use crate::strategy::{default_whales, AlphaPolicy, CopyPolicy};
    use std::sync::Mutex;
    use crate::types::{
        AgentAnalysis, AgentKind, AnalysisSource, Position, TradeDirection, TradeOutcome, Vote,
    };
    use async_trait::async_trait;

    struct Agrees(AgentKind);

    #[async_trait]
    impl Analyst for Agrees {
        fn kind(&self) -> AgentKind {
            self.0
        }

        async fn analyze(&self, _s: &MarketSnapshot, _c: &DeliberationContext) -> AgentAnalysis {
            AgentAnalysis {
                agent_kind: self.0,
                agent_name: self.0.display_name().to_string(),
                vote: Vote::Yes,
                confidence: 0.8,
                rationale: "agree".into(),
                data_sources: Vec::new(),
                elapsed_ms: 0,
                source: AnalysisSource::Heuristic,
                max_position_size: None,
                timestamp: chrono::Utc::now(),
            }
        }
    }

    fn settings(auto_copy: bool) -> EngineSettings {
        EngineSettings {
            scan_every: Duration::from_millis(20),
            whale_every: Duration::from_millis(20),
            price_every: Duration::from_millis(20),
            portfolio_every: Duration::from_millis(20),
            alpha_every: Duration::from_millis(20),
            error_backoff: Duration::from_millis(20),
            markets_per_scan: 1,
            headlines_per_market: 3,
            auto_copy,
            filter: MarketFilter::default(),
        }
    }

    fn engine(
        markets: MockMarketDataProvider,
        feed: MockWhaleFeed,
        auto_copy: bool,
    ) -> (Arc<Engine>, Arc<StateStore>) {
        let state = Arc::new(StateStore::with_starting_cash(10_000.0));
        let engine = assemble(agreeing_council(&state), &state, markets, feed, auto_copy);
        (Arc::new(engine), state)
    }

    fn agreeing_council(state: &Arc<StateStore>) -> Council {
        let agents: Vec<Arc<dyn Analyst>> = AgentKind::ALL
            .iter()
            .map(|k| Arc::new(Agrees(*k)) as Arc<dyn Analyst>)
            .collect();
        Council::new(
            agents,
            Arc::clone(state),
            CouncilConfig {
                voting_threshold: 0.67,
                max_single_trade: 500.0,
                agent_timeout: None,
            },
        )
    }

    fn assemble(
        council: Council,
        state: &Arc<StateStore>,
        markets: MockMarketDataProvider,
        feed: MockWhaleFeed,
        auto_copy: bool,
    ) -> Engine {
        let whales = WhaleWatcher::new(
            default_whales().into_iter().skip(1).take(1).collect(),
            CopyPolicy {
                min_trade_size: 1_000.0,
                copy_percentage: 0.1,
                max_single_trade: 500.0,
            },
            Arc::clone(state),
        );
        Engine {
            council: Arc::new(council),
            gate: Arc::new(ExecutionGate::new(
                Arc::new(PaperVenue::new()),
                Arc::clone(state),
                500.0,
            )),
            markets: Arc::new(markets),
            feed: Arc::new(feed),
            whales: Arc::new(whales),
            news: None,
            alpha: None,
            state: Arc::clone(state),
            settings: settings(auto_copy),
        }
    }

    fn market(id: &str, yes: f64, volume: f64) -> MarketSnapshot {
        MarketSnapshot::new(id, format!("Market {id}?"), yes, 1.0 - yes, volume, 80_000.0)
    }

    #[tokio::test]
    async fn test_scan_deliberates_busiest_market_and_executes() {
        let mut markets = MockMarketDataProvider::new();
        markets
            .expect_list_markets()
            .returning(|_| Ok(vec![market("quiet", 0.3, 1_000.0), market("busy", 0.3, 90_000.0)]));
        let (engine, state) = engine(markets, MockWhaleFeed::new(), false);

        assert_eq!(engine.scan_once().await.unwrap(), 1);

        let decisions = state.decisions(10);
        assert_eq!(decisions.len(), 1);
        assert_eq!(decisions[0].market_id, "busy");
        assert!(state.is_watched("busy"));
        assert!(!state.is_watched("quiet"));

        let trades = state.trades(10);
        assert_eq!(trades[0].outcome, TradeOutcome::Yes);
        assert!((trades[0].size - 400.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_scan_listing_failure_is_an_error() {
        let mut markets = MockMarketDataProvider::new();
        markets
            .expect_list_markets()
            .returning(|_| Err(anyhow::anyhow!("gamma down")));
        let (engine, state) = engine(markets, MockWhaleFeed::new(), false);
        assert!(engine.scan_once().await.is_err());
        assert_eq!(state.trade_count(), 0);
    }

    #[tokio::test]
    async fn test_scan_hands_headlines_to_fundamentalist() {
        let mut markets = MockMarketDataProvider::new();
        markets
            .expect_list_markets()
            .returning(|_| Ok(vec![market("fed", 0.4, 50_000.0)]));
        let mut news = MockNewsFeed::new();
        news.expect_headlines()
            .withf(|question, limit| question.starts_with("Market fed") && *limit == 3)
            .times(1)
            .returning(|_, _| Ok(vec!["Fed signals March cut (Reuters)".to_string()]));

        let prompts = Arc::new(Mutex::new(Vec::<String>::new()));
        let seen = Arc::clone(&prompts);
        let mut advisor = MockAdvisoryProvider::new();
        advisor.expect_suggest().returning(move |role, situation| {
            if role.starts_with("You are The Fundamentalist") {
                seen.lock().unwrap().push(situation.to_string());
            }
            Err(AdvisoryFault::Transport("offline".into()))
        });
        advisor.expect_name().returning(|| "recorder".to_string());

        let state = Arc::new(StateStore::with_starting_cash(10_000.0));
        let council = Council::from_config(
            &AppConfig::default(),
            Some(Arc::new(advisor)),
            Arc::clone(&state),
        );
        let mut engine = assemble(council, &state, markets, MockWhaleFeed::new(), false);
        engine.news = Some(Arc::new(news));

        engine.scan_once().await.unwrap();

        let prompts = prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Fed signals March cut (Reuters)"));
        assert!(!prompts[0].contains("No recent news available."));
    }

    #[tokio::test]
    async fn test_scan_survives_headline_failure() {
        let mut markets = MockMarketDataProvider::new();
        markets
            .expect_list_markets()
            .returning(|_| Ok(vec![market("busy", 0.3, 90_000.0)]));
        let mut news = MockNewsFeed::new();
        news.expect_headlines()
            .returning(|_, _| Err(anyhow::anyhow!("rate limited")));

        let state = Arc::new(StateStore::with_starting_cash(10_000.0));
        let mut engine =
            assemble(agreeing_council(&state), &state, markets, MockWhaleFeed::new(), false);
        engine.news = Some(Arc::new(news));

        assert_eq!(engine.scan_once().await.unwrap(), 1);
        assert_eq!(state.error_count(), 1);
    }

    /// Eleven balanced books drifting 0.2%, then one with bids 4.5x asks.
    fn drifting_book_feed() -> MockOrderBookFeed {
        let mut feed = MockOrderBookFeed::new();
        let mut polls = 0usize;
        feed.expect_depth().returning(move |_| {
            let mid = 100_000.0 + 20.0 * polls.min(10) as f64;
            let bid_qty = if polls > 10 { 4.5 } else { 1.0 };
            polls += 1;
            Ok(DepthSnapshot {
                bids: vec![(mid - 0.5, bid_qty)],
                asks: vec![(mid + 0.5, 1.0)],
            })
        });
        feed
    }

    fn with_alpha(engine: &mut Engine, feed: MockOrderBookFeed) {
        let policy = AlphaPolicy::from_app(&AppConfig::default());
        engine.alpha = Some(Arc::new(CorrelationAlpha::new(
            Arc::new(feed),
            policy,
            Arc::clone(&engine.state),
        )));
    }

    #[tokio::test]
    async fn test_alpha_buys_cheapest_btc_strike() {
        let mut markets = MockMarketDataProvider::new();
        markets
            .expect_list_markets()
            .withf(|f| f.tag.as_deref() == Some("Crypto") && f.limit == 50)
            .times(1)
            .returning(|_| {
                Ok(vec![
                    MarketSnapshot::new("btc-120", "Will Bitcoin exceed $120k?", 0.35, 0.65, 1.0, 1.0),
                    MarketSnapshot::new("btc-150", "Will Bitcoin exceed $150k?", 0.12, 0.88, 1.0, 1.0),
                    MarketSnapshot::new("btc-90", "Will Bitcoin exceed $90k?", 0.70, 0.30, 1.0, 1.0),
                ])
            });
        let state = Arc::new(StateStore::with_starting_cash(10_000.0));
        let mut engine =
            assemble(agreeing_council(&state), &state, markets, MockWhaleFeed::new(), false);
        with_alpha(&mut engine, drifting_book_feed());

        for _ in 0..11 {
            assert_eq!(engine.alpha_once().await.unwrap(), 0);
        }
        assert_eq!(engine.alpha_once().await.unwrap(), 1);

        let trades = state.trades(10);
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].market_id, "btc-150");
        assert_eq!(trades[0].outcome, TradeOutcome::Yes);
        assert!((trades[0].size - 450.0).abs() < 1e-9);
        assert_eq!(state.alpha_signals(10).len(), 1);
        assert_eq!(state.spot_history().len(), 12);
    }

    #[tokio::test]
    async fn test_alpha_without_strike_market_only_logs() {
        let mut markets = MockMarketDataProvider::new();
        markets
            .expect_list_markets()
            .returning(|_| Ok(vec![market("eth", 0.1, 1.0)]));
        let state = Arc::new(StateStore::with_starting_cash(10_000.0));
        let mut engine =
            assemble(agreeing_council(&state), &state, markets, MockWhaleFeed::new(), false);
        with_alpha(&mut engine, drifting_book_feed());

        for _ in 0..12 {
            assert_eq!(engine.alpha_once().await.unwrap(), 0);
        }
        assert_eq!(state.trade_count(), 0);
        assert!(state
            .logs(10)
            .iter()
            .any(|l| l.message.starts_with("No suitable BTC strike markets")));
    }

    #[tokio::test]
    async fn test_whale_auto_copy() {
        let feed = || {
            let mut feed = MockWhaleFeed::new();
            feed.expect_recent_trades().returning(|_, _| {
                Ok(vec![RawTrade {
                    tx_hash: "0xfeed".into(),
                    market_id: "m-w".into(),
                    market_question: "Will the bill pass?".into(),
                    direction: TradeDirection::Buy,
                    outcome: TradeOutcome::Yes,
                    size: 40_000.0,
                    price: 0.35,
                    timestamp: chrono::Utc::now(),
                }])
            });
            feed
        };

        let (manual, state) = engine(MockMarketDataProvider::new(), feed(), false);
        assert_eq!(manual.whale_once().await.unwrap(), 0);
        assert_eq!(state.pending_signals().len(), 1);

        let (auto, state) = engine(MockMarketDataProvider::new(), feed(), true);
        assert_eq!(auto.whale_once().await.unwrap(), 1);
        assert!(state.pending_signals().is_empty());
        assert_eq!(state.portfolio().cash_balance, 9_500.0);
    }

    #[tokio::test]
    async fn test_price_tracker_records_and_drops_delisted() {
        let mut markets = MockMarketDataProvider::new();
        markets
            .expect_get_market()
            .withf(|id| id.starts_with("live"))
            .returning(|_| Ok(Some(market("live", 0.55, 1.0))));
        markets
            .expect_get_market()
            .withf(|id| id.starts_with("gone"))
            .returning(|_| Ok(None));
        let (engine, state) = engine(markets, MockWhaleFeed::new(), false);
        state.watch_market(WatchedMarket::new(market("live", 0.50, 1.0), "test"));
        state.watch_market(WatchedMarket::new(market("gone", 0.50, 1.0), "test"));

        engine.track_prices_once().await.unwrap();

        let watched = state.watched_markets();
        assert_eq!(watched.len(), 1);
        assert_eq!(watched[0].snapshot.yes_price, 0.55);
        assert_eq!(watched[0].price_history.len(), 1);
    }

    #[tokio::test]
    async fn test_portfolio_refresh_marks_to_market() {
        let mut markets = MockMarketDataProvider::new();
        markets
            .expect_get_market()
            .returning(|_| Ok(Some(market("m1", 0.60, 1.0))));
        let (engine, state) = engine(markets, MockWhaleFeed::new(), false);
        state.modify_portfolio(|p| {
            p.cash_balance = 9_800.0;
            p.positions.push(Position {
                market_id: "m1".into(),
                market_question: "Market m1?".into(),
                outcome: TradeOutcome::No,
                size: 200.0,
                shares: 400.0,
                entry_price: 0.5,
                current_price: 0.5,
            });
        });

        engine.refresh_portfolio_once().await.unwrap();

        let p = state.portfolio();
        assert!((p.positions[0].current_price - 0.40).abs() < 1e-9);
        assert!((p.total_value - 9_960.0).abs() < 1e-9);
        assert!((p.total_pnl + 40.0).abs() < 1e-9);
        assert!((p.daily_pnl + 40.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_loops_stop_on_shutdown() {
        let mut markets = MockMarketDataProvider::new();
        markets.expect_list_markets().returning(|_| Ok(Vec::new()));
        let mut feed = MockWhaleFeed::new();
        feed.expect_recent_trades().returning(|_, _| Ok(Vec::new()));
        let (engine, state) = engine(markets, feed, false);

        let (tx, rx) = watch::channel(false);
        let handles = engine.spawn(rx);
        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(true).unwrap();

        for h in handles {
            tokio::time::timeout(Duration::from_secs(1), h)
                .await
                .expect("loop did not stop")
                .unwrap();
        }
        assert!(state.status().is_running);
        assert_eq!(state.error_count(), 0);
    }
}
