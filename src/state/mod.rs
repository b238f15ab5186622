//! Shared state store.
//!
//! One explicitly constructed store, shared as `Arc<StateStore>`, holds the
//! audit log, trade history, pending signals, council decisions, the sniper
//! scope, whale activity and the portfolio. A single mutex guards all of
//! it. Every public method takes the lock for one structural mutation or
//! copy and releases it before returning, so no caller ever holds it across
//! an `.await`.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use crate::types::{
    truncate, AlphaSignal, AlphaSignalKind, CouncilDecision, LogEntry, LogLevel, Portfolio,
    PortfolioPoint, PricePoint, SpotPoint, SystemStatus, Trade, TradeSignal, WatchedMarket,
    WhaleActivity,
};

/// Capacity of the audit log ring.
pub const MAX_LOG_ENTRIES: usize = 100;
/// Capacity of the whale activity and alpha signal rings.
pub const MAX_WHALE_ACTIVITIES: usize = 50;
/// Maximum retained chart points (portfolio history, per-market prices),
/// council decisions and pending signals.
pub const MAX_HISTORY_POINTS: usize = 1000;

struct Inner {
    logs: VecDeque<LogEntry>,
    trades: Vec<Trade>,
    pending_signals: Vec<TradeSignal>,
    decisions: Vec<CouncilDecision>,
    watched: HashMap<String, WatchedMarket>,
    whales: VecDeque<WhaleActivity>,
    alpha_signals: VecDeque<AlphaSignal>,
    spot_history: Vec<SpotPoint>,
    portfolio: Portfolio,
    portfolio_history: Vec<PortfolioPoint>,
    status: SystemStatus,
}

impl Inner {
    /// Newest entries live at the front; the oldest is evicted at capacity.
    fn push_log(&mut self, entry: LogEntry) {
        self.logs.push_front(entry);
        self.logs.truncate(MAX_LOG_ENTRIES);
    }
}

/// Drop the oldest elements beyond `cap`.
fn trim_front<T>(items: &mut Vec<T>, cap: usize) {
    if items.len() > cap {
        let excess = items.len() - cap;
        items.drain(..excess);
    }
}

pub struct StateStore {
    inner: Mutex<Inner>,
    started_at: DateTime<Utc>,
}

impl StateStore {
    pub fn new(portfolio: Portfolio) -> Self {
        let status = SystemStatus {
            active_positions: portfolio.positions.len(),
            ..SystemStatus::default()
        };
        info!(cash = portfolio.cash_balance, "State store initialised");
        Self {
            inner: Mutex::new(Inner {
                logs: VecDeque::with_capacity(MAX_LOG_ENTRIES),
                trades: Vec::new(),
                pending_signals: Vec::new(),
                decisions: Vec::new(),
                watched: HashMap::new(),
                whales: VecDeque::with_capacity(MAX_WHALE_ACTIVITIES),
                alpha_signals: VecDeque::with_capacity(MAX_WHALE_ACTIVITIES),
                spot_history: Vec::new(),
                portfolio,
                portfolio_history: Vec::new(),
                status,
            }),
            started_at: Utc::now(),
        }
    }

    /// Store seeded with an empty demo portfolio.
    pub fn with_starting_cash(cash: f64) -> Self {
        Self::new(Portfolio::new(cash))
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panic while holding the lock leaves plain data behind; keep serving it.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // -- Audit log -----------------------------------------------------------

    pub fn add_log(&self, level: LogLevel, source: &str, message: impl Into<String>) -> LogEntry {
        self.add_log_with(level, source, message, HashMap::new())
    }

    pub fn add_log_with(
        &self,
        level: LogLevel,
        source: &str,
        message: impl Into<String>,
        metadata: HashMap<String, serde_json::Value>,
    ) -> LogEntry {
        let entry = LogEntry {
            level,
            message: message.into(),
            source: source.to_string(),
            timestamp: Utc::now(),
            metadata,
        };
        debug!(source, audit_level = %level, text = %entry.message, "Audit log entry");
        self.lock().push_log(entry.clone());
        entry
    }

    /// Most recent entries first.
    pub fn logs(&self, limit: usize) -> Vec<LogEntry> {
        self.lock().logs.iter().take(limit).cloned().collect()
    }

    // -- Trades & signals ----------------------------------------------------

    /// Record an executed trade and project it into the log.
    pub fn add_trade(&self, trade: Trade) {
        let mut inner = self.lock();
        inner.status.last_trade_time = Some(trade.timestamp);
        let entry = LogEntry {
            level: LogLevel::Trade,
            message: format!("EXECUTED: {trade}"),
            source: "executor".to_string(),
            timestamp: Utc::now(),
            metadata: HashMap::from([(
                "trade_id".to_string(),
                serde_json::Value::String(trade.id.clone()),
            )]),
        };
        inner.trades.push(trade);
        inner.push_log(entry);
    }

    /// Reload persisted trade history without projecting it into the log.
    pub fn restore_trades(&self, trades: Vec<Trade>) {
        let mut inner = self.lock();
        inner.status.last_trade_time = trades.last().map(|t| t.timestamp);
        inner.trades = trades;
    }

    /// Oldest first, at most `limit` of the newest trades.
    pub fn trades(&self, limit: usize) -> Vec<Trade> {
        let inner = self.lock();
        let start = inner.trades.len().saturating_sub(limit);
        inner.trades[start..].to_vec()
    }

    pub fn trade_count(&self) -> usize {
        self.lock().trades.len()
    }

    pub fn add_signal(&self, signal: TradeSignal) {
        let mut inner = self.lock();
        inner.pending_signals.push(signal);
        trim_front(&mut inner.pending_signals, MAX_HISTORY_POINTS);
        inner.status.pending_signals = inner.pending_signals.len();
    }

    pub fn pending_signals(&self) -> Vec<TradeSignal> {
        self.lock().pending_signals.clone()
    }

    pub fn clear_signal(&self, signal_id: &str) {
        let mut inner = self.lock();
        inner.pending_signals.retain(|s| s.id != signal_id);
        inner.status.pending_signals = inner.pending_signals.len();
    }

    // -- Council decisions ---------------------------------------------------

    /// Append a decision and its one-line audit summary.
    pub fn add_decision(&self, decision: CouncilDecision) {
        let mut inner = self.lock();
        let entry = LogEntry {
            level: if decision.should_execute { LogLevel::Success } else { LogLevel::Info },
            message: format!(
                "COUNCIL: {} on '{}' ({}/{} YES, {} NO) - {}",
                decision.final_decision,
                truncate(&decision.market_question, 40),
                decision.yes_votes,
                decision.analyses.len(),
                decision.no_votes,
                decision.summary,
            ),
            source: "council".to_string(),
            timestamp: Utc::now(),
            metadata: HashMap::from([(
                "decision_id".to_string(),
                serde_json::Value::String(decision.id.clone()),
            )]),
        };
        inner.decisions.push(decision);
        trim_front(&mut inner.decisions, MAX_HISTORY_POINTS);
        inner.push_log(entry);
    }

    pub fn decisions(&self, limit: usize) -> Vec<CouncilDecision> {
        let inner = self.lock();
        let start = inner.decisions.len().saturating_sub(limit);
        inner.decisions[start..].to_vec()
    }

    // -- Sniper scope --------------------------------------------------------

    pub fn watch_market(&self, watched: WatchedMarket) {
        let mut inner = self.lock();
        let entry = LogEntry {
            level: LogLevel::Info,
            message: format!("SCOPE: Watching '{}'", watched.snapshot.short_question(50)),
            source: "sniper".to_string(),
            timestamp: Utc::now(),
            metadata: HashMap::new(),
        };
        inner.watched.insert(watched.snapshot.id.clone(), watched);
        inner.status.markets_watched = inner.watched.len();
        inner.push_log(entry);
    }

    pub fn unwatch_market(&self, market_id: &str) {
        let mut inner = self.lock();
        inner.watched.remove(market_id);
        inner.status.markets_watched = inner.watched.len();
    }

    pub fn watched_markets(&self) -> Vec<WatchedMarket> {
        self.lock().watched.values().cloned().collect()
    }

    pub fn is_watched(&self, market_id: &str) -> bool {
        self.lock().watched.contains_key(market_id)
    }

    /// Record a fresh YES price for a watched market. No-op if unwatched.
    pub fn record_price(&self, market_id: &str, yes_price: f64) {
        let mut inner = self.lock();
        if let Some(watched) = inner.watched.get_mut(market_id) {
            watched.snapshot.yes_price = yes_price;
            watched.price_history.push(PricePoint {
                timestamp: Utc::now(),
                yes_price,
            });
            trim_front(&mut watched.price_history, MAX_HISTORY_POINTS);
        }
    }

    // -- Whale activity ------------------------------------------------------

    pub fn add_whale_activity(&self, activity: WhaleActivity) {
        let mut inner = self.lock();
        let entry = LogEntry {
            level: LogLevel::Warning,
            message: format!("WHALE DETECTED: {activity}"),
            source: "whale_watcher".to_string(),
            timestamp: Utc::now(),
            metadata: HashMap::from([(
                "tx_hash".to_string(),
                serde_json::Value::String(activity.tx_hash.clone()),
            )]),
        };
        inner.whales.push_front(activity);
        inner.whales.truncate(MAX_WHALE_ACTIVITIES);
        inner.push_log(entry);
    }

    pub fn whale_activities(&self, limit: usize) -> Vec<WhaleActivity> {
        self.lock().whales.iter().take(limit).cloned().collect()
    }

    // -- Exchange correlation ------------------------------------------------

    /// Record a fired signal and its audit line.
    pub fn add_alpha_signal(&self, signal: AlphaSignal) {
        let mut inner = self.lock();
        let entry = LogEntry {
            level: match signal.kind {
                AlphaSignalKind::StrongBuy => LogLevel::Success,
                AlphaSignalKind::StrongSell => LogLevel::Warning,
            },
            message: format!("ALPHA SIGNAL: {signal}"),
            source: "alpha_engine".to_string(),
            timestamp: Utc::now(),
            metadata: HashMap::new(),
        };
        inner.alpha_signals.push_front(signal);
        inner.alpha_signals.truncate(MAX_WHALE_ACTIVITIES);
        inner.push_log(entry);
    }

    pub fn alpha_signals(&self, limit: usize) -> Vec<AlphaSignal> {
        self.lock().alpha_signals.iter().take(limit).cloned().collect()
    }

    pub fn add_spot_price(&self, price: f64) {
        let mut inner = self.lock();
        inner.spot_history.push(SpotPoint {
            timestamp: Utc::now(),
            price,
        });
        trim_front(&mut inner.spot_history, MAX_HISTORY_POINTS);
    }

    pub fn spot_history(&self) -> Vec<SpotPoint> {
        self.lock().spot_history.clone()
    }

    // -- Portfolio -----------------------------------------------------------

    /// Copy of the current portfolio.
    pub fn portfolio(&self) -> Portfolio {
        self.lock().portfolio.clone()
    }

    /// Replace the portfolio wholesale and append a history point.
    pub fn update_portfolio(&self, portfolio: Portfolio) {
        let mut inner = self.lock();
        Self::replace_portfolio(&mut inner, portfolio);
    }

    /// Read-modify-write the portfolio under one lock acquisition. A chart
    /// point is appended only if the closure changed something.
    ///
    /// The closure must not block; it runs with the store locked.
    pub fn modify_portfolio<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut Portfolio) -> R,
    {
        let mut inner = self.lock();
        let mut next = inner.portfolio.clone();
        let result = f(&mut next);
        if next != inner.portfolio {
            next.updated_at = Utc::now();
            Self::replace_portfolio(&mut inner, next);
        }
        result
    }

    /// Like [`modify_portfolio`](Self::modify_portfolio) but never charts.
    /// For transient bookkeeping such as cash reservations and refunds.
    pub fn adjust_portfolio<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut Portfolio) -> R,
    {
        let mut inner = self.lock();
        let result = f(&mut inner.portfolio);
        inner.status.active_positions = inner.portfolio.positions.len();
        result
    }

    fn replace_portfolio(inner: &mut Inner, portfolio: Portfolio) {
        inner.status.active_positions = portfolio.positions.len();
        inner.portfolio_history.push(PortfolioPoint {
            timestamp: Utc::now(),
            value: portfolio.total_value,
        });
        trim_front(&mut inner.portfolio_history, MAX_HISTORY_POINTS);
        inner.portfolio = portfolio;
    }

    pub fn portfolio_history(&self) -> Vec<PortfolioPoint> {
        self.lock().portfolio_history.clone()
    }

    // -- System status -------------------------------------------------------

    pub fn status(&self) -> SystemStatus {
        let mut status = self.lock().status.clone();
        status.uptime_secs = (Utc::now() - self.started_at).num_seconds();
        status
    }

    pub fn set_running(&self, running: bool) {
        self.lock().status.is_running = running;
    }

    pub fn set_agents_active(&self, count: usize) {
        self.lock().status.agents_active = count;
    }

    pub fn increment_errors(&self) {
        self.lock().status.errors_24h += 1;
    }

    pub fn error_count(&self) -> u64 {
        self.lock().status.errors_24h
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
