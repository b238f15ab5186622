//! Shared types for the council bot.
//!
//! These types form the data model used across all modules. Agents, the
//! council, the execution gate and the state store all exchange these
//! values, so they carry no behaviour beyond small derived quantities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

// ---------------------------------------------------------------------------
// Market snapshot
// ---------------------------------------------------------------------------

/// Immutable view of one market at decision time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MarketSnapshot {
    pub id: String,
    pub question: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Current YES price (0.0–1.0)
    pub yes_price: f64,
    /// Current NO price (0.0–1.0). Need not sum to 1 with `yes_price`.
    pub no_price: f64,
    /// 24-hour volume in USDC
    pub volume_24h: f64,
    /// Available liquidity in USDC
    pub liquidity: f64,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl fmt::Display for MarketSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (YES: {:.0}¢ | NO: {:.0}¢ | vol: ${:.0} | liq: ${:.0})",
            self.question,
            self.yes_price * 100.0,
            self.no_price * 100.0,
            self.volume_24h,
            self.liquidity,
        )
    }
}

impl MarketSnapshot {
    pub fn new(
        id: impl Into<String>,
        question: impl Into<String>,
        yes_price: f64,
        no_price: f64,
        volume_24h: f64,
        liquidity: f64,
    ) -> Self {
        Self {
            id: id.into(),
            question: question.into(),
            description: None,
            yes_price,
            no_price,
            volume_24h,
            liquidity,
            tags: Vec::new(),
        }
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    /// Absolute difference between the YES and NO prices.
    pub fn spread(&self) -> f64 {
        (self.yes_price - self.no_price).abs()
    }

    /// Price of the given outcome.
    pub fn price_of(&self, outcome: TradeOutcome) -> f64 {
        match outcome {
            TradeOutcome::Yes => self.yes_price,
            TradeOutcome::No => self.no_price,
        }
    }

    /// Check that the snapshot is numerically sane.
    pub fn validate(&self) -> Result<(), String> {
        for (name, price) in [("yes_price", self.yes_price), ("no_price", self.no_price)] {
            if !price.is_finite() || !(0.0..=1.0).contains(&price) {
                return Err(format!("{name} out of range: {price}"));
            }
        }
        if !self.volume_24h.is_finite() || self.volume_24h < 0.0 {
            return Err(format!("invalid volume_24h: {}", self.volume_24h));
        }
        if !self.liquidity.is_finite() || self.liquidity < 0.0 {
            return Err(format!("invalid liquidity: {}", self.liquidity));
        }
        Ok(())
    }

    /// Truncated question for one-line log messages.
    pub fn short_question(&self, max_chars: usize) -> String {
        truncate(&self.question, max_chars)
    }
}

/// Truncate on a char boundary, appending "..." when shortened.
pub fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let head: String = text.chars().take(max_chars).collect();
        format!("{head}...")
    }
}

// ---------------------------------------------------------------------------
// Votes & agents
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vote {
    Yes,
    No,
    Abstain,
}

impl fmt::Display for Vote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Vote::Yes => write!(f, "YES"),
            Vote::No => write!(f, "NO"),
            Vote::Abstain => write!(f, "ABSTAIN"),
        }
    }
}

impl Vote {
    /// Lenient parse used for advisory answers; anything unknown abstains.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "yes" => Vote::Yes,
            "no" => Vote::No,
            _ => Vote::Abstain,
        }
    }
}

/// Role of a council member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    Fundamentalist,
    Sentiment,
    RiskManager,
}

impl AgentKind {
    pub const ALL: &'static [AgentKind] = &[
        AgentKind::Fundamentalist,
        AgentKind::Sentiment,
        AgentKind::RiskManager,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            AgentKind::Fundamentalist => "The Fundamentalist",
            AgentKind::Sentiment => "The Sentiment Analyst",
            AgentKind::RiskManager => "The Risk Manager",
        }
    }

    /// Tag used as the log `source` for this role.
    pub fn tag(&self) -> &'static str {
        match self {
            AgentKind::Fundamentalist => "fundamentalist",
            AgentKind::Sentiment => "sentiment",
            AgentKind::RiskManager => "risk_manager",
        }
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// Which path produced an analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisSource {
    Advisory,
    Heuristic,
    Fault,
}

/// One agent's verdict on one snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentAnalysis {
    pub agent_kind: AgentKind,
    pub agent_name: String,
    pub vote: Vote,
    /// Self-reported confidence (0–1)
    pub confidence: f64,
    pub rationale: String,
    pub data_sources: Vec<String>,
    pub elapsed_ms: u64,
    pub source: AnalysisSource,
    /// Largest position the risk manager would accept (risk manager only).
    #[serde(default)]
    pub max_position_size: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl fmt::Display for AgentAnalysis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} (conf: {:.0}%) - {}",
            self.agent_name,
            self.vote,
            self.confidence * 100.0,
            truncate(&self.rationale, 80),
        )
    }
}

// ---------------------------------------------------------------------------
// Trade direction / outcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeDirection {
    Buy,
    Sell,
}

impl fmt::Display for TradeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeDirection::Buy => write!(f, "BUY"),
            TradeDirection::Sell => write!(f, "SELL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeOutcome {
    Yes,
    No,
}

impl fmt::Display for TradeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeOutcome::Yes => write!(f, "YES"),
            TradeOutcome::No => write!(f, "NO"),
        }
    }
}

// ---------------------------------------------------------------------------
// Council decision
// ---------------------------------------------------------------------------

/// Aggregate verdict for one deliberation. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouncilDecision {
    pub id: String,
    pub market_id: String,
    pub market_question: String,
    pub analyses: Vec<AgentAnalysis>,
    pub final_decision: Vote,
    /// Fraction of valid analyses voting YES (0–1)
    pub consensus_score: f64,
    pub yes_votes: usize,
    pub no_votes: usize,
    pub should_execute: bool,
    pub recommended_direction: Option<TradeDirection>,
    pub recommended_outcome: Option<TradeOutcome>,
    pub recommended_size: Option<f64>,
    pub summary: String,
    pub timestamp: DateTime<Utc>,
}

impl fmt::Display for CouncilDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} on '{}' ({}/{} votes, consensus {:.0}%)",
            self.final_decision,
            truncate(&self.market_question, 40),
            self.yes_votes,
            self.analyses.len(),
            self.consensus_score * 100.0,
        )
    }
}

impl CouncilDecision {
    /// Whether the risk manager vetoed this decision.
    pub fn was_vetoed(&self) -> bool {
        self.analyses
            .iter()
            .any(|a| a.agent_kind == AgentKind::RiskManager && a.vote == Vote::No)
    }
}

// ---------------------------------------------------------------------------
// Trades, positions, portfolio
// ---------------------------------------------------------------------------

/// An order that the venue accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub id: String,
    pub market_id: String,
    pub market_question: String,
    pub direction: TradeDirection,
    pub outcome: TradeOutcome,
    /// Notional in USDC
    pub size: f64,
    pub price: f64,
    /// Order reference returned by the venue
    pub order_ref: Option<String>,
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

impl fmt::Display for Trade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} on '{}' ${:.2} @ {:.0}¢",
            self.direction,
            self.outcome,
            truncate(&self.market_question, 40),
            self.size,
            self.price * 100.0,
        )
    }
}

/// An open position held by the bot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Position {
    pub market_id: String,
    pub market_question: String,
    pub outcome: TradeOutcome,
    /// USDC committed
    pub size: f64,
    pub shares: f64,
    pub entry_price: f64,
    pub current_price: f64,
}

impl Position {
    pub fn current_value(&self) -> f64 {
        self.shares * self.current_price
    }

    pub fn unrealized_pnl(&self) -> f64 {
        self.current_value() - self.size
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pnl = self.unrealized_pnl();
        let pnl_sign = if pnl >= 0.0 { "+" } else { "" };
        write!(
            f,
            "{} {} size=${:.2} entry={:.0}¢ now={:.0}¢ ({pnl_sign}{pnl:.2})",
            self.outcome,
            self.market_id,
            self.size,
            self.entry_price * 100.0,
            self.current_price * 100.0,
        )
    }
}

/// The bot's single portfolio. Replaced wholesale on every update.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Portfolio {
    pub total_value: f64,
    pub cash_balance: f64,
    pub positions: Vec<Position>,
    pub daily_pnl: f64,
    pub total_pnl: f64,
    pub trade_count: u64,
    pub win_count: u64,
    /// Value the session started from; `total_pnl` is measured against it.
    #[serde(default)]
    pub starting_value: f64,
    /// Value at the first update of the current UTC day.
    #[serde(default)]
    pub day_open_value: f64,
    pub updated_at: DateTime<Utc>,
}

impl Portfolio {
    pub fn new(starting_cash: f64) -> Self {
        Self {
            total_value: starting_cash,
            cash_balance: starting_cash,
            positions: Vec::new(),
            daily_pnl: 0.0,
            total_pnl: 0.0,
            trade_count: 0,
            win_count: 0,
            starting_value: starting_cash,
            day_open_value: starting_cash,
            updated_at: Utc::now(),
        }
    }

    /// Recompute total value and both PnL figures from cash plus the
    /// current marks. The day opens at the last value seen before the UTC
    /// date changed.
    pub fn mark_to_market(&mut self) {
        if Utc::now().date_naive() != self.updated_at.date_naive() {
            self.day_open_value = self.total_value;
        }
        self.total_value = self.cash_balance + self.positions_value();
        self.total_pnl = self.total_value - self.starting_value;
        self.daily_pnl = self.total_value - self.day_open_value;
    }

    /// Mark-to-market value of all open positions.
    pub fn positions_value(&self) -> f64 {
        self.positions.iter().map(Position::current_value).sum()
    }

    pub fn win_rate(&self) -> f64 {
        if self.trade_count == 0 {
            0.0
        } else {
            self.win_count as f64 / self.trade_count as f64
        }
    }
}

impl fmt::Display for Portfolio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "value=${:.2} cash=${:.2} positions={} daily=${:.2} total=${:.2}",
            self.total_value,
            self.cash_balance,
            self.positions.len(),
            self.daily_pnl,
            self.total_pnl,
        )
    }
}

/// One point in the portfolio value chart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

// ---------------------------------------------------------------------------
// Signals, watched markets, whales
// ---------------------------------------------------------------------------

/// A trade idea waiting to be acted on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeSignal {
    pub id: String,
    pub market_id: String,
    pub market_question: String,
    pub direction: TradeDirection,
    pub outcome: TradeOutcome,
    pub size: f64,
    pub confidence: f64,
    /// Producer tag, e.g. "whale_watcher"
    pub source: String,
    pub timestamp: DateTime<Utc>,
}

/// A market in the sniper scope, with its tracked YES price history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchedMarket {
    pub snapshot: MarketSnapshot,
    pub reason: String,
    pub added_at: DateTime<Utc>,
    pub price_history: Vec<PricePoint>,
}

impl WatchedMarket {
    pub fn new(snapshot: MarketSnapshot, reason: impl Into<String>) -> Self {
        Self {
            snapshot,
            reason: reason.into(),
            added_at: Utc::now(),
            price_history: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub yes_price: f64,
}

/// A large trade by a tracked wallet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhaleActivity {
    pub wallet_address: String,
    pub wallet_alias: String,
    pub market_id: String,
    pub market_question: String,
    pub direction: TradeDirection,
    pub outcome: TradeOutcome,
    pub size: f64,
    pub price: f64,
    pub tx_hash: String,
    pub timestamp: DateTime<Utc>,
}

impl fmt::Display for WhaleActivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} ${:.0} on '{}'",
            truncate(&self.wallet_address, 10),
            self.direction,
            self.outcome,
            self.size,
            truncate(&self.market_question, 30),
        )
    }
}

/// Recommendation derived from a whale trade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CopyTradeSignal {
    pub id: String,
    pub whale_activity: WhaleActivity,
    pub recommended_size: f64,
    pub ai_agrees: bool,
    pub rationale: String,
    pub confidence: f64,
}

// ---------------------------------------------------------------------------
// Exchange correlation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlphaSignalKind {
    StrongBuy,
    StrongSell,
}

impl fmt::Display for AlphaSignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlphaSignalKind::StrongBuy => write!(f, "STRONG_BUY"),
            AlphaSignalKind::StrongSell => write!(f, "STRONG_SELL"),
        }
    }
}

/// Order book imbalance reading on the exchange pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlphaSignal {
    pub symbol: String,
    pub kind: AlphaSignalKind,
    pub imbalance_ratio: f64,
    pub bid_volume: f64,
    pub ask_volume: f64,
    /// Mid price when the signal fired.
    pub price: f64,
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
}

impl fmt::Display for AlphaSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Ratio: {:.2}) - Conf: {:.0}%",
            self.kind,
            self.imbalance_ratio,
            self.confidence * 100.0
        )
    }
}

/// Exchange spot price sample for the comparison chart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotPoint {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
}

// ---------------------------------------------------------------------------
// Audit log
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Success,
    Warning,
    Error,
    Trade,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Success => "SUCCESS",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
            LogLevel::Trade => "TRADE",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    pub source: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] {}: {}",
            self.timestamp.format("%H:%M:%S"),
            self.level,
            self.source,
            self.message,
        )
    }
}

// ---------------------------------------------------------------------------
// System status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemStatus {
    pub is_running: bool,
    pub agents_active: usize,
    pub markets_watched: usize,
    pub active_positions: usize,
    pub pending_signals: usize,
    pub errors_24h: u64,
    pub last_trade_time: Option<DateTime<Utc>>,
    pub uptime_secs: i64,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
