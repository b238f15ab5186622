//! Whale watcher: follows large trades by tracked wallets and turns them
//! into copy-trade signals.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tracing::{debug, error, info};

use crate::config::AppConfig;
use crate::platforms::{LeaderboardEntry, RawTrade, WhaleFeed};
use crate::state::StateStore;
use crate::types::{truncate, CopyTradeSignal, LogLevel, TradeSignal, WhaleActivity};

const SOURCE: &str = "whale_watcher";

/// Trades fetched per wallet per poll; only the newest is considered.
const TRADES_PER_WALLET: usize = 5;

/// Seen-set is cleared once it grows past this.
const MAX_SEEN_TX: usize = 1000;

/// Composite score above which a copy signal is agreed.
const AGREE_THRESHOLD: f64 = 0.55;

/// Assumed specialty fit until markets carry a category match.
const SPECIALTY_MATCH: f64 = 0.7;

/// Trust given to wallets discovered from the leaderboard.
const DISCOVERED_TRUST: f64 = 0.6;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WhaleProfile {
    pub address: String,
    pub alias: String,
    pub win_rate_30d: f64,
    pub pnl_30d: f64,
    pub avg_trade_size: f64,
    pub specialty: String,
    /// 0 to 1
    pub trust_score: f64,
}

impl WhaleProfile {
    fn new(
        address: &str,
        alias: &str,
        win_rate_30d: f64,
        pnl_30d: f64,
        avg_trade_size: f64,
        specialty: &str,
        trust_score: f64,
    ) -> Self {
        Self {
            address: address.to_string(),
            alias: alias.to_string(),
            win_rate_30d,
            pnl_30d,
            avg_trade_size,
            specialty: specialty.to_string(),
            trust_score,
        }
    }

    /// Profile for a wallet first seen on the leaderboard.
    pub fn discovered(entry: &LeaderboardEntry) -> Self {
        Self {
            address: entry.address.clone(),
            alias: entry
                .alias
                .clone()
                .unwrap_or_else(|| truncate(&entry.address, 10)),
            win_rate_30d: entry.win_rate.unwrap_or(0.5),
            pnl_30d: entry.pnl,
            avg_trade_size: entry.avg_trade_size.unwrap_or(10_000.0),
            specialty: "Unknown".to_string(),
            trust_score: DISCOVERED_TRUST,
        }
    }
}

/// Built-in roster of known high-PnL wallets.
pub fn default_whales() -> Vec<WhaleProfile> {
    vec![
        WhaleProfile::new(
            "0x9d84ce0306f8551e02efef1680475fc0f1dc1344",
            "ImJustKen (Domer)",
            0.52,
            2_930_000.0,
            15_000.0,
            "General/Poker",
            0.95,
        ),
        WhaleProfile::new(
            "0xc6587b11a2209e46dfe3928b31c5514a8e33b784",
            "Erasmus",
            0.71,
            1_300_000.0,
            25_000.0,
            "Politics/Polling",
            0.90,
        ),
        WhaleProfile::new(
            "0x492442EaB586F242B53bDa933fD5dE859c8A3782",
            "Anon Sports Whale",
            0.65,
            3_150_000.0,
            50_000.0,
            "Sports",
            0.88,
        ),
        WhaleProfile::new(
            "0x1234567890abcdef1234567890abcdef12345678",
            "kch123",
            0.68,
            10_800_000.0,
            50_000.0,
            "Sports/Super Bowl",
            0.92,
        ),
        WhaleProfile::new(
            "0x006cc834Cc092684F1B56626E23BEdB3835c16ea",
            "Top 15 Anon",
            0.60,
            5_160_000.0,
            10_000.0,
            "Unknown",
            0.85,
        ),
    ]
}

/// Sizing and filtering knobs for copy trading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CopyPolicy {
    pub min_trade_size: f64,
    pub copy_percentage: f64,
    pub max_single_trade: f64,
}

impl CopyPolicy {
    pub fn from_app(cfg: &AppConfig) -> Self {
        Self {
            min_trade_size: cfg.whale.min_trade_size,
            copy_percentage: cfg.whale.copy_percentage,
            max_single_trade: cfg.risk.max_single_trade,
        }
    }
}

struct Roster {
    whales: Vec<WhaleProfile>,
    seen_tx: HashSet<String>,
}

pub struct WhaleWatcher {
    roster: Mutex<Roster>,
    policy: CopyPolicy,
    state: Arc<StateStore>,
}

impl WhaleWatcher {
    pub fn new(whales: Vec<WhaleProfile>, policy: CopyPolicy, state: Arc<StateStore>) -> Self {
        info!(wallets = whales.len(), "Whale watcher initialised");
        Self {
            roster: Mutex::new(Roster {
                whales,
                seen_tx: HashSet::new(),
            }),
            policy,
            state,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Roster> {
        self.roster.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn policy(&self) -> CopyPolicy {
        self.policy
    }

    pub fn tracked(&self) -> usize {
        self.lock().whales.len()
    }

    /// Check every tracked wallet once. Returns the copy signals produced,
    /// agreed or not. Feed failures are logged and counted per wallet.
    pub async fn poll_once(&self, feed: &dyn WhaleFeed) -> Vec<CopyTradeSignal> {
        let whales = self.lock().whales.clone();
        let mut signals = Vec::new();

        for profile in &whales {
            let trades = match feed.recent_trades(&profile.address, TRADES_PER_WALLET).await {
                Ok(trades) => trades,
                Err(e) => {
                    error!(wallet = %truncate(&profile.address, 10), error = %e, "Whale feed request failed");
                    self.state.increment_errors();
                    continue;
                }
            };

            let Some(activity) = self.accept(profile, trades.into_iter().next()) else {
                continue;
            };
            self.state.add_whale_activity(activity.clone());

            let signal = self.evaluate(&activity, profile);
            if signal.ai_agrees {
                self.queue(&signal, profile);
            } else {
                debug!(alias = %profile.alias, confidence = signal.confidence, "Passing on whale trade");
            }
            signals.push(signal);
        }
        signals
    }

    /// Dedupe and size-filter the newest trade of one wallet.
    fn accept(&self, profile: &WhaleProfile, latest: Option<RawTrade>) -> Option<WhaleActivity> {
        let trade = latest?;
        {
            let mut roster = self.lock();
            if !roster.seen_tx.insert(trade.tx_hash.clone()) {
                return None;
            }
            if roster.seen_tx.len() > MAX_SEEN_TX {
                roster.seen_tx.clear();
            }
        }

        if trade.size < self.policy.min_trade_size {
            debug!(
                alias = %profile.alias,
                size = trade.size,
                min = self.policy.min_trade_size,
                "Ignoring small whale trade"
            );
            return None;
        }

        Some(WhaleActivity {
            wallet_address: profile.address.clone(),
            wallet_alias: profile.alias.clone(),
            market_id: trade.market_id,
            market_question: trade.market_question,
            direction: trade.direction,
            outcome: trade.outcome,
            size: trade.size,
            price: trade.price,
            tx_hash: trade.tx_hash,
            timestamp: trade.timestamp,
        })
    }

    /// Score a whale trade and size the copy.
    pub fn evaluate(&self, activity: &WhaleActivity, profile: &WhaleProfile) -> CopyTradeSignal {
        let recommended_size =
            (activity.size * self.policy.copy_percentage).min(self.policy.max_single_trade);

        let track_record = profile.win_rate_30d * profile.trust_score;
        let size_ratio = if profile.avg_trade_size > 0.0 {
            activity.size / profile.avg_trade_size
        } else {
            1.0
        };
        let conviction = size_ratio.min(1.0);
        let composite = track_record * 0.4 + conviction * 0.3 + SPECIALTY_MATCH * 0.3;
        let agrees = composite > AGREE_THRESHOLD;

        let rationale = format!(
            "{} ({:.0}% win rate) placed {} bet. Trust score: {:.0}%. Composite analysis: {:.0}%. {}",
            profile.alias,
            profile.win_rate_30d * 100.0,
            if size_ratio > 1.2 { "large" } else { "standard" },
            profile.trust_score * 100.0,
            composite * 100.0,
            if agrees {
                "FOLLOWING - Strong conviction signal"
            } else {
                "PASSING - Insufficient confidence"
            },
        );

        CopyTradeSignal {
            id: uuid::Uuid::new_v4().to_string(),
            whale_activity: activity.clone(),
            recommended_size,
            ai_agrees: agrees,
            rationale,
            confidence: composite,
        }
    }

    fn queue(&self, signal: &CopyTradeSignal, profile: &WhaleProfile) {
        let activity = &signal.whale_activity;
        self.state.add_signal(TradeSignal {
            id: signal.id.clone(),
            market_id: activity.market_id.clone(),
            market_question: activity.market_question.clone(),
            direction: activity.direction,
            outcome: activity.outcome,
            size: signal.recommended_size,
            confidence: signal.confidence,
            source: SOURCE.to_string(),
            timestamp: chrono::Utc::now(),
        });
        self.state.add_log(
            LogLevel::Success,
            SOURCE,
            format!(
                "COPY SIGNAL: Following {} into '{}' - ${:.0}",
                profile.alias,
                truncate(&activity.market_question, 30),
                signal.recommended_size
            ),
        );
        info!(
            alias = %profile.alias,
            market = %activity.market_id,
            size = signal.recommended_size,
            confidence = signal.confidence,
            "Copy signal queued"
        );
    }

    /// Tracked wallets by descending 30-day PnL. Ties keep roster order.
    pub fn leaderboard(&self) -> Vec<WhaleProfile> {
        let mut whales = self.lock().whales.clone();
        whales.sort_by(|a, b| b.pnl_30d.total_cmp(&a.pnl_30d));
        whales
    }

    /// Track a wallet, replacing any existing profile at the same address.
    pub fn add_whale(&self, profile: WhaleProfile) {
        let message = format!(
            "Added whale: {} ({})",
            profile.alias,
            truncate(&profile.address, 10)
        );
        {
            let mut roster = self.lock();
            match roster.whales.iter_mut().find(|w| w.address == profile.address) {
                Some(existing) => *existing = profile,
                None => roster.whales.push(profile),
            }
        }
        self.state.add_log(LogLevel::Info, SOURCE, message);
    }

    /// Stop tracking a wallet. Returns the removed profile.
    pub fn remove_whale(&self, address: &str) -> Option<WhaleProfile> {
        let removed = {
            let mut roster = self.lock();
            let idx = roster.whales.iter().position(|w| w.address == address)?;
            roster.whales.remove(idx)
        };
        self.state
            .add_log(LogLevel::Info, SOURCE, format!("Removed whale: {}", removed.alias));
        Some(removed)
    }

    /// Refresh known wallets from leaderboard rows and return profiles for
    /// wallets not yet tracked. Discovered wallets are not added.
    pub fn merge_leaderboard(&self, traders: &[LeaderboardEntry]) -> Vec<WhaleProfile> {
        let mut roster = self.lock();
        let mut discovered = Vec::new();
        for entry in traders {
            match roster
                .whales
                .iter_mut()
                .find(|w| w.address.eq_ignore_ascii_case(&entry.address))
            {
                Some(known) => {
                    known.pnl_30d = entry.pnl;
                    if let Some(win_rate) = entry.win_rate {
                        known.win_rate_30d = win_rate;
                    }
                    if let Some(avg) = entry.avg_trade_size {
                        known.avg_trade_size = avg;
                    }
                }
                None => discovered.push(WhaleProfile::discovered(entry)),
            }
        }
        discovered
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platforms::MockWhaleFeed;
    use crate::types::{TradeDirection, TradeOutcome};

    const POLICY: CopyPolicy = CopyPolicy {
        min_trade_size: 1_000.0,
        copy_percentage: 0.10,
        max_single_trade: 500.0,
    };

    fn raw(tx: &str, size: f64) -> RawTrade {
        RawTrade {
            tx_hash: tx.to_string(),
            market_id: "m1".into(),
            market_question: "Will the Chiefs win the Super Bowl?".into(),
            direction: TradeDirection::Buy,
            outcome: TradeOutcome::Yes,
            size,
            price: 0.45,
            timestamp: chrono::Utc::now(),
        }
    }

    fn single_whale() -> WhaleProfile {
        default_whales().remove(1) // Erasmus
    }

    fn watcher(whales: Vec<WhaleProfile>) -> (WhaleWatcher, Arc<StateStore>) {
        let state = Arc::new(StateStore::with_starting_cash(10_000.0));
        (WhaleWatcher::new(whales, POLICY, Arc::clone(&state)), state)
    }

    #[test]
    fn test_leaderboard_sorted_by_pnl_and_idempotent() {
        let (w, _) = watcher(default_whales());
        let first = w.leaderboard();
        assert_eq!(first[0].alias, "kch123");
        assert_eq!(first.last().map(|p| p.alias.as_str()), Some("Erasmus"));
        assert!(first.windows(2).all(|p| p[0].pnl_30d >= p[1].pnl_30d));
        assert_eq!(first, w.leaderboard());
    }

    #[test]
    fn test_copy_size_bounded() {
        let (w, _) = watcher(vec![single_whale()]);
        let profile = single_whale();
        let activity = w.accept(&profile, Some(raw("tx-a", 2_000.0))).unwrap();
        assert!((w.evaluate(&activity, &profile).recommended_size - 200.0).abs() < 1e-9);

        let big = w.accept(&profile, Some(raw("tx-b", 80_000.0))).unwrap();
        assert_eq!(w.evaluate(&big, &profile).recommended_size, 500.0);
    }

    #[test]
    fn test_composite_score() {
        let (w, _) = watcher(vec![single_whale()]);
        let profile = single_whale();
        // 0.71 * 0.9 * 0.4 + 1.0 * 0.3 + 0.21 = 0.7656
        let activity = w.accept(&profile, Some(raw("tx-1", 40_000.0))).unwrap();
        let signal = w.evaluate(&activity, &profile);
        assert!((signal.confidence - 0.7656).abs() < 1e-9);
        assert!(signal.ai_agrees);
        assert!(signal.rationale.contains("large bet"));

        // conviction 0.04 -> 0.2556 + 0.012 + 0.21 = 0.4776
        let small = w.accept(&profile, Some(raw("tx-2", 1_000.0))).unwrap();
        let signal = w.evaluate(&small, &profile);
        assert!(!signal.ai_agrees);
        assert!(signal.rationale.contains("PASSING"));
    }

    #[tokio::test]
    async fn test_poll_queues_agreed_signal_once() {
        let mut feed = MockWhaleFeed::new();
        feed.expect_recent_trades()
            .returning(|_, _| Ok(vec![raw("tx-99", 30_000.0), raw("tx-old", 5_000.0)]));
        let (w, state) = watcher(vec![single_whale()]);

        let signals = w.poll_once(&feed).await;
        assert_eq!(signals.len(), 1);
        assert!(signals[0].ai_agrees);
        assert_eq!(state.pending_signals().len(), 1);
        assert_eq!(state.whale_activities(10).len(), 1);
        assert!(state.logs(1)[0].message.starts_with("COPY SIGNAL: Following Erasmus"));

        // same newest tx is not processed twice
        assert!(w.poll_once(&feed).await.is_empty());
        assert_eq!(state.pending_signals().len(), 1);
    }

    #[tokio::test]
    async fn test_poll_ignores_small_trades_and_counts_feed_errors() {
        let mut feed = MockWhaleFeed::new();
        feed.expect_recent_trades()
            .withf(|wallet, _| wallet.starts_with("0xc658"))
            .returning(|_, _| Ok(vec![raw("tx-small", 500.0)]));
        feed.expect_recent_trades()
            .withf(|wallet, _| !wallet.starts_with("0xc658"))
            .returning(|_, _| Err(anyhow::anyhow!("connection reset")));

        let (w, state) = watcher(vec![single_whale(), default_whales().remove(0)]);
        assert!(w.poll_once(&feed).await.is_empty());
        assert!(state.whale_activities(10).is_empty());
        assert_eq!(state.error_count(), 1);
    }

    #[test]
    fn test_add_and_remove_whale() {
        let (w, state) = watcher(Vec::new());
        w.add_whale(single_whale());
        w.add_whale(single_whale());
        assert_eq!(w.tracked(), 1);
        assert!(state.logs(1)[0].message.starts_with("Added whale: Erasmus"));

        let removed = w.remove_whale("0xc6587b11a2209e46dfe3928b31c5514a8e33b784");
        assert_eq!(removed.map(|p| p.alias), Some("Erasmus".to_string()));
        assert_eq!(w.tracked(), 0);
        assert!(w.remove_whale("0xnobody").is_none());
    }

    #[test]
    fn test_merge_leaderboard() {
        let (w, _) = watcher(vec![single_whale()]);
        let rows = vec![
            LeaderboardEntry {
                address: "0xC6587B11A2209E46DFE3928B31C5514A8E33B784".into(),
                alias: None,
                pnl: 1_500_000.0,
                volume: 9_000_000.0,
                win_rate: Some(0.73),
                avg_trade_size: None,
            },
            LeaderboardEntry {
                address: "0xfeedbeefcafe0000".into(),
                alias: Some("newcomer".into()),
                pnl: 800_000.0,
                volume: 2_000_000.0,
                win_rate: None,
                avg_trade_size: None,
            },
        ];

        let discovered = w.merge_leaderboard(&rows);
        assert_eq!(discovered.len(), 1);
        assert_eq!(discovered[0].alias, "newcomer");
        assert_eq!(discovered[0].trust_score, 0.6);

        let known = &w.leaderboard()[0];
        assert_eq!(known.pnl_30d, 1_500_000.0);
        assert_eq!(known.win_rate_30d, 0.73);
        assert_eq!(w.tracked(), 1);
    }
}
