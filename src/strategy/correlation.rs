//! Correlation alpha: reads order book imbalance on the exchange pair and
//! buys cheap BTC strike markets when bids overwhelm asks in a moving tape.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::platforms::{DepthSnapshot, OrderBookFeed};
use crate::state::StateStore;
use crate::types::{AlphaSignal, AlphaSignalKind, MarketSnapshot};

/// Mid prices needed before the volatility check can pass.
const MIN_VOLATILITY_SAMPLES: usize = 10;

/// Confidence is `ratio / CONFIDENCE_SCALE`, capped.
const CONFIDENCE_SCALE: f64 = 5.0;
const MAX_CONFIDENCE: f64 = 0.95;

#[derive(Debug, Clone)]
pub struct AlphaPolicy {
    pub symbol: String,
    pub imbalance_threshold: f64,
    pub volatility_window: usize,
    pub volatility_move: f64,
    pub cooldown: Duration,
    pub strike_ceiling: f64,
    pub execute_confidence: f64,
    pub max_single_trade: f64,
}

impl AlphaPolicy {
    pub fn from_app(cfg: &AppConfig) -> Self {
        let c = &cfg.correlation;
        Self {
            symbol: c.symbol.clone(),
            imbalance_threshold: c.imbalance_threshold,
            volatility_window: c.volatility_window.max(MIN_VOLATILITY_SAMPLES + 1),
            volatility_move: c.volatility_move,
            cooldown: Duration::from_secs(c.cooldown_secs),
            strike_ceiling: c.strike_ceiling,
            execute_confidence: c.execute_confidence,
            max_single_trade: cfg.risk.max_single_trade,
        }
    }
}

#[derive(Default)]
struct Tape {
    mids: VecDeque<f64>,
    last_signal: Option<Instant>,
}

pub struct CorrelationAlpha {
    feed: Arc<dyn OrderBookFeed>,
    policy: AlphaPolicy,
    tape: Mutex<Tape>,
    state: Arc<StateStore>,
}

impl CorrelationAlpha {
    pub fn new(feed: Arc<dyn OrderBookFeed>, policy: AlphaPolicy, state: Arc<StateStore>) -> Self {
        info!(
            symbol = %policy.symbol,
            threshold = policy.imbalance_threshold,
            "Correlation alpha initialized"
        );
        Self {
            feed,
            policy,
            tape: Mutex::new(Tape::default()),
            state,
        }
    }

    pub fn policy(&self) -> &AlphaPolicy {
        &self.policy
    }

    fn tape(&self) -> MutexGuard<'_, Tape> {
        self.tape.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Fetch one depth snapshot and evaluate it.
    pub async fn poll_once(&self) -> Result<Option<AlphaSignal>> {
        let depth = self
            .feed
            .depth(&self.policy.symbol)
            .await
            .context("Order book fetch failed")?;
        Ok(self.observe(&depth, Instant::now()))
    }

    /// Feed one depth snapshot into the tape. Returns a signal when the
    /// imbalance clears the threshold in a volatile tape outside the
    /// cooldown; fired signals are recorded in the store.
    pub fn observe(&self, depth: &DepthSnapshot, now: Instant) -> Option<AlphaSignal> {
        let mid = depth.mid_price()?;
        self.state.add_spot_price(mid);

        let bids = depth.bid_volume();
        let asks = depth.ask_volume();

        let mut tape = self.tape();
        tape.mids.push_back(mid);
        while tape.mids.len() > self.policy.volatility_window {
            tape.mids.pop_front();
        }

        if asks <= 0.0 {
            return None;
        }
        let ratio = bids / asks;
        let volatile = is_volatile(&tape.mids, mid, self.policy.volatility_move);

        if let Some(last) = tape.last_signal {
            if now.saturating_duration_since(last) < self.policy.cooldown {
                return None;
            }
        }

        let (kind, confidence) = classify(ratio, volatile, self.policy.imbalance_threshold)?;
        tape.last_signal = Some(now);
        drop(tape);

        let signal = AlphaSignal {
            symbol: self.policy.symbol.clone(),
            kind,
            imbalance_ratio: ratio,
            bid_volume: bids,
            ask_volume: asks,
            price: mid,
            confidence,
            timestamp: Utc::now(),
        };
        debug!(ratio, confidence, kind = %kind, "Alpha signal");
        self.state.add_alpha_signal(signal.clone());
        Some(signal)
    }

    /// Only confident buy signals are traded.
    pub fn should_trade(&self, signal: &AlphaSignal) -> bool {
        signal.kind == AlphaSignalKind::StrongBuy && signal.confidence > self.policy.execute_confidence
    }

    /// Cheapest "Bitcoin ... exceed" market priced under the strike ceiling.
    pub fn pick_target(&self, markets: &[MarketSnapshot]) -> Option<MarketSnapshot> {
        markets
            .iter()
            .filter(|m| {
                let q = m.question.to_lowercase();
                q.contains("bitcoin") && q.contains("exceed")
            })
            .filter(|m| m.yes_price > 0.0 && m.yes_price < self.policy.strike_ceiling)
            .min_by(|a, b| a.yes_price.total_cmp(&b.yes_price))
            .cloned()
    }

    pub fn trade_size(&self, signal: &AlphaSignal) -> f64 {
        self.policy.max_single_trade * signal.confidence
    }
}

/// High-low range of the window relative to the current mid.
fn is_volatile(mids: &VecDeque<f64>, mid: f64, threshold: f64) -> bool {
    if mids.len() <= MIN_VOLATILITY_SAMPLES || mid <= 0.0 {
        return false;
    }
    let high = mids.iter().copied().fold(f64::MIN, f64::max);
    let low = mids.iter().copied().fold(f64::MAX, f64::min);
    (high - low) / mid > threshold
}

fn classify(ratio: f64, volatile: bool, threshold: f64) -> Option<(AlphaSignalKind, f64)> {
    if !volatile {
        return None;
    }
    if ratio > threshold {
        Some((AlphaSignalKind::StrongBuy, (ratio / CONFIDENCE_SCALE).min(MAX_CONFIDENCE)))
    } else if ratio < 1.0 / threshold {
        let inverse = if ratio > 0.0 { 1.0 / ratio } else { f64::INFINITY };
        Some((AlphaSignalKind::StrongSell, (inverse / CONFIDENCE_SCALE).min(MAX_CONFIDENCE)))
    } else {
        None
    }
}
