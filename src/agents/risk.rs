//! The Risk Manager: composite risk score and veto power.
//!
//! A NO from this role vetoes the whole council. When the snapshot cannot
//! be analysed the role votes NO at full confidence.

use std::sync::Arc;

use super::{market_block, AgentFault, DeliberationContext, Role};
use crate::config::RiskSettings;
use crate::llm::{Advice, AdvisoryProvider};
use crate::types::{AgentKind, MarketSnapshot, Vote};

/// Largest share of portfolio value a single position may take.
const MAX_PORTFOLIO_FRACTION: f64 = 0.10;

/// Below this liquidity, exit risk alone vetoes.
const MIN_LIQUIDITY: f64 = 10_000.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskLimits {
    pub max_single_trade: f64,
    pub volatility_threshold: f64,
}

impl From<&RiskSettings> for RiskLimits {
    fn from(s: &RiskSettings) -> Self {
        Self {
            max_single_trade: s.max_single_trade,
            volatility_threshold: s.volatility_threshold,
        }
    }
}

pub struct RiskManager {
    advisor: Option<Arc<dyn AdvisoryProvider>>,
    limits: RiskLimits,
}

impl RiskManager {
    pub fn new(advisor: Option<Arc<dyn AdvisoryProvider>>, limits: RiskLimits) -> Self {
        Self { advisor, limits }
    }

    pub(crate) fn advisor(&self) -> Option<&Arc<dyn AdvisoryProvider>> {
        self.advisor.as_ref()
    }

    /// Weighted spread, liquidity and volume risk, in [0, 1].
    pub fn risk_score(snapshot: &MarketSnapshot) -> f64 {
        let spread_risk = snapshot.spread() / 0.1;
        let liquidity_risk = 1.0 - (snapshot.liquidity / 50_000.0).min(1.0);
        let volume_risk = (1.0 - snapshot.volume_24h / 100_000.0).clamp(0.0, 1.0);
        (0.3 * spread_risk + 0.4 * liquidity_risk + 0.3 * volume_risk).clamp(0.0, 1.0)
    }

    /// Position ceiling: the per-trade cap, further limited to 10% of
    /// portfolio value when a portfolio is known.
    pub fn max_position(&self, ctx: &DeliberationContext) -> f64 {
        match &ctx.portfolio {
            Some(p) => self.limits.max_single_trade.min(p.total_value * MAX_PORTFOLIO_FRACTION),
            None => self.limits.max_single_trade,
        }
    }
}

impl Role for RiskManager {
    const KIND: AgentKind = AgentKind::RiskManager;

    const ROLE_PROMPT: &'static str = "You are The Risk Manager, the voice of caution.

Protect capital and veto bad risk/reward on the prediction market below:
1. What is the maximum loss scenario?
2. How volatile is this market?
3. Does the position fit portfolio risk limits?
4. Is the risk/reward at least 2:1?

Vote NO if volatility exceeds 15%, the position would exceed 10% of the portfolio, risk/reward is below 2:1, or activity looks manipulated.

Answer as JSON:
{\"vote\": \"yes\" | \"no\" | \"abstain\", \"confidence\": 0.0-1.0, \"risk_score\": 0.0-1.0, \"max_position_size\": number, \"reasoning\": \"...\"}";

    const DATA_SOURCES: &'static [&'static str] = &["volatility_calc", "portfolio_analysis", "liquidity_check"];

    fn situation_prompt(&self, snapshot: &MarketSnapshot, ctx: &DeliberationContext) -> String {
        let portfolio = match &ctx.portfolio {
            Some(p) => format!(
                "PORTFOLIO VALUE: ${:.0}\nCASH: ${:.0}\nOPEN POSITIONS: {}",
                p.total_value,
                p.cash_balance,
                p.positions.len()
            ),
            None => "Portfolio unknown.".to_string(),
        };

        format!(
            "Assess the risk of this prediction market:\n\n{}\nSPREAD: {:.2}%\n\n{portfolio}\nMAX SINGLE TRADE: ${:.0}\nVOLATILITY THRESHOLD: {:.0}%",
            market_block(snapshot),
            snapshot.spread() * 100.0,
            self.max_position(ctx),
            self.limits.volatility_threshold * 100.0,
        )
    }

    fn heuristic(&self, snapshot: &MarketSnapshot, ctx: &DeliberationContext) -> Advice {
        let risk = Self::risk_score(snapshot);
        let max_position = self.max_position(ctx);

        if risk > self.limits.volatility_threshold {
            Advice {
                vote: Vote::No,
                confidence: 0.9,
                rationale: format!(
                    "VETO: Risk score {risk:.2} exceeds threshold. Spread: {:.2}%, Liquidity: ${:.0}",
                    snapshot.spread() * 100.0,
                    snapshot.liquidity
                ),
            }
        } else if snapshot.liquidity < MIN_LIQUIDITY {
            Advice {
                vote: Vote::No,
                confidence: 0.85,
                rationale: format!(
                    "VETO: Insufficient liquidity (${:.0}). Exit risk too high.",
                    snapshot.liquidity
                ),
            }
        } else if risk > 0.5 {
            Advice {
                vote: Vote::Abstain,
                confidence: 0.6,
                rationale: format!(
                    "Elevated risk ({risk:.2}). Proceed with reduced position size: ${:.0}",
                    max_position * 0.5
                ),
            }
        } else {
            Advice {
                vote: Vote::Yes,
                confidence: 0.7,
                rationale: format!(
                    "Risk acceptable ({risk:.2}). Max position: ${max_position:.0}. Good liquidity and tight spread."
                ),
            }
        }
    }

    fn fault_verdict(&self, fault: &AgentFault) -> Advice {
        Advice {
            vote: Vote::No,
            confidence: 1.0,
            rationale: format!("Risk analysis failed - defaulting to VETO: {fault}"),
        }
    }

    fn max_position_size(&self, ctx: &DeliberationContext) -> Option<f64> {
        Some(self.max_position(ctx))
    }
}
