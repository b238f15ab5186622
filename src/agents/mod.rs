//! Council agents: three voters with fixed roles.
//!
//! Every agent follows the same two-path procedure:
//! 1. Ask the advisory provider (if one is configured) with a role prompt
//!    and a situation prompt built from the snapshot and context.
//! 2. On any `AdvisoryFault`, run the role's deterministic heuristic.
//!
//! `analyze` never fails at its boundary. A snapshot that cannot be analysed
//! at all produces a fault verdict instead: ABSTAIN at 0.0 for the
//! fundamentalist and sentiment roles, NO at 1.0 for the risk manager.

pub mod fundamentalist;
pub mod risk;
pub mod sentiment;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use crate::llm::{Advice, AdvisoryFault, AdvisoryProvider};
use crate::types::{AgentAnalysis, AgentKind, AnalysisSource, MarketSnapshot, Portfolio, Vote};

pub use fundamentalist::Fundamentalist;
pub use risk::{RiskLimits, RiskManager};
pub use sentiment::SentimentAnalyst;

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// Social signal summary for the sentiment role.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SocialMetrics {
    pub mentions_24h: u64,
    /// -1.0 (bearish) to 1.0 (bullish)
    pub sentiment_score: f64,
    pub trending_terms: Vec<String>,
}

/// Typed side information for a deliberation. Absent fields fall back to
/// the default heuristic behaviour.
#[derive(Debug, Clone, Default)]
pub struct DeliberationContext {
    pub news: Vec<String>,
    pub social: Option<SocialMetrics>,
    pub portfolio: Option<Portfolio>,
}

impl DeliberationContext {
    pub fn with_news(mut self, news: Vec<String>) -> Self {
        self.news = news;
        self
    }

    pub fn with_social(mut self, social: SocialMetrics) -> Self {
        self.social = Some(social);
        self
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AgentFault {
    #[error("invalid market snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("agent missed its {0:?} deadline")]
    Deadline(std::time::Duration),

    #[error("agent task aborted: {0}")]
    Aborted(String),
}

// ---------------------------------------------------------------------------
// Analyst capability
// ---------------------------------------------------------------------------

/// Shared capability of every council member.
#[async_trait]
pub trait Analyst: Send + Sync {
    fn kind(&self) -> AgentKind;

    fn name(&self) -> &'static str {
        self.kind().display_name()
    }

    /// Produce a verdict. Infallible: faults become fault verdicts.
    async fn analyze(&self, snapshot: &MarketSnapshot, ctx: &DeliberationContext) -> AgentAnalysis;
}

/// Per-role behaviour plugged into the shared two-path runner.
pub(crate) trait Role {
    const KIND: AgentKind;
    const ROLE_PROMPT: &'static str;
    const DATA_SOURCES: &'static [&'static str];

    fn situation_prompt(&self, snapshot: &MarketSnapshot, ctx: &DeliberationContext) -> String;

    fn heuristic(&self, snapshot: &MarketSnapshot, ctx: &DeliberationContext) -> Advice;

    /// Verdict when the snapshot cannot be analysed.
    fn fault_verdict(&self, fault: &AgentFault) -> Advice {
        Advice {
            vote: Vote::Abstain,
            confidence: 0.0,
            rationale: format!("Analysis failed: {fault}"),
        }
    }

    /// Extra field the role attaches to its analysis.
    fn max_position_size(&self, _ctx: &DeliberationContext) -> Option<f64> {
        None
    }
}

/// One council member. A closed set of roles dispatched through `Analyst`.
pub enum CouncilAgent {
    Fundamentalist(Fundamentalist),
    Sentiment(SentimentAnalyst),
    RiskManager(RiskManager),
}

impl CouncilAgent {
    /// The standard three-member roster in voting order.
    pub fn roster(advisor: Option<Arc<dyn AdvisoryProvider>>, limits: RiskLimits) -> Vec<CouncilAgent> {
        vec![
            CouncilAgent::Fundamentalist(Fundamentalist::new(advisor.clone())),
            CouncilAgent::Sentiment(SentimentAnalyst::new(advisor.clone())),
            CouncilAgent::RiskManager(RiskManager::new(advisor, limits)),
        ]
    }
}

#[async_trait]
impl Analyst for CouncilAgent {
    fn kind(&self) -> AgentKind {
        match self {
            CouncilAgent::Fundamentalist(_) => AgentKind::Fundamentalist,
            CouncilAgent::Sentiment(_) => AgentKind::Sentiment,
            CouncilAgent::RiskManager(_) => AgentKind::RiskManager,
        }
    }

    async fn analyze(&self, snapshot: &MarketSnapshot, ctx: &DeliberationContext) -> AgentAnalysis {
        match self {
            CouncilAgent::Fundamentalist(a) => run_role(a, a.advisor(), snapshot, ctx).await,
            CouncilAgent::Sentiment(a) => run_role(a, a.advisor(), snapshot, ctx).await,
            CouncilAgent::RiskManager(a) => run_role(a, a.advisor(), snapshot, ctx).await,
        }
    }
}

// ---------------------------------------------------------------------------
// Two-path runner
// ---------------------------------------------------------------------------

pub(crate) async fn run_role<R: Role + Sync>(
    role: &R,
    advisor: Option<&Arc<dyn AdvisoryProvider>>,
    snapshot: &MarketSnapshot,
    ctx: &DeliberationContext,
) -> AgentAnalysis {
    let started = Instant::now();

    if let Err(reason) = snapshot.validate() {
        let fault = AgentFault::InvalidSnapshot(reason);
        warn!(agent = R::KIND.tag(), market = %snapshot.id, error = %fault, "Agent fault");
        let advice = role.fault_verdict(&fault);
        return build_analysis::<R>(advice, AnalysisSource::Fault, Vec::new(), None, started);
    }

    let (advice, source) = match consult(advisor, R::ROLE_PROMPT, || role.situation_prompt(snapshot, ctx)).await {
        Ok(advice) => (advice, AnalysisSource::Advisory),
        Err(fault) => {
            debug!(agent = R::KIND.tag(), reason = %fault, "Advisory unavailable, using heuristic");
            (role.heuristic(snapshot, ctx), AnalysisSource::Heuristic)
        }
    };

    let sources = R::DATA_SOURCES.iter().map(|s| s.to_string()).collect();
    build_analysis::<R>(advice, source, sources, role.max_position_size(ctx), started)
}

async fn consult(
    advisor: Option<&Arc<dyn AdvisoryProvider>>,
    role_prompt: &str,
    situation: impl FnOnce() -> String,
) -> Result<Advice, AdvisoryFault> {
    let advisor = advisor.ok_or(AdvisoryFault::Unavailable)?;
    advisor.suggest(role_prompt, &situation()).await
}

fn build_analysis<R: Role>(
    advice: Advice,
    source: AnalysisSource,
    data_sources: Vec<String>,
    max_position_size: Option<f64>,
    started: Instant,
) -> AgentAnalysis {
    AgentAnalysis {
        agent_kind: R::KIND,
        agent_name: R::KIND.display_name().to_string(),
        vote: advice.vote,
        confidence: advice.confidence.clamp(0.0, 1.0),
        rationale: advice.rationale,
        data_sources,
        elapsed_ms: started.elapsed().as_millis() as u64,
        source,
        max_position_size,
        timestamp: chrono::Utc::now(),
    }
}

/// Market block shared by every situation prompt.
pub(crate) fn market_block(snapshot: &MarketSnapshot) -> String {
    format!(
        "MARKET: {}\nCURRENT YES PRICE: {:.2}%\nCURRENT NO PRICE: {:.2}%\n24H VOLUME: ${:.0}\nLIQUIDITY: ${:.0}",
        snapshot.question,
        snapshot.yes_price * 100.0,
        snapshot.no_price * 100.0,
        snapshot.volume_24h,
        snapshot.liquidity,
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockAdvisoryProvider;

    fn scenario_a() -> MarketSnapshot {
        MarketSnapshot::new("m-a", "Will the bill pass?", 0.62, 0.38, 125_000.0, 85_000.0)
    }

    fn limits() -> RiskLimits {
        RiskLimits {
            max_single_trade: 500.0,
            volatility_threshold: 0.15,
        }
    }

    fn advisor_returning(result: Result<Advice, AdvisoryFault>) -> Arc<dyn AdvisoryProvider> {
        let mut mock = MockAdvisoryProvider::new();
        mock.expect_suggest().returning(move |_, _| result.clone());
        mock.expect_name().returning(|| "mock".to_string());
        Arc::new(mock)
    }

    #[tokio::test]
    async fn test_heuristic_roster_without_advisor() {
        let agents = CouncilAgent::roster(None, limits());
        let ctx = DeliberationContext::default();

        let fundamentalist = agents[0].analyze(&scenario_a(), &ctx).await;
        assert_eq!(fundamentalist.agent_kind, AgentKind::Fundamentalist);
        assert_eq!(fundamentalist.vote, Vote::No);
        assert_eq!(fundamentalist.confidence, 0.5);
        assert_eq!(fundamentalist.source, AnalysisSource::Heuristic);
        assert_eq!(
            fundamentalist.data_sources,
            vec!["news_feed", "market_data", "historical_patterns"]
        );

        let sentiment = agents[1].analyze(&scenario_a(), &ctx).await;
        assert_eq!(sentiment.agent_name, "The Sentiment Analyst");
        assert_eq!(
            sentiment.data_sources,
            vec!["twitter_trends", "reddit_sentiment", "discord_activity"]
        );

        let risk = agents[2].analyze(&scenario_a(), &ctx).await;
        assert_eq!(risk.agent_kind, AgentKind::RiskManager);
        assert_eq!(
            risk.data_sources,
            vec!["volatility_calc", "portfolio_analysis", "liquidity_check"]
        );
        assert_eq!(risk.max_position_size, Some(500.0));
    }

    #[tokio::test]
    async fn test_advisory_answer_is_used() {
        let advisor = advisor_returning(Ok(Advice {
            vote: Vote::Yes,
            confidence: 0.9,
            rationale: "Base rate strongly favours YES".into(),
        }));
        let agent = CouncilAgent::Fundamentalist(Fundamentalist::new(Some(advisor)));

        let analysis = agent.analyze(&scenario_a(), &DeliberationContext::default()).await;
        assert_eq!(analysis.vote, Vote::Yes);
        assert_eq!(analysis.confidence, 0.9);
        assert_eq!(analysis.source, AnalysisSource::Advisory);
    }

    #[tokio::test]
    async fn test_malformed_advice_falls_back_to_heuristic() {
        let advisor = advisor_returning(Err(AdvisoryFault::Malformed("not json".into())));
        for agent in CouncilAgent::roster(Some(advisor), limits()) {
            let analysis = agent.analyze(&scenario_a(), &DeliberationContext::default()).await;
            assert_eq!(analysis.source, AnalysisSource::Heuristic, "{}", agent.name());
        }
    }

    #[tokio::test]
    async fn test_transport_fault_falls_back() {
        let advisor = advisor_returning(Err(AdvisoryFault::Transport("503".into())));
        let agent = CouncilAgent::Fundamentalist(Fundamentalist::new(Some(advisor)));
        let analysis = agent.analyze(&scenario_a(), &DeliberationContext::default()).await;
        assert_eq!(analysis.vote, Vote::No);
        assert_eq!(analysis.confidence, 0.5);
    }

    #[tokio::test]
    async fn test_invalid_snapshot_fault_verdicts() {
        let bad = MarketSnapshot::new("bad", "Broken feed?", f64::NAN, 0.5, 1000.0, 1000.0);
        let agents = CouncilAgent::roster(None, limits());
        let ctx = DeliberationContext::default();

        let f = agents[0].analyze(&bad, &ctx).await;
        assert_eq!((f.vote, f.confidence, f.source), (Vote::Abstain, 0.0, AnalysisSource::Fault));

        let s = agents[1].analyze(&bad, &ctx).await;
        assert_eq!((s.vote, s.confidence), (Vote::Abstain, 0.0));

        let r = agents[2].analyze(&bad, &ctx).await;
        assert_eq!((r.vote, r.confidence, r.source), (Vote::No, 1.0, AnalysisSource::Fault));
        assert!(r.rationale.contains("VETO"));
    }

    #[tokio::test]
    async fn test_fault_skips_advisor() {
        let mut mock = MockAdvisoryProvider::new();
        mock.expect_suggest().times(0);
        let advisor: Arc<dyn AdvisoryProvider> = Arc::new(mock);
        let agent = CouncilAgent::Sentiment(SentimentAnalyst::new(Some(advisor)));

        let bad = MarketSnapshot::new("bad", "q", 0.5, 0.5, -1.0, 0.0);
        let analysis = agent.analyze(&bad, &DeliberationContext::default()).await;
        assert_eq!(analysis.source, AnalysisSource::Fault);
    }

    #[test]
    fn test_market_block_formatting() {
        let block = market_block(&scenario_a());
        assert!(block.contains("CURRENT YES PRICE: 62.00%"));
        assert!(block.contains("24H VOLUME: $125000"));
    }
}
