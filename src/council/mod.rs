//! The council: concurrent deliberation and the veto/threshold tally.
//!
//! `deliberate` runs every agent in its own task so a panicking or stalled
//! agent cannot take its siblings down. Faulted agents are left out of the
//! tally and counted as system errors. The tally itself is a pure function.

use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use crate::agents::{AgentFault, Analyst, CouncilAgent, DeliberationContext, RiskLimits};
use crate::config::AppConfig;
use crate::llm::AdvisoryProvider;
use crate::state::StateStore;
use crate::types::{
    AgentAnalysis, AgentKind, CouncilDecision, LogLevel, MarketSnapshot, TradeDirection,
    TradeOutcome, Vote,
};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CouncilConfig {
    /// Fraction of valid votes that must be YES.
    pub voting_threshold: f64,
    /// Upper bound on any recommended size.
    pub max_single_trade: f64,
    /// Per-agent deadline; `None` waits indefinitely.
    pub agent_timeout: Option<Duration>,
}

impl CouncilConfig {
    pub fn from_app(config: &AppConfig) -> Self {
        Self {
            voting_threshold: config.council.voting_threshold,
            max_single_trade: config.risk.max_single_trade,
            agent_timeout: config.council.agent_timeout(),
        }
    }
}

/// Roster entry for the status API.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AgentStatus {
    pub name: String,
    pub kind: AgentKind,
    pub active: bool,
}

// ---------------------------------------------------------------------------
// Council
// ---------------------------------------------------------------------------

pub struct Council {
    agents: Vec<Arc<dyn Analyst>>,
    state: Arc<StateStore>,
    config: CouncilConfig,
}

impl Council {
    pub fn new(agents: Vec<Arc<dyn Analyst>>, state: Arc<StateStore>, config: CouncilConfig) -> Self {
        state.set_agents_active(agents.len());
        info!(
            agents = agents.len(),
            threshold = config.voting_threshold,
            timeout = ?config.agent_timeout,
            "Council initialized"
        );
        Self { agents, state, config }
    }

    /// Standard three-member council built from application config.
    pub fn from_config(
        config: &AppConfig,
        advisor: Option<Arc<dyn AdvisoryProvider>>,
        state: Arc<StateStore>,
    ) -> Self {
        let agents = CouncilAgent::roster(advisor, RiskLimits::from(&config.risk))
            .into_iter()
            .map(|a| Arc::new(a) as Arc<dyn Analyst>)
            .collect();
        Self::new(agents, state, CouncilConfig::from_app(config))
    }

    pub fn config(&self) -> &CouncilConfig {
        &self.config
    }

    pub fn agent_roster(&self) -> Vec<AgentStatus> {
        self.agents
            .iter()
            .map(|a| AgentStatus {
                name: a.name().to_string(),
                kind: a.kind(),
                active: true,
            })
            .collect()
    }

    /// All agents analyse the snapshot concurrently; returns the recorded
    /// decision.
    pub async fn deliberate(
        &self,
        snapshot: &MarketSnapshot,
        mut ctx: DeliberationContext,
    ) -> CouncilDecision {
        ctx.portfolio = Some(self.state.portfolio());

        self.state.add_log(
            LogLevel::Info,
            "council",
            format!("COUNCIL CONVENED: Analyzing '{}'", snapshot.short_question(50)),
        );
        info!(market = %snapshot.id, agents = self.agents.len(), "Council convened");

        let shared_snapshot = Arc::new(snapshot.clone());
        let shared_ctx = Arc::new(ctx);

        let handles: Vec<_> = self
            .agents
            .iter()
            .map(|agent| {
                let agent = Arc::clone(agent);
                let snapshot = Arc::clone(&shared_snapshot);
                let ctx = Arc::clone(&shared_ctx);
                let deadline = self.config.agent_timeout;
                tokio::spawn(async move {
                    match deadline {
                        Some(limit) => tokio::time::timeout(limit, agent.analyze(&snapshot, &ctx))
                            .await
                            .map_err(|_| AgentFault::Deadline(limit)),
                        None => Ok(agent.analyze(&snapshot, &ctx).await),
                    }
                })
            })
            .collect();

        let outcomes = join_all(handles).await;

        let mut analyses = Vec::with_capacity(self.agents.len());
        for (agent, outcome) in self.agents.iter().zip(outcomes) {
            let result = outcome.unwrap_or_else(|join_err| Err(AgentFault::Aborted(join_err.to_string())));
            match result {
                Ok(analysis) => {
                    self.state.add_log(
                        LogLevel::Info,
                        analysis.agent_kind.tag(),
                        format!("  {analysis}"),
                    );
                    analyses.push(analysis);
                }
                Err(fault) => {
                    error!(agent = agent.name(), market = %snapshot.id, error = %fault, "Agent failed");
                    self.state.increment_errors();
                }
            }
        }

        let decision = tally(snapshot, analyses, &self.config);
        info!(
            market = %snapshot.id,
            decision = %decision.final_decision,
            consensus = decision.consensus_score,
            execute = decision.should_execute,
            "Council decision"
        );
        self.state.add_decision(decision.clone());
        decision
    }
}

// ---------------------------------------------------------------------------
// Tally
// ---------------------------------------------------------------------------

/// Combine valid analyses into a decision.
///
/// A risk-manager NO vetoes. Otherwise the YES share of valid votes must
/// reach the threshold. An approval recommends buying the cheaper side,
/// sized by the average YES confidence and capped at `max_single_trade`.
pub fn tally(
    snapshot: &MarketSnapshot,
    analyses: Vec<AgentAnalysis>,
    config: &CouncilConfig,
) -> CouncilDecision {
    let yes_votes = analyses.iter().filter(|a| a.vote == Vote::Yes).count();
    let no_votes = analyses.iter().filter(|a| a.vote == Vote::No).count();
    let total = analyses.len();
    let consensus_score = yes_votes as f64 / total.max(1) as f64;

    let vetoed = analyses
        .iter()
        .any(|a| a.agent_kind == AgentKind::RiskManager && a.vote == Vote::No);

    let avg_yes_confidence = analyses
        .iter()
        .filter(|a| a.vote == Vote::Yes)
        .map(|a| a.confidence)
        .sum::<f64>()
        / yes_votes.max(1) as f64;
    let size = config
        .max_single_trade
        .min(config.max_single_trade * avg_yes_confidence);

    let (final_decision, should_execute, summary) = if vetoed {
        (
            Vote::No,
            false,
            "VETOED by Risk Manager. Trade rejected for safety.".to_string(),
        )
    } else if yes_votes > 0 && consensus_score >= config.voting_threshold && size > 0.0 {
        (
            Vote::Yes,
            true,
            format!(
                "APPROVED: {yes_votes}/{total} agents voted YES. Consensus: {:.0}%",
                consensus_score * 100.0
            ),
        )
    } else {
        (
            Vote::No,
            false,
            format!(
                "REJECTED: Only {yes_votes}/{total} voted YES. Below {:.0}% threshold.",
                config.voting_threshold * 100.0
            ),
        )
    };

    let (recommended_direction, recommended_outcome, recommended_size) = if should_execute {
        let outcome = if snapshot.yes_price < 0.5 {
            TradeOutcome::Yes
        } else {
            TradeOutcome::No
        };
        (Some(TradeDirection::Buy), Some(outcome), Some(size))
    } else {
        (None, None, None)
    };

    CouncilDecision {
        id: uuid::Uuid::new_v4().to_string(),
        market_id: snapshot.id.clone(),
        market_question: snapshot.question.clone(),
        analyses,
        final_decision,
        consensus_score,
        yes_votes,
        no_votes,
        should_execute,
        recommended_direction,
        recommended_outcome,
        recommended_size,
        summary,
        timestamp: chrono::Utc::now(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
