//! The Fundamentalist: fact-based view from volume and price dislocation.

use std::sync::Arc;

use super::{market_block, DeliberationContext, Role};
use crate::llm::{Advice, AdvisoryProvider};
use crate::types::{AgentKind, MarketSnapshot, Vote};

/// News items included in the situation prompt.
const MAX_NEWS_ITEMS: usize = 5;

pub struct Fundamentalist {
    advisor: Option<Arc<dyn AdvisoryProvider>>,
}

impl Fundamentalist {
    pub fn new(advisor: Option<Arc<dyn AdvisoryProvider>>) -> Self {
        Self { advisor }
    }

    pub(crate) fn advisor(&self) -> Option<&Arc<dyn AdvisoryProvider>> {
        self.advisor.as_ref()
    }
}

impl Role for Fundamentalist {
    const KIND: AgentKind = AgentKind::Fundamentalist;

    const ROLE_PROMPT: &'static str = "You are The Fundamentalist, a rigorous analyst who trusts only hard data.

Judge the prediction market below on verified facts:
1. Which known facts bear on the outcome?
2. What historical precedents and base rates apply?
3. Which official sources or announcements matter?

Ignore social media hype and speculation.

Answer as JSON:
{\"vote\": \"yes\" | \"no\" | \"abstain\", \"confidence\": 0.0-1.0, \"key_facts\": [\"...\"], \"reasoning\": \"...\"}";

    const DATA_SOURCES: &'static [&'static str] = &["news_feed", "market_data", "historical_patterns"];

    fn situation_prompt(&self, snapshot: &MarketSnapshot, ctx: &DeliberationContext) -> String {
        let news = if ctx.news.is_empty() {
            "No recent news available.".to_string()
        } else {
            ctx.news
                .iter()
                .take(MAX_NEWS_ITEMS)
                .map(|n| format!("- {n}"))
                .collect::<Vec<_>>()
                .join("\n")
        };

        format!(
            "Analyze this prediction market:\n\n{}\n\nRECENT NEWS:\n{news}\n\nShould we take a position? Analyze fundamentals only.",
            market_block(snapshot)
        )
    }

    /// High volume confirming a price far from 50/50 is an opportunity;
    /// thin volume is not enough to judge.
    fn heuristic(&self, snapshot: &MarketSnapshot, _ctx: &DeliberationContext) -> Advice {
        let mispricing = (snapshot.yes_price - 0.5).abs();

        if snapshot.volume_24h > 50_000.0 && mispricing > 0.15 {
            Advice {
                vote: Vote::Yes,
                confidence: (0.5 + mispricing).min(0.8),
                rationale: format!(
                    "High volume (${:.0}) confirms price direction. Mispricing of {:.1}% suggests opportunity.",
                    snapshot.volume_24h,
                    mispricing * 100.0
                ),
            }
        } else if snapshot.volume_24h < 5_000.0 {
            Advice {
                vote: Vote::Abstain,
                confidence: 0.3,
                rationale: format!(
                    "Insufficient volume (${:.0}) for confident fundamental analysis.",
                    snapshot.volume_24h
                ),
            }
        } else {
            Advice {
                vote: Vote::No,
                confidence: 0.5,
                rationale: "No clear fundamental edge detected. Price appears fairly valued.".to_string(),
            }
        }
    }
}
