//! The Sentiment Analyst: reads crowd momentum from price and volume.

use std::sync::Arc;

use super::{market_block, DeliberationContext, Role};
use crate::llm::{Advice, AdvisoryProvider};
use crate::types::{AgentKind, MarketSnapshot, Vote};

pub struct SentimentAnalyst {
    advisor: Option<Arc<dyn AdvisoryProvider>>,
}

impl SentimentAnalyst {
    pub fn new(advisor: Option<Arc<dyn AdvisoryProvider>>) -> Self {
        Self { advisor }
    }

    pub(crate) fn advisor(&self) -> Option<&Arc<dyn AdvisoryProvider>> {
        self.advisor.as_ref()
    }

    /// Price momentum scaled by how much volume backs it.
    fn momentum(snapshot: &MarketSnapshot) -> f64 {
        (snapshot.yes_price - 0.5) * (snapshot.volume_24h / 100_000.0).min(1.0)
    }
}

impl Role for SentimentAnalyst {
    const KIND: AgentKind = AgentKind::Sentiment;

    const ROLE_PROMPT: &'static str = "You are The Sentiment Analyst, an expert in crowd dynamics.

Read the crowd around the prediction market below:
1. What is social media saying about this topic?
2. Is sentiment rising or falling?
3. Is the mood fear, greed or uncertainty?

You value momentum and crowd psychology.

Answer as JSON:
{\"vote\": \"yes\" | \"no\" | \"abstain\", \"confidence\": 0.0-1.0, \"sentiment_score\": -1.0 to 1.0, \"reasoning\": \"...\"}";

    const DATA_SOURCES: &'static [&'static str] = &["twitter_trends", "reddit_sentiment", "discord_activity"];

    fn situation_prompt(&self, snapshot: &MarketSnapshot, ctx: &DeliberationContext) -> String {
        let social = match &ctx.social {
            Some(s) => format!(
                "MENTIONS (24H): {}\nSENTIMENT SCORE: {:.2}\nTRENDING: {}",
                s.mentions_24h,
                s.sentiment_score,
                if s.trending_terms.is_empty() {
                    "none".to_string()
                } else {
                    s.trending_terms.join(", ")
                }
            ),
            None => "No social data available.".to_string(),
        };

        format!(
            "Read the sentiment around this prediction market:\n\n{}\nSPREAD: {:.2}%\n\nSOCIAL SIGNALS:\n{social}\n\nIs the crowd moving? Should we ride it?",
            market_block(snapshot),
            snapshot.spread() * 100.0
        )
    }

    fn heuristic(&self, snapshot: &MarketSnapshot, _ctx: &DeliberationContext) -> Advice {
        let score = Self::momentum(snapshot);

        if score.abs() > 0.1 {
            let direction = if score > 0.0 { "bullish" } else { "bearish" };
            Advice {
                vote: Vote::Yes,
                confidence: (0.4 + score.abs()).min(0.75),
                rationale: format!(
                    "Strong {direction} sentiment detected. Momentum score: {score:.2}. Volume confirms crowd conviction."
                ),
            }
        } else if snapshot.spread() < 0.02 {
            Advice {
                vote: Vote::Yes,
                confidence: 0.6,
                rationale: "Tight spread indicates strong market consensus. Riding the crowd sentiment.".to_string(),
            }
        } else {
            Advice {
                vote: Vote::Abstain,
                confidence: 0.4,
                rationale: "Mixed signals. No clear sentiment trend to capitalize on.".to_string(),
            }
        }
    }
}
