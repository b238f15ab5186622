//! Advisory provider: optional LLM reasoning for council agents.
//!
//! Agents ask an `AdvisoryProvider` for a structured suggestion (vote,
//! confidence, rationale). Every way that can go wrong is a variant of
//! `AdvisoryFault`, and every variant means the same thing to the caller:
//! use the local heuristic instead.

pub mod anthropic;
pub mod openai;

use anyhow::Result;
use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::LlmSettings;
use crate::types::Vote;

/// Structured suggestion returned by an advisory provider.
#[derive(Debug, Clone, PartialEq)]
pub struct Advice {
    pub vote: Vote,
    /// Clamped into [0, 1]
    pub confidence: f64,
    pub rationale: String,
}

/// Why no advice is available. All variants trigger the local fallback.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AdvisoryFault {
    #[error("no advisory provider configured")]
    Unavailable,

    #[error("advisory call exceeded its {0:?} budget")]
    Timeout(Duration),

    #[error("advisory transport error: {0}")]
    Transport(String),

    #[error("advisory response malformed: {0}")]
    Malformed(String),
}

/// Source of structured advice for a role prompt + situation prompt.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AdvisoryProvider: Send + Sync {
    async fn suggest(
        &self,
        role_prompt: &str,
        situation_prompt: &str,
    ) -> Result<Advice, AdvisoryFault>;

    /// Provider name for logging.
    fn name(&self) -> String;
}

/// Raw chat-completion backend (Anthropic, OpenAI).
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String>;

    fn model_name(&self) -> &str;
}

/// Appended to every role prompt so providers answer in parseable JSON.
pub const JSON_INSTRUCTION: &str =
    "\n\nRespond ONLY with valid JSON. No markdown, no explanation.";

// ---------------------------------------------------------------------------
// Response parsing
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawAdvice {
    #[serde(default)]
    vote: Option<String>,
    #[serde(default)]
    confidence: Option<serde_json::Value>,
    #[serde(default)]
    reasoning: Option<String>,
    #[serde(default)]
    rationale: Option<String>,
}

/// Parse a provider reply into `Advice`.
///
/// Accepts bare JSON or JSON wrapped in a markdown code fence. Unknown votes
/// become ABSTAIN, confidence defaults to 0.5 and is clamped into [0, 1].
pub fn parse_advice(text: &str) -> Result<Advice, AdvisoryFault> {
    let body = strip_code_fence(text.trim());
    let raw: RawAdvice = serde_json::from_str(body)
        .map_err(|e| AdvisoryFault::Malformed(e.to_string()))?;

    let vote = raw
        .vote
        .as_deref()
        .map(Vote::parse_lenient)
        .unwrap_or(Vote::Abstain);

    let confidence = match raw.confidence {
        None => 0.5,
        Some(serde_json::Value::Number(n)) => n.as_f64().unwrap_or(0.5),
        Some(serde_json::Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| AdvisoryFault::Malformed(format!("confidence not numeric: {s}")))?,
        Some(other) => {
            return Err(AdvisoryFault::Malformed(format!(
                "confidence has unexpected type: {other}"
            )))
        }
    };
    if !confidence.is_finite() {
        return Err(AdvisoryFault::Malformed("confidence not finite".into()));
    }

    let rationale = raw
        .reasoning
        .or(raw.rationale)
        .filter(|r| !r.trim().is_empty())
        .unwrap_or_else(|| "Advisory analysis complete.".to_string());

    Ok(Advice {
        vote,
        confidence: confidence.clamp(0.0, 1.0),
        rationale,
    })
}

/// Strip a surrounding ```json ... ``` fence if present.
fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.trim_start();
    match rest.rfind("```") {
        Some(end) => rest[..end].trim(),
        None => rest.trim(),
    }
}

// ---------------------------------------------------------------------------
// LLM-backed advisor
// ---------------------------------------------------------------------------

/// Advisory provider backed by a chat-completion client, with a per-call
/// time budget.
pub struct LlmAdvisor {
    client: Box<dyn CompletionClient>,
    budget: Duration,
}

impl LlmAdvisor {
    pub fn new(client: Box<dyn CompletionClient>, budget: Duration) -> Self {
        Self { client, budget }
    }

    /// Pick the first configured provider: Anthropic, then OpenAI.
    /// Returns `None` when no key is set (agents run on heuristics).
    pub fn from_settings(settings: &LlmSettings) -> Result<Option<Arc<dyn AdvisoryProvider>>> {
        let budget = Duration::from_secs(settings.call_budget_secs.max(1));

        if let Some(key) = &settings.anthropic_api_key {
            let client = anthropic::AnthropicClient::new(
                key.expose_secret().clone(),
                Some(settings.anthropic_model.clone()),
                Some(settings.max_tokens),
            )?;
            info!(model = %settings.anthropic_model, "Advisory provider: Anthropic");
            return Ok(Some(Arc::new(Self::new(Box::new(client), budget))));
        }

        if let Some(key) = &settings.openai_api_key {
            let client = openai::OpenAiClient::new(
                key.expose_secret().clone(),
                Some(settings.openai_model.clone()),
                Some(settings.max_tokens),
            )?;
            info!(model = %settings.openai_model, "Advisory provider: OpenAI");
            return Ok(Some(Arc::new(Self::new(Box::new(client), budget))));
        }

        warn!("No LLM provider configured - agents will use rule-based fallback");
        Ok(None)
    }
}

#[async_trait]
impl AdvisoryProvider for LlmAdvisor {
    async fn suggest(
        &self,
        role_prompt: &str,
        situation_prompt: &str,
    ) -> Result<Advice, AdvisoryFault> {
        let system = format!("{role_prompt}{JSON_INSTRUCTION}");
        let reply = tokio::time::timeout(self.budget, self.client.complete(&system, situation_prompt))
            .await
            .map_err(|_| AdvisoryFault::Timeout(self.budget))?
            .map_err(|e| AdvisoryFault::Transport(format!("{e:#}")))?;

        let advice = parse_advice(&reply)?;
        debug!(
            model = self.client.model_name(),
            vote = %advice.vote,
            confidence = advice.confidence,
            "Advisory suggestion parsed"
        );
        Ok(advice)
    }

    fn name(&self) -> String {
        self.client.model_name().to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    struct CannedClient {
        reply: Result<String, String>,
        delay: Duration,
    }

    #[async_trait]
    impl CompletionClient for CannedClient {
        async fn complete(&self, _system: &str, _user: &str) -> Result<String> {
            tokio::time::sleep(self.delay).await;
            self.reply.clone().map_err(|e| anyhow::anyhow!(e))
        }

        fn model_name(&self) -> &str {
            "canned"
        }
    }

    fn advisor(reply: Result<&str, &str>, delay_ms: u64, budget_ms: u64) -> LlmAdvisor {
        LlmAdvisor::new(
            Box::new(CannedClient {
                reply: reply.map(String::from).map_err(String::from),
                delay: Duration::from_millis(delay_ms),
            }),
            Duration::from_millis(budget_ms),
        )
    }

    #[test]
    fn test_parse_plain_json() {
        let advice = parse_advice(r#"{"vote": "yes", "confidence": 0.72, "reasoning": "Strong base rate"}"#)
            .unwrap();
        assert_eq!(advice.vote, Vote::Yes);
        assert!((advice.confidence - 0.72).abs() < 1e-9);
        assert_eq!(advice.rationale, "Strong base rate");
    }

    #[test]
    fn test_parse_fenced_json() {
        let text = "```json\n{\"vote\": \"NO\", \"confidence\": \"0.4\"}\n```";
        let advice = parse_advice(text).unwrap();
        assert_eq!(advice.vote, Vote::No);
        assert!((advice.confidence - 0.4).abs() < 1e-9);
        assert_eq!(advice.rationale, "Advisory analysis complete.");
    }

    #[test]
    fn test_parse_clamps_and_defaults() {
        let advice = parse_advice(r#"{"vote": "perhaps", "confidence": 3.5}"#).unwrap();
        assert_eq!(advice.vote, Vote::Abstain);
        assert_eq!(advice.confidence, 1.0);

        let advice = parse_advice(r#"{"vote": "yes"}"#).unwrap();
        assert_eq!(advice.confidence, 0.5);
    }

    #[test]
    fn test_parse_malformed_text() {
        let err = parse_advice("I think you should buy, probably.").unwrap_err();
        assert!(matches!(err, AdvisoryFault::Malformed(_)));

        let err = parse_advice(r#"{"vote": "yes", "confidence": [1]}"#).unwrap_err();
        assert!(matches!(err, AdvisoryFault::Malformed(_)));
    }

    #[tokio::test]
    async fn test_advisor_success() {
        let a = advisor(Ok(r#"{"vote":"yes","confidence":0.8,"reasoning":"ok"}"#), 0, 1000);
        let advice = a.suggest("role", "situation").await.unwrap();
        assert_eq!(advice.vote, Vote::Yes);
        assert_eq!(a.name(), "canned");
    }

    #[tokio::test]
    async fn test_advisor_transport_error() {
        let a = advisor(Err("connection refused"), 0, 1000);
        let err = a.suggest("role", "situation").await.unwrap_err();
        assert!(matches!(err, AdvisoryFault::Transport(msg) if msg.contains("connection refused")));
    }

    #[tokio::test]
    async fn test_advisor_budget_exceeded() {
        let a = advisor(Ok("{}"), 200, 10);
        let err = a.suggest("role", "situation").await.unwrap_err();
        assert!(matches!(err, AdvisoryFault::Timeout(_)));
    }

    #[tokio::test]
    async fn test_advisor_malformed_reply() {
        let a = advisor(Ok("not json at all"), 0, 1000);
        let err = a.suggest("role", "situation").await.unwrap_err();
        assert!(matches!(err, AdvisoryFault::Malformed(_)));
    }

    #[test]
    fn test_no_keys_means_no_provider() {
        let settings = LlmSettings::default();
        assert!(LlmAdvisor::from_settings(&settings).unwrap().is_none());
    }
}
