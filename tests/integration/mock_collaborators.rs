//! In-memory collaborators for integration testing.
//!
//! Deterministic stand-ins for the market data provider, the order venue
//! and the advisory provider. All state is in-memory and controllable from
//! test code.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Mutex;

use alpha_council::llm::{Advice, AdvisoryFault, AdvisoryProvider};
use alpha_council::platforms::{
    LeaderboardEntry, MarketDataProvider, MarketFilter, OrderAck, OrderRequest, OrderVenue,
    RawTrade, VenueError, WhaleFeed,
};
use alpha_council::types::{AgentKind, MarketSnapshot};

/// Serves a fixed list of markets.
pub struct StaticMarkets {
    markets: Vec<MarketSnapshot>,
}

impl StaticMarkets {
    pub fn new(markets: Vec<MarketSnapshot>) -> Self {
        Self { markets }
    }
}

#[async_trait]
impl MarketDataProvider for StaticMarkets {
    async fn list_markets(&self, filter: &MarketFilter) -> Result<Vec<MarketSnapshot>> {
        Ok(self
            .markets
            .iter()
            .filter(|m| filter.matches(m))
            .take(filter.limit)
            .cloned()
            .collect())
    }

    async fn get_market(&self, id: &str) -> Result<Option<MarketSnapshot>> {
        Ok(self.markets.iter().find(|m| m.id == id).cloned())
    }
}

/// Records every order; optionally fails all of them.
#[derive(Default)]
pub struct RecordingVenue {
    orders: Mutex<Vec<OrderRequest>>,
    force_error: Mutex<Option<VenueError>>,
}

impl RecordingVenue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_error(&self, error: VenueError) {
        *self.force_error.lock().unwrap() = Some(error);
    }

    pub fn orders(&self) -> Vec<OrderRequest> {
        self.orders.lock().unwrap().clone()
    }
}

#[async_trait]
impl OrderVenue for RecordingVenue {
    async fn place_order(&self, order: &OrderRequest) -> Result<OrderAck, VenueError> {
        self.orders.lock().unwrap().push(order.clone());
        if let Some(e) = self.force_error.lock().unwrap().clone() {
            return Err(e);
        }
        Ok(OrderAck {
            order_id: format!("rec-{}", self.orders.lock().unwrap().len()),
            status: "confirmed".into(),
        })
    }

    fn name(&self) -> String {
        "recording".into()
    }
}

/// Answers per role, keyed on the role named in the system prompt.
pub struct ScriptedAdvisor {
    script: Box<dyn Fn(AgentKind) -> Result<Advice, AdvisoryFault> + Send + Sync>,
}

impl ScriptedAdvisor {
    pub fn new<F>(script: F) -> Self
    where
        F: Fn(AgentKind) -> Result<Advice, AdvisoryFault> + Send + Sync + 'static,
    {
        Self {
            script: Box::new(script),
        }
    }

    fn role_of(prompt: &str) -> AgentKind {
        AgentKind::ALL
            .iter()
            .copied()
            .find(|k| prompt.contains(k.display_name()))
            .unwrap_or(AgentKind::Fundamentalist)
    }
}

#[async_trait]
impl AdvisoryProvider for ScriptedAdvisor {
    async fn suggest(&self, role_prompt: &str, _situation: &str) -> Result<Advice, AdvisoryFault> {
        (self.script)(Self::role_of(role_prompt))
    }

    fn name(&self) -> String {
        "scripted".into()
    }
}

/// Whale feed with no activity.
pub struct QuietFeed;

#[async_trait]
impl WhaleFeed for QuietFeed {
    async fn recent_trades(&self, _wallet: &str, _limit: usize) -> Result<Vec<RawTrade>> {
        Ok(Vec::new())
    }

    async fn top_traders(&self, _limit: usize) -> Result<Vec<LeaderboardEntry>> {
        Ok(Vec::new())
    }
}
