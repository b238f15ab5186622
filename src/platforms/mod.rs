//! Venue integrations.
//!
//! Defines the collaborator traits the bot consumes and provides:
//! - Polymarket: Gamma market listing, CLOB order placement, wallet trade feed
//! - Paper: simulated fills against the last known price for demo mode
//! - Binance: top-of-book depth for the correlation signal
//! - NewsAPI: headlines handed to the council

pub mod binance;
pub mod news;
pub mod paper;
pub mod polymarket;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{MarketSnapshot, TradeDirection, TradeOutcome};

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Query for `MarketDataProvider::list_markets`.
#[derive(Debug, Clone)]
pub struct MarketFilter {
    pub limit: usize,
    pub active_only: bool,
    pub tag: Option<String>,
    pub min_volume: f64,
    pub min_liquidity: f64,
}

impl Default for MarketFilter {
    fn default() -> Self {
        Self {
            limit: 100,
            active_only: true,
            tag: None,
            min_volume: 0.0,
            min_liquidity: 0.0,
        }
    }
}

impl MarketFilter {
    pub fn matches(&self, market: &MarketSnapshot) -> bool {
        market.volume_24h >= self.min_volume
            && market.liquidity >= self.min_liquidity
            && self
                .tag
                .as_ref()
                .map_or(true, |t| market.tags.iter().any(|m| m.eq_ignore_ascii_case(t)))
    }
}

/// A limit order as handed to a venue.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderRequest {
    pub market_id: String,
    pub direction: TradeDirection,
    pub outcome: TradeOutcome,
    /// USDC notional
    pub size: f64,
    /// Limit price in [0, 1]
    pub price: f64,
}

/// Venue acknowledgement of an accepted order.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderAck {
    pub order_id: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum VenueError {
    /// Rejected locally before any network call.
    #[error("venue credentials not configured")]
    MissingCredentials,

    #[error("order rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("venue transport error: {0}")]
    Transport(String),
}

/// One fill from a wallet's trade history.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTrade {
    pub tx_hash: String,
    pub market_id: String,
    pub market_question: String,
    pub direction: TradeDirection,
    pub outcome: TradeOutcome,
    pub size: f64,
    pub price: f64,
    pub timestamp: DateTime<Utc>,
}

/// Leaderboard row from the whale feed.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LeaderboardEntry {
    pub address: String,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub pnl: f64,
    #[serde(default)]
    pub volume: f64,
    #[serde(default)]
    pub win_rate: Option<f64>,
    #[serde(default)]
    pub avg_trade_size: Option<f64>,
}

/// Top levels of an exchange order book as `(price, quantity)` pairs, best
/// first.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DepthSnapshot {
    pub bids: Vec<(f64, f64)>,
    pub asks: Vec<(f64, f64)>,
}

impl DepthSnapshot {
    pub fn bid_volume(&self) -> f64 {
        self.bids.iter().map(|(_, q)| q).sum()
    }

    pub fn ask_volume(&self) -> f64 {
        self.asks.iter().map(|(_, q)| q).sum()
    }

    /// Midpoint of the best bid and ask. `None` if either side is empty.
    pub fn mid_price(&self) -> Option<f64> {
        let (bid, _) = self.bids.first()?;
        let (ask, _) = self.asks.first()?;
        Some((bid + ask) / 2.0)
    }
}

// ---------------------------------------------------------------------------
// Collaborator traits
// ---------------------------------------------------------------------------

/// Source of market snapshots. Callers treat `Err` as "no data this pass".
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    async fn list_markets(&self, filter: &MarketFilter) -> Result<Vec<MarketSnapshot>>;

    async fn get_market(&self, market_id: &str) -> Result<Option<MarketSnapshot>>;
}

/// Order execution venue.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderVenue: Send + Sync {
    async fn place_order(&self, order: &OrderRequest) -> Result<OrderAck, VenueError>;

    /// Venue name for logging.
    fn name(&self) -> String;
}

/// Wallet activity and trader rankings.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WhaleFeed: Send + Sync {
    /// Most recent first.
    async fn recent_trades(&self, wallet: &str, limit: usize) -> Result<Vec<RawTrade>>;

    async fn top_traders(&self, limit: usize) -> Result<Vec<LeaderboardEntry>>;
}

/// Exchange order book depth.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderBookFeed: Send + Sync {
    async fn depth(&self, symbol: &str) -> Result<DepthSnapshot>;
}

/// Recent headlines relevant to a market question.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NewsFeed: Send + Sync {
    /// Newest first, at most `limit`.
    async fn headlines(&self, question: &str, limit: usize) -> Result<Vec<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_thresholds_and_tag() {
        let market = MarketSnapshot::new("m1", "Q?", 0.5, 0.5, 20_000.0, 5_000.0)
            .with_tags(&["Crypto"]);

        assert!(MarketFilter::default().matches(&market));

        let filter = MarketFilter {
            min_volume: 50_000.0,
            ..MarketFilter::default()
        };
        assert!(!filter.matches(&market));

        let filter = MarketFilter {
            tag: Some("crypto".into()),
            ..MarketFilter::default()
        };
        assert!(filter.matches(&market));

        let filter = MarketFilter {
            tag: Some("sports".into()),
            ..MarketFilter::default()
        };
        assert!(!filter.matches(&market));
    }

    #[test]
    fn test_depth_volumes_and_mid() {
        let depth = DepthSnapshot {
            bids: vec![(100.0, 2.0), (99.5, 1.0)],
            asks: vec![(101.0, 0.5), (101.5, 0.5)],
        };
        assert_eq!(depth.bid_volume(), 3.0);
        assert_eq!(depth.ask_volume(), 1.0);
        assert_eq!(depth.mid_price(), Some(100.5));
        assert_eq!(DepthSnapshot::default().mid_price(), None);
    }

    #[test]
    fn test_venue_error_display() {
        let err = VenueError::Rejected {
            status: 400,
            message: "bad price".into(),
        };
        assert_eq!(err.to_string(), "order rejected (400): bad price");
    }
}
