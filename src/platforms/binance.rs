//! Binance spot order book.
//!
//! Polls the public REST depth endpoint (no auth). Levels arrive as string
//! pairs, `[["97000.10", "0.512"], ...]`.
//!
//! API: https://api.binance.com/api/v3/depth

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::{DepthSnapshot, OrderBookFeed};
use crate::config::CorrelationSettings;

#[derive(Debug, Deserialize)]
struct DepthResponse {
    #[serde(default)]
    bids: Vec<(String, String)>,
    #[serde(default)]
    asks: Vec<(String, String)>,
}

pub struct BinanceClient {
    http: Client,
    host: String,
    levels: usize,
}

impl BinanceClient {
    pub fn new(settings: &CorrelationSettings) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .context("Failed to build Binance HTTP client")?;
        Ok(Self {
            http,
            host: settings.exchange_host.trim_end_matches('/').to_string(),
            levels: settings.depth_levels,
        })
    }
}

/// Unparseable levels are skipped.
fn parse_levels(raw: &[(String, String)]) -> Vec<(f64, f64)> {
    raw.iter()
        .filter_map(|(p, q)| Some((p.parse().ok()?, q.parse().ok()?)))
        .collect()
}

#[async_trait]
impl OrderBookFeed for BinanceClient {
    async fn depth(&self, symbol: &str) -> Result<DepthSnapshot> {
        let url = format!("{}/api/v3/depth", self.host);
        let resp = self
            .http
            .get(&url)
            .query(&[("symbol", symbol.to_string()), ("limit", self.levels.to_string())])
            .send()
            .await
            .context("Binance depth request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            anyhow::bail!("Binance depth error {status} for {symbol}");
        }

        let body: DepthResponse = resp.json().await.context("Failed to parse Binance depth")?;
        let depth = DepthSnapshot {
            bids: parse_levels(&body.bids),
            asks: parse_levels(&body.asks),
        };
        debug!(symbol, bids = depth.bids.len(), asks = depth.asks.len(), "Depth fetched");
        Ok(depth)
    }
}
