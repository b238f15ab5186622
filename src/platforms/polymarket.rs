//! Polymarket integration.
//!
//! Uses the Gamma API for market discovery (no auth required), the CLOB API
//! for order placement (HMAC-SHA256 signed headers) and the Data API for
//! wallet trade history and the trader leaderboard.
//!
//! Gamma API: https://gamma-api.polymarket.com
//! CLOB API: https://clob.polymarket.com
//! Data API: https://data-api.polymarket.com

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use hmac::{Hmac, Mac};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sha2::Sha256;
use tracing::{debug, info, warn};

use super::{
    LeaderboardEntry, MarketDataProvider, MarketFilter, OrderAck, OrderRequest, OrderVenue,
    RawTrade, VenueError, WhaleFeed,
};
use crate::config::VenueSettings;
use crate::types::{MarketSnapshot, TradeDirection, TradeOutcome};

type HmacSha256 = Hmac<Sha256>;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Markets priced beyond these bounds are effectively resolved.
const MIN_TRADABLE_PRICE: f64 = 0.02;
const MAX_TRADABLE_PRICE: f64 = 0.98;

// ---------------------------------------------------------------------------
// Gamma API response types (market discovery)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Clone)]
pub struct GammaMarket {
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, rename = "conditionId")]
    pub condition_id: String,
    #[serde(default)]
    pub closed: bool,
    /// Outcome prices as JSON string: "[\"0.65\",\"0.35\"]"
    #[serde(default, rename = "outcomePrices")]
    pub outcome_prices: Option<String>,
    #[serde(default, rename = "volume24hr")]
    pub volume_24hr: Option<f64>,
    #[serde(default, rename = "volumeNum")]
    pub volume_num: Option<f64>,
    #[serde(default, rename = "liquidityNum")]
    pub liquidity_num: Option<f64>,
    #[serde(default)]
    pub tags: Option<Vec<GammaTag>>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GammaTag {
    #[serde(default)]
    pub label: String,
}

// ---------------------------------------------------------------------------
// Data API response types (wallet activity)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Clone)]
pub struct DataApiTrade {
    #[serde(default, rename = "transactionHash")]
    pub transaction_hash: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, rename = "conditionId")]
    pub condition_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub side: String,
    #[serde(default)]
    pub outcome: String,
    #[serde(default)]
    pub size: f64,
    #[serde(default)]
    pub price: Option<f64>,
    /// Unix seconds
    #[serde(default)]
    pub timestamp: Option<i64>,
}

// ---------------------------------------------------------------------------
// CLOB order types
// ---------------------------------------------------------------------------

#[derive(Debug, serde::Serialize)]
struct ClobOrderPayload {
    #[serde(rename = "tokenID")]
    token_id: String,
    side: String,
    price: String,
    size: String,
    #[serde(rename = "type")]
    order_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct ClobOrderResponse {
    #[serde(default, rename = "orderID")]
    order_id: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

struct ClobCredentials {
    api_key: SecretString,
    api_secret: SecretString,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct PolymarketClient {
    http: Client,
    gamma_host: String,
    clob_host: String,
    data_host: String,
    credentials: Option<ClobCredentials>,
}

impl PolymarketClient {
    pub fn new(settings: &VenueSettings) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to build Polymarket HTTP client")?;

        let credentials = match (&settings.api_key, &settings.api_secret) {
            (Some(key), Some(secret)) => Some(ClobCredentials {
                api_key: SecretString::new(key.expose_secret().clone()),
                api_secret: SecretString::new(secret.expose_secret().clone()),
            }),
            _ => None,
        };

        Ok(Self {
            http,
            gamma_host: settings.gamma_host.trim_end_matches('/').to_string(),
            clob_host: settings.clob_host.trim_end_matches('/').to_string(),
            data_host: settings.data_host.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }

    /// Fetch active markets from the Gamma API (no auth required).
    pub async fn fetch_gamma_markets(&self, filter: &MarketFilter) -> Result<Vec<GammaMarket>> {
        let url = format!("{}/markets", self.gamma_host);
        debug!(limit = filter.limit, "Fetching Polymarket markets from Gamma API");

        let mut query = vec![
            ("active", filter.active_only.to_string()),
            ("closed", "false".to_string()),
            ("limit", filter.limit.to_string()),
        ];
        if let Some(tag) = &filter.tag {
            query.push(("tag", tag.clone()));
        }

        let resp = self
            .http
            .get(&url)
            .query(&query)
            .send()
            .await
            .context("Gamma API request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Gamma API error {status}: {body}");
        }

        let markets: Vec<GammaMarket> = resp
            .json()
            .await
            .context("Failed to parse Gamma markets response")?;

        info!(count = markets.len(), "Fetched raw Gamma markets");
        Ok(markets)
    }

    /// Convert a Gamma market into a snapshot. `None` for unusable rows.
    pub fn convert_market(gm: &GammaMarket) -> Option<MarketSnapshot> {
        if gm.condition_id.is_empty() || gm.question.is_empty() || gm.closed {
            return None;
        }

        let (yes, no) = parse_outcome_prices(gm.outcome_prices.as_deref().unwrap_or(""))
            .unwrap_or((0.5, 0.5));

        let mut snapshot = MarketSnapshot::new(
            gm.condition_id.clone(),
            gm.question.clone(),
            yes,
            no,
            gm.volume_24hr.or(gm.volume_num).unwrap_or(0.0),
            gm.liquidity_num.unwrap_or(0.0),
        );
        if !gm.description.is_empty() {
            snapshot.description = Some(gm.description.clone());
        }
        snapshot.tags = gm
            .tags
            .as_ref()
            .map(|tags| tags.iter().map(|t| t.label.clone()).collect())
            .unwrap_or_default();

        snapshot.validate().ok()?;
        Some(snapshot)
    }

    /// Build the POLY_* auth headers for a CLOB request.
    fn auth_headers(
        credentials: &ClobCredentials,
        method: &str,
        path: &str,
        body: &str,
    ) -> Result<Vec<(&'static str, String)>, VenueError> {
        let timestamp = Utc::now().timestamp_millis().to_string();
        let signature =
            sign_request(credentials.api_secret.expose_secret(), &timestamp, method, path, body)?;
        Ok(vec![
            ("POLY_API_KEY", credentials.api_key.expose_secret().clone()),
            ("POLY_SIGNATURE", signature),
            ("POLY_TIMESTAMP", timestamp),
        ])
    }

    /// Trades without an id or a tradable fill price are dropped.
    fn convert_trade(raw: DataApiTrade) -> Option<RawTrade> {
        let tx_hash = raw.transaction_hash.or(raw.id)?;
        let price = raw.price.filter(|p| *p > 0.0 && *p < 1.0)?;
        let direction = if raw.side.eq_ignore_ascii_case("buy") {
            TradeDirection::Buy
        } else {
            TradeDirection::Sell
        };
        let outcome = if raw.outcome.eq_ignore_ascii_case("yes") {
            TradeOutcome::Yes
        } else {
            TradeOutcome::No
        };
        let timestamp = raw
            .timestamp
            .and_then(|t| Utc.timestamp_opt(t, 0).single())
            .unwrap_or_else(Utc::now);

        Some(RawTrade {
            tx_hash,
            market_id: raw.condition_id.unwrap_or_else(|| "unknown".to_string()),
            market_question: raw.title.unwrap_or_else(|| "Unknown Market".to_string()),
            direction,
            outcome,
            size: raw.size,
            price,
            timestamp,
        })
    }
}

/// Parse outcome prices from Gamma's string format.
/// Handles: "[\"0.65\",\"0.35\"]", "0.65, 0.35", etc.
pub fn parse_outcome_prices(s: &str) -> Option<(f64, f64)> {
    let cleaned = s.replace(['[', ']', '"', '\\'], "");
    let parts: Vec<&str> = cleaned.split(',').map(|p| p.trim()).collect();
    if parts.len() >= 2 {
        let yes = parts[0].parse::<f64>().ok()?;
        let no = parts[1].parse::<f64>().ok()?;
        Some((yes, no))
    } else {
        None
    }
}

/// Hex HMAC-SHA256 over `timestamp + METHOD + path + body`.
pub fn sign_request(
    secret: &str,
    timestamp: &str,
    method: &str,
    path: &str,
    body: &str,
) -> Result<String, VenueError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| VenueError::Transport(format!("HMAC init failed: {e}")))?;
    mac.update(timestamp.as_bytes());
    mac.update(method.to_uppercase().as_bytes());
    mac.update(path.as_bytes());
    mac.update(body.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn tradable(market: &MarketSnapshot) -> bool {
    market.yes_price > MIN_TRADABLE_PRICE && market.yes_price < MAX_TRADABLE_PRICE
}

// ---------------------------------------------------------------------------
// Trait implementations
// ---------------------------------------------------------------------------

#[async_trait]
impl MarketDataProvider for PolymarketClient {
    async fn list_markets(&self, filter: &MarketFilter) -> Result<Vec<MarketSnapshot>> {
        let gamma_markets = self.fetch_gamma_markets(filter).await?;

        let markets: Vec<MarketSnapshot> = gamma_markets
            .iter()
            .filter_map(Self::convert_market)
            .filter(|m| tradable(m) && filter.matches(m))
            .collect();

        info!(count = markets.len(), "Polymarket markets after filtering");
        Ok(markets)
    }

    async fn get_market(&self, market_id: &str) -> Result<Option<MarketSnapshot>> {
        let url = format!("{}/markets", self.gamma_host);
        let resp = self
            .http
            .get(&url)
            .query(&[("condition_ids", market_id)])
            .send()
            .await
            .context("Gamma API request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            anyhow::bail!("Gamma API error {status} for market {market_id}");
        }

        let markets: Vec<GammaMarket> = resp
            .json()
            .await
            .context("Failed to parse Gamma market response")?;
        Ok(markets.iter().find_map(Self::convert_market))
    }
}

#[async_trait]
impl OrderVenue for PolymarketClient {
    async fn place_order(&self, order: &OrderRequest) -> Result<OrderAck, VenueError> {
        let Some(credentials) = &self.credentials else {
            return Err(VenueError::MissingCredentials);
        };

        let payload = ClobOrderPayload {
            token_id: format!("{}_{}", order.market_id, order.outcome.to_string().to_lowercase()),
            side: order.direction.to_string(),
            price: format!("{:.4}", order.price),
            size: format!("{:.2}", order.size),
            order_type: "GTC",
        };
        let body = serde_json::to_string(&payload)
            .map_err(|e| VenueError::Transport(format!("order encode failed: {e}")))?;

        let path = "/order";
        let mut request = self
            .http
            .post(format!("{}{path}", self.clob_host))
            .header("Content-Type", "application/json")
            .body(body.clone());
        for (name, value) in Self::auth_headers(credentials, "POST", path, &body)? {
            request = request.header(name, value);
        }

        let resp = request
            .send()
            .await
            .map_err(|e| VenueError::Transport(e.to_string()))?;
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();

        if status.as_u16() == 200 || status.as_u16() == 201 {
            let parsed: ClobOrderResponse = serde_json::from_str(&text)
                .map_err(|e| VenueError::Transport(format!("order response unreadable: {e}")))?;
            let order_id = parsed
                .order_id
                .or(parsed.id)
                .unwrap_or_else(|| format!("clob-{}", uuid::Uuid::new_v4()));
            info!(order_id = %order_id, market = %order.market_id, "CLOB order accepted");
            return Ok(OrderAck {
                order_id,
                status: parsed.status.unwrap_or_else(|| "confirmed".to_string()),
            });
        }

        let message = serde_json::from_str::<ClobOrderResponse>(&text)
            .ok()
            .and_then(|r| r.error)
            .unwrap_or(text);
        warn!(status = %status, error = %message, "CLOB order rejected");
        Err(VenueError::Rejected {
            status: status.as_u16(),
            message,
        })
    }

    fn name(&self) -> String {
        "polymarket".to_string()
    }
}

#[async_trait]
impl WhaleFeed for PolymarketClient {
    async fn recent_trades(&self, wallet: &str, limit: usize) -> Result<Vec<RawTrade>> {
        let url = format!("{}/trades", self.data_host);
        let resp = self
            .http
            .get(&url)
            .query(&[("user", wallet.to_string()), ("limit", limit.to_string())])
            .send()
            .await
            .context("Data API trades request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            anyhow::bail!("Data API error {status} for wallet {wallet}");
        }

        let raw: Vec<DataApiTrade> = resp
            .json()
            .await
            .context("Failed to parse wallet trades")?;
        Ok(raw.into_iter().filter_map(Self::convert_trade).collect())
    }

    async fn top_traders(&self, limit: usize) -> Result<Vec<LeaderboardEntry>> {
        let url = format!("{}/leaderboard", self.data_host);
        let resp = self
            .http
            .get(&url)
            .query(&[("limit", limit.to_string()), ("timeframe", "30d".to_string())])
            .send()
            .await
            .context("Leaderboard request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            anyhow::bail!("Leaderboard error {status}");
        }

        let body: serde_json::Value = resp.json().await.context("Failed to parse leaderboard")?;
        parse_leaderboard(body)
    }
}

/// Accepts either a bare array or `{"traders": [...]}`.
pub fn parse_leaderboard(body: serde_json::Value) -> Result<Vec<LeaderboardEntry>> {
    let rows = match body {
        serde_json::Value::Object(mut map) => map
            .remove("traders")
            .unwrap_or(serde_json::Value::Array(Vec::new())),
        other => other,
    };
    serde_json::from_value(rows).context("Leaderboard rows malformed")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
