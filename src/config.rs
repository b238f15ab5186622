//! Configuration loading.
//!
//! Every option has a documented default. An optional TOML file can
//! override the defaults, and environment variables override both.
//! Secrets (API keys) are only ever read from the environment and are
//! held as `SecretString` so they never show up in `Debug` output.

use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub council: CouncilSettings,
    pub risk: RiskSettings,
    pub whale: WhaleSettings,
    pub intervals: IntervalSettings,
    pub venue: VenueSettings,
    pub llm: LlmSettings,
    pub news: NewsSettings,
    pub correlation: CorrelationSettings,
    pub dashboard: DashboardSettings,
    pub paper: PaperSettings,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CouncilSettings {
    /// Fraction of valid votes that must be YES. At 0.67 a 2-of-3 vote
    /// (0.666..) falls short.
    pub voting_threshold: f64,
    /// Per-agent deadline in seconds. 0 disables the deadline.
    pub agent_timeout_secs: u64,
    /// How many markets (by volume) the scanner sends to the council per pass.
    pub markets_per_scan: usize,
}

impl Default for CouncilSettings {
    fn default() -> Self {
        Self {
            voting_threshold: 0.67,
            agent_timeout_secs: 30,
            markets_per_scan: 3,
        }
    }
}

impl CouncilSettings {
    pub fn agent_timeout(&self) -> Option<Duration> {
        (self.agent_timeout_secs > 0).then(|| Duration::from_secs(self.agent_timeout_secs))
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RiskSettings {
    pub max_single_trade: f64,
    pub max_daily_loss: f64,
    pub volatility_threshold: f64,
}

impl Default for RiskSettings {
    fn default() -> Self {
        Self {
            max_single_trade: 500.0,
            max_daily_loss: 1000.0,
            volatility_threshold: 0.15,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct WhaleSettings {
    pub min_trade_size: f64,
    pub copy_percentage: f64,
    /// Execute agreed copy signals instead of only queueing them.
    pub auto_copy: bool,
}

impl Default for WhaleSettings {
    fn default() -> Self {
        Self {
            min_trade_size: 1000.0,
            copy_percentage: 0.10,
            auto_copy: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct IntervalSettings {
    pub market_scan_secs: u64,
    pub whale_poll_secs: u64,
    pub price_tracker_secs: u64,
    pub portfolio_refresh_secs: u64,
    pub orderbook_poll_secs: u64,
    /// Back-off after a failed loop iteration.
    pub error_backoff_secs: u64,
}

impl Default for IntervalSettings {
    fn default() -> Self {
        Self {
            market_scan_secs: 60,
            whale_poll_secs: 30,
            price_tracker_secs: 60,
            portfolio_refresh_secs: 30,
            orderbook_poll_secs: 2,
            error_backoff_secs: 30,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct VenueSettings {
    pub clob_host: String,
    pub gamma_host: String,
    pub data_host: String,
    #[serde(skip)]
    pub api_key: Option<SecretString>,
    #[serde(skip)]
    pub api_secret: Option<SecretString>,
}

impl Default for VenueSettings {
    fn default() -> Self {
        Self {
            clob_host: "https://clob.polymarket.com".to_string(),
            gamma_host: "https://gamma-api.polymarket.com".to_string(),
            data_host: "https://data-api.polymarket.com".to_string(),
            api_key: None,
            api_secret: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub anthropic_model: String,
    pub openai_model: String,
    pub max_tokens: u32,
    /// Time budget for a single advisory call, in seconds.
    pub call_budget_secs: u64,
    #[serde(skip)]
    pub anthropic_api_key: Option<SecretString>,
    #[serde(skip)]
    pub openai_api_key: Option<SecretString>,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            anthropic_model: "claude-sonnet-4-20250514".to_string(),
            openai_model: "gpt-4o".to_string(),
            max_tokens: 1024,
            call_budget_secs: 20,
            anthropic_api_key: None,
            openai_api_key: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct NewsSettings {
    pub host: String,
    /// Headlines handed to the council per market.
    pub max_headlines: usize,
    #[serde(skip)]
    pub api_key: Option<SecretString>,
}

impl Default for NewsSettings {
    fn default() -> Self {
        Self {
            host: "https://newsapi.org".to_string(),
            max_headlines: 5,
            api_key: None,
        }
    }
}

/// Order book imbalance signal on the exchange pair.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CorrelationSettings {
    pub enabled: bool,
    pub exchange_host: String,
    pub symbol: String,
    pub depth_levels: usize,
    /// Bid volume must exceed ask volume by this factor (and vice versa).
    pub imbalance_threshold: f64,
    /// Mid prices kept for the volatility check.
    pub volatility_window: usize,
    /// Relative high-low range over the window that counts as volatile.
    pub volatility_move: f64,
    pub cooldown_secs: u64,
    /// Only buy YES below this price.
    pub strike_ceiling: f64,
    /// Signals above this confidence are traded.
    pub execute_confidence: f64,
}

impl Default for CorrelationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            exchange_host: "https://api.binance.com".to_string(),
            symbol: "BTCUSDT".to_string(),
            depth_levels: 5,
            imbalance_threshold: 3.0,
            volatility_window: 60,
            volatility_move: 0.001,
            cooldown_secs: 60,
            strike_ceiling: 0.40,
            execute_confidence: 0.8,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DashboardSettings {
    pub enabled: bool,
    pub port: u16,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 8080,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PaperSettings {
    /// Route orders to the simulated venue instead of the CLOB.
    pub enabled: bool,
    pub starting_cash: f64,
    pub state_file: String,
}

impl Default for PaperSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            starting_cash: 10_000.0,
            state_file: "alpha_state.json".to_string(),
        }
    }
}

/// Validation failures for loaded configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} must be within [{min}, {max}], got {value}")]
    OutOfRange {
        name: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Invalid value for {var}: {value}")]
    BadEnvValue { var: String, value: String },
}

impl AppConfig {
    /// Load defaults, then the TOML file if it exists, then env overrides.
    pub fn load(path: &str) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            AppConfig::default()
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML configuration file.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Apply `ALPHA_*` environment overrides and read secrets.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides_from(|name| std::env::var(name).ok())
    }

    /// Same as [`apply_env_overrides`](Self::apply_env_overrides) with an
    /// injectable lookup, so tests don't have to touch process env.
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        override_parsed(&lookup, "ALPHA_VOTING_THRESHOLD", &mut self.council.voting_threshold)?;
        override_parsed(&lookup, "ALPHA_AGENT_TIMEOUT_SECS", &mut self.council.agent_timeout_secs)?;
        override_parsed(&lookup, "ALPHA_MARKETS_PER_SCAN", &mut self.council.markets_per_scan)?;
        override_parsed(&lookup, "ALPHA_MAX_SINGLE_TRADE", &mut self.risk.max_single_trade)?;
        override_parsed(&lookup, "ALPHA_MAX_DAILY_LOSS", &mut self.risk.max_daily_loss)?;
        override_parsed(&lookup, "ALPHA_VOLATILITY_THRESHOLD", &mut self.risk.volatility_threshold)?;
        override_parsed(&lookup, "ALPHA_WHALE_MIN_TRADE_SIZE", &mut self.whale.min_trade_size)?;
        override_parsed(&lookup, "ALPHA_WHALE_COPY_PERCENTAGE", &mut self.whale.copy_percentage)?;
        override_parsed(&lookup, "ALPHA_WHALE_AUTO_COPY", &mut self.whale.auto_copy)?;
        override_parsed(&lookup, "ALPHA_SCAN_INTERVAL_SECS", &mut self.intervals.market_scan_secs)?;
        override_parsed(&lookup, "ALPHA_WHALE_POLL_SECS", &mut self.intervals.whale_poll_secs)?;
        override_parsed(&lookup, "ALPHA_PRICE_TRACKER_SECS", &mut self.intervals.price_tracker_secs)?;
        override_parsed(&lookup, "ALPHA_PORTFOLIO_REFRESH_SECS", &mut self.intervals.portfolio_refresh_secs)?;
        override_parsed(&lookup, "ALPHA_DASHBOARD_PORT", &mut self.dashboard.port)?;
        override_parsed(&lookup, "ALPHA_DASHBOARD_ENABLED", &mut self.dashboard.enabled)?;
        override_parsed(&lookup, "ALPHA_PAPER_TRADING", &mut self.paper.enabled)?;
        override_parsed(&lookup, "ALPHA_STARTING_CASH", &mut self.paper.starting_cash)?;
        override_parsed(&lookup, "ALPHA_LLM_CALL_BUDGET_SECS", &mut self.llm.call_budget_secs)?;
        override_parsed(&lookup, "ALPHA_CORRELATION_ENABLED", &mut self.correlation.enabled)?;
        override_parsed(&lookup, "ALPHA_ORDERBOOK_POLL_SECS", &mut self.intervals.orderbook_poll_secs)?;

        if let Some(host) = lookup("POLYMARKET_HOST") {
            self.venue.clob_host = host;
        }
        self.venue.api_key = secret(&lookup, "POLYMARKET_API_KEY");
        self.venue.api_secret = secret(&lookup, "POLYMARKET_API_SECRET");
        self.llm.anthropic_api_key = secret(&lookup, "ANTHROPIC_API_KEY");
        self.llm.openai_api_key = secret(&lookup, "OPENAI_API_KEY");
        self.news.api_key = secret(&lookup, "NEWS_API_KEY");
        Ok(())
    }

    /// Range-check the numeric options.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("voting_threshold", self.council.voting_threshold, 0.0, 1.0)?;
        check_range("volatility_threshold", self.risk.volatility_threshold, 0.0, 1.0)?;
        check_range("copy_percentage", self.whale.copy_percentage, 0.0, 1.0)?;
        check_range("max_single_trade", self.risk.max_single_trade, f64::MIN_POSITIVE, f64::MAX)?;
        check_range("starting_cash", self.paper.starting_cash, 0.0, f64::MAX)?;
        check_range("strike_ceiling", self.correlation.strike_ceiling, 0.0, 1.0)?;
        check_range("execute_confidence", self.correlation.execute_confidence, 0.0, 1.0)?;
        check_range("imbalance_threshold", self.correlation.imbalance_threshold, 1.0, f64::MAX)?;
        Ok(())
    }

    pub fn has_venue_credentials(&self) -> bool {
        self.venue.api_key.is_some() && self.venue.api_secret.is_some()
    }
}

fn override_parsed<F, T>(lookup: &F, var: &str, slot: &mut T) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    if let Some(raw) = lookup(var) {
        *slot = raw.trim().parse().map_err(|_| ConfigError::BadEnvValue {
            var: var.to_string(),
            value: raw.clone(),
        })?;
    }
    Ok(())
}

fn secret<F>(lookup: &F, var: &str) -> Option<SecretString>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(var)
        .filter(|v| !v.trim().is_empty())
        .map(SecretString::new)
}

fn check_range(name: &'static str, value: f64, min: f64, max: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value < min || value > max {
        return Err(ConfigError::OutOfRange { name, value, min, max });
    }
    Ok(())
}
