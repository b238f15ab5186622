//! Persistence layer.
//!
//! Saves and loads the portfolio and trade history to/from a JSON file so a
//! paper session survives restarts. Logs, signals and decisions are
//! session-scoped and not persisted.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

use crate::state::StateStore;
use crate::types::{Portfolio, Trade};

/// On-disk snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedState {
    pub portfolio: Portfolio,
    #[serde(default)]
    pub trades: Vec<Trade>,
    pub saved_at: DateTime<Utc>,
}

impl SavedState {
    pub fn capture(store: &StateStore) -> Self {
        Self {
            portfolio: store.portfolio(),
            trades: store.trades(usize::MAX),
            saved_at: Utc::now(),
        }
    }

    /// Rebuild a store from this snapshot.
    pub fn into_store(self) -> StateStore {
        let mut portfolio = self.portfolio;
        if portfolio.starting_value <= 0.0 {
            // saved before the baselines were persisted
            portfolio.starting_value = portfolio.total_value - portfolio.total_pnl;
            portfolio.day_open_value = portfolio.total_value - portfolio.daily_pnl;
        }
        let store = StateStore::new(portfolio);
        store.restore_trades(self.trades);
        store
    }
}

/// Write the store's portfolio and trades to `path`.
pub fn save_state(store: &StateStore, path: &str) -> Result<()> {
    let snapshot = SavedState::capture(store);
    let json = serde_json::to_string_pretty(&snapshot).context("Failed to serialise state")?;

    std::fs::write(path, &json).context(format!("Failed to write state to {path}"))?;

    debug!(
        path,
        cash = snapshot.portfolio.cash_balance,
        trades = snapshot.trades.len(),
        "State saved"
    );
    Ok(())
}

/// Load a snapshot. Returns `None` if the file doesn't exist (fresh start).
pub fn load_state(path: &str) -> Result<Option<SavedState>> {
    if !Path::new(path).exists() {
        info!(path, "No saved state found, starting fresh");
        return Ok(None);
    }

    let json = std::fs::read_to_string(path).context(format!("Failed to read state from {path}"))?;
    let snapshot: SavedState =
        serde_json::from_str(&json).context(format!("Failed to parse state from {path}"))?;

    info!(
        path,
        cash = snapshot.portfolio.cash_balance,
        positions = snapshot.portfolio.positions.len(),
        trades = snapshot.trades.len(),
        saved_at = %snapshot.saved_at,
        "State loaded from disk"
    );
    Ok(Some(snapshot))
}

/// Delete the state file (for testing or reset).
pub fn delete_state(path: &str) -> Result<()> {
    if Path::new(path).exists() {
        std::fs::remove_file(path).context(format!("Failed to delete state file {path}"))?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
