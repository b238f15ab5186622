//! Order execution gate.
//!
//! Last line of defence between a recommendation and the venue. Every
//! request is re-validated against the live portfolio: non-positive sizes
//! and sizes above available cash are hard local stops, oversize requests
//! are clamped to `max_single_trade`. Cash is reserved under the store lock
//! before the order goes out and refunded if the venue fails, so concurrent
//! executions can never drive the balance negative. No retries.

use std::sync::Arc;
use tracing::{error, info, warn};

use crate::platforms::{OrderAck, OrderRequest, OrderVenue};
use crate::state::StateStore;
use crate::types::{
    CopyTradeSignal, CouncilDecision, LogLevel, MarketSnapshot, Portfolio, Position, Trade,
    TradeDirection, TradeOutcome,
};

const SOURCE: &str = "executor";

/// Result of the atomic pre-trade check.
enum Reservation {
    /// BUY: cash debited up front.
    Debited,
    /// SELL: enough shares held; nothing moved yet.
    Covered,
    Blocked(String),
}

pub struct ExecutionGate {
    venue: Arc<dyn OrderVenue>,
    state: Arc<StateStore>,
    max_single_trade: f64,
}

impl ExecutionGate {
    pub fn new(venue: Arc<dyn OrderVenue>, state: Arc<StateStore>, max_single_trade: f64) -> Self {
        Self {
            venue,
            state,
            max_single_trade,
        }
    }

    pub fn venue_name(&self) -> String {
        self.venue.name()
    }

    /// Validate, place and record one order. `None` on any rejection or
    /// venue failure.
    pub async fn execute(
        &self,
        snapshot: &MarketSnapshot,
        direction: TradeDirection,
        outcome: TradeOutcome,
        size: f64,
    ) -> Option<Trade> {
        if !(size > 0.0) || !size.is_finite() {
            self.state.add_log(
                LogLevel::Warning,
                SOURCE,
                format!("BLOCKED: Invalid order size {size}"),
            );
            warn!(market = %snapshot.id, size, "Rejected non-positive order size");
            return None;
        }

        let price = snapshot.price_of(outcome);
        if !(price > 0.0 && price < 1.0) {
            self.state.add_log(
                LogLevel::Warning,
                SOURCE,
                format!("BLOCKED: No tradable {outcome} price on '{}'", snapshot.short_question(40)),
            );
            return None;
        }

        let clamped = size.min(self.max_single_trade);

        // Check against the requested size, commit the clamped size.
        let reservation = self.state.adjust_portfolio(|p| match direction {
            TradeDirection::Buy if size > p.cash_balance => Reservation::Blocked(format!(
                "BLOCKED: Insufficient balance. Need ${size:.0}, have ${:.0}",
                p.cash_balance
            )),
            TradeDirection::Buy => {
                p.cash_balance -= clamped;
                Reservation::Debited
            }
            TradeDirection::Sell => {
                let held = held_value(p, &snapshot.id, outcome, price);
                if held + 1e-9 < clamped {
                    Reservation::Blocked(format!(
                        "BLOCKED: Cannot sell ${clamped:.0} of {outcome}, holding ${held:.0}"
                    ))
                } else {
                    Reservation::Covered
                }
            }
        });

        if let Reservation::Blocked(reason) = reservation {
            self.state.add_log(LogLevel::Warning, SOURCE, reason.clone());
            warn!(market = %snapshot.id, size, reason = %reason, "Order blocked");
            return None;
        }

        if clamped < size {
            self.state.add_log(
                LogLevel::Warning,
                SOURCE,
                format!("SIZE CAPPED: Reduced to max ${:.0}", self.max_single_trade),
            );
            info!(requested = size, capped = clamped, "Order size clamped");
        }

        let order = OrderRequest {
            market_id: snapshot.id.clone(),
            direction,
            outcome,
            size: clamped,
            price,
        };

        match self.venue.place_order(&order).await {
            Ok(ack) => Some(self.record_fill(snapshot, &order, ack)),
            Err(e) => {
                if direction == TradeDirection::Buy {
                    self.state.adjust_portfolio(|p| p.cash_balance += clamped);
                }
                self.state.add_log(LogLevel::Error, SOURCE, format!("ORDER FAILED: {e}"));
                self.state.increment_errors();
                error!(
                    venue = %self.venue.name(),
                    market = %snapshot.id,
                    error = %e,
                    "Order placement failed"
                );
                None
            }
        }
    }

    /// Execute an approved council decision. No-op for rejections.
    pub async fn execute_decision(
        &self,
        snapshot: &MarketSnapshot,
        decision: &CouncilDecision,
    ) -> Option<Trade> {
        if !decision.should_execute {
            return None;
        }
        let (Some(direction), Some(outcome), Some(size)) = (
            decision.recommended_direction,
            decision.recommended_outcome,
            decision.recommended_size,
        ) else {
            warn!(decision = %decision.id, "Approved decision has no recommendation");
            return None;
        };
        self.execute(snapshot, direction, outcome, size).await
    }

    /// Mirror an agreed whale copy signal at the whale's fill price.
    pub async fn execute_copy_signal(&self, signal: &CopyTradeSignal) -> Option<Trade> {
        if !signal.ai_agrees {
            return None;
        }
        let whale = &signal.whale_activity;
        let (yes, no) = match whale.outcome {
            TradeOutcome::Yes => (whale.price, 1.0 - whale.price),
            TradeOutcome::No => (1.0 - whale.price, whale.price),
        };
        let snapshot = MarketSnapshot::new(
            whale.market_id.clone(),
            whale.market_question.clone(),
            yes,
            no,
            0.0,
            0.0,
        );

        let trade = self
            .execute(&snapshot, whale.direction, whale.outcome, signal.recommended_size)
            .await;
        if trade.is_some() {
            self.state.clear_signal(&signal.id);
        }
        trade
    }

    fn record_fill(&self, snapshot: &MarketSnapshot, order: &OrderRequest, ack: OrderAck) -> Trade {
        let trade = Trade {
            id: uuid::Uuid::new_v4().to_string(),
            market_id: order.market_id.clone(),
            market_question: snapshot.question.clone(),
            direction: order.direction,
            outcome: order.outcome,
            size: order.size,
            price: order.price,
            order_ref: Some(ack.order_id),
            status: ack.status,
            timestamp: chrono::Utc::now(),
        };

        self.state.modify_portfolio(|p| {
            match order.direction {
                TradeDirection::Buy => open_or_add(p, snapshot, order),
                TradeDirection::Sell => reduce(p, order),
            }
            p.trade_count += 1;
            p.mark_to_market();
        });
        self.state.add_trade(trade.clone());

        info!(
            trade_id = %trade.id,
            market = %trade.market_id,
            side = %trade.direction,
            outcome = %trade.outcome,
            size = trade.size,
            price = trade.price,
            "Trade executed"
        );
        trade
    }
}

// ---------------------------------------------------------------------------
// Portfolio bookkeeping (runs under the store lock)
// ---------------------------------------------------------------------------

fn held_value(p: &Portfolio, market_id: &str, outcome: TradeOutcome, price: f64) -> f64 {
    p.positions
        .iter()
        .filter(|pos| pos.market_id == market_id && pos.outcome == outcome)
        .map(|pos| pos.shares * price)
        .sum()
}

fn open_or_add(p: &mut Portfolio, snapshot: &MarketSnapshot, order: &OrderRequest) {
    let shares = order.size / order.price;
    match p
        .positions
        .iter_mut()
        .find(|pos| pos.market_id == order.market_id && pos.outcome == order.outcome)
    {
        Some(pos) => {
            pos.size += order.size;
            pos.shares += shares;
            pos.entry_price = pos.size / pos.shares;
            pos.current_price = order.price;
        }
        None => p.positions.push(Position {
            market_id: order.market_id.clone(),
            market_question: snapshot.question.clone(),
            outcome: order.outcome,
            size: order.size,
            shares,
            entry_price: order.price,
            current_price: order.price,
        }),
    }
}

/// Sell `order.size` worth of shares. Proceeds go to cash; a sale above
/// cost basis counts as a win.
fn reduce(p: &mut Portfolio, order: &OrderRequest) {
    let Some(idx) = p
        .positions
        .iter()
        .position(|pos| pos.market_id == order.market_id && pos.outcome == order.outcome)
    else {
        return;
    };

    let pos = &mut p.positions[idx];
    let shares_sold = (order.size / order.price).min(pos.shares);
    let fraction = shares_sold / pos.shares;
    let cost_basis = pos.size * fraction;
    let proceeds = shares_sold * order.price;

    pos.shares -= shares_sold;
    pos.size -= cost_basis;
    pos.current_price = order.price;
    let emptied = pos.shares <= 1e-9;

    p.cash_balance += proceeds;
    if proceeds > cost_basis {
        p.win_count += 1;
    }
    if emptied {
        p.positions.remove(idx);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
