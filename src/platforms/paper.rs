//! Paper venue: fills every well-formed order at its limit price.
//!
//! Used in demo mode so the full decide-and-execute path runs without
//! touching the CLOB.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

use super::{OrderAck, OrderRequest, OrderVenue, VenueError};

#[derive(Default)]
pub struct PaperVenue {
    orders_filled: AtomicU64,
}

impl PaperVenue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn orders_filled(&self) -> u64 {
        self.orders_filled.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl OrderVenue for PaperVenue {
    async fn place_order(&self, order: &OrderRequest) -> Result<OrderAck, VenueError> {
        if !(order.price > 0.0 && order.price < 1.0) {
            return Err(VenueError::Rejected {
                status: 400,
                message: format!("price {:.4} outside (0, 1)", order.price),
            });
        }
        if !(order.size > 0.0) {
            return Err(VenueError::Rejected {
                status: 400,
                message: format!("size {:.2} must be positive", order.size),
            });
        }

        let order_id = format!("paper-{}", uuid::Uuid::new_v4());
        self.orders_filled.fetch_add(1, Ordering::Relaxed);
        info!(
            order_id = %order_id,
            market = %order.market_id,
            side = %order.direction,
            outcome = %order.outcome,
            size = order.size,
            price = order.price,
            "Paper fill"
        );

        Ok(OrderAck {
            order_id,
            status: "filled".to_string(),
        })
    }

    fn name(&self) -> String {
        "paper".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{TradeDirection, TradeOutcome};

    fn order(size: f64, price: f64) -> OrderRequest {
        OrderRequest {
            market_id: "m1".into(),
            direction: TradeDirection::Buy,
            outcome: TradeOutcome::Yes,
            size,
            price,
        }
    }

    #[tokio::test]
    async fn test_paper_fill() {
        let venue = PaperVenue::new();
        let ack = venue.place_order(&order(100.0, 0.42)).await.unwrap();
        assert!(ack.order_id.starts_with("paper-"));
        assert_eq!(ack.status, "filled");
        assert_eq!(venue.orders_filled(), 1);
    }

    #[tokio::test]
    async fn test_paper_rejects_bad_price() {
        let venue = PaperVenue::new();
        let err = venue.place_order(&order(100.0, 1.0)).await.unwrap_err();
        assert!(matches!(err, VenueError::Rejected { status: 400, .. }));
        assert_eq!(venue.orders_filled(), 0);
    }

    #[tokio::test]
    async fn test_paper_rejects_zero_size() {
        let venue = PaperVenue::new();
        assert!(venue.place_order(&order(0.0, 0.5)).await.is_err());
    }
}
