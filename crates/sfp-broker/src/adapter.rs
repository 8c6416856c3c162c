//! The broker-agnostic boundary. `BrokerAdapter` is the single choke-point
//! every concrete wire binding (HTTP, WebSocket, FIX) implements; the rest
//! of this crate is written against the trait, never a concrete broker.

use async_trait::async_trait;
use sfp_types::order::{Order, Side};

#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub idempotency_key: String,
    pub symbol: String,
    pub side: Side,
    pub qty: i64,
    pub price_micros: Option<i64>,
    pub order_type: sfp_types::order::OrderType,
}

impl SubmitRequest {
    pub fn from_order(order: &Order) -> Self {
        Self {
            idempotency_key: order.id.to_string(),
            symbol: order.symbol.clone(),
            side: order.side,
            qty: order.requested_qty,
            price_micros: order.requested_price_micros,
            order_type: order.order_type,
        }
    }
}

#[derive(Debug, Clone)]
pub enum SubmitOutcome {
    Ack { broker_order_id: String },
    Rejected { reason: String },
    Transient { reason: String },
}

#[derive(Debug, Clone)]
pub enum CancelOutcome {
    Ack,
    Rejected { reason: String },
}

/// Implemented once per concrete broker binding.
#[async_trait]
pub trait BrokerAdapter: Send + Sync {
    async fn authenticate(&self, credentials: &str) -> Result<String, String>;
    async fn submit(&self, req: SubmitRequest) -> SubmitOutcome;
    async fn cancel(&self, broker_order_id: &str) -> CancelOutcome;
}

/// An in-repo adapter used by tests and by the daemon when no live broker
/// binding is configured. Deterministic: every `submit` succeeds unless the
/// symbol carries a magic rejection marker.
pub struct MockBroker {
    pub reject_symbol: Option<String>,
}

impl MockBroker {
    pub fn new() -> Self {
        Self { reject_symbol: None }
    }

    pub fn rejecting(symbol: impl Into<String>) -> Self {
        Self {
            reject_symbol: Some(symbol.into()),
        }
    }
}

impl Default for MockBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrokerAdapter for MockBroker {
    async fn authenticate(&self, credentials: &str) -> Result<String, String> {
        if credentials.is_empty() {
            Err("empty credentials".to_string())
        } else {
            Ok(format!("tok-{credentials}"))
        }
    }

    async fn submit(&self, req: SubmitRequest) -> SubmitOutcome {
        if self.reject_symbol.as_deref() == Some(req.symbol.as_str()) {
            return SubmitOutcome::Rejected {
                reason: "symbol not tradable".to_string(),
            };
        }
        SubmitOutcome::Ack {
            broker_order_id: format!("mock-{}", req.idempotency_key),
        }
    }

    async fn cancel(&self, _broker_order_id: &str) -> CancelOutcome {
        CancelOutcome::Ack
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sfp_types::order::{OrderType, ProductType};
    use std::collections::BTreeMap;
    use uuid::Uuid;

    fn sample_order() -> Order {
        Order {
            id: Uuid::new_v4(),
            user_id: "u1".into(),
            strategy_id: None,
            symbol: "RELIANCE".into(),
            side: Side::Buy,
            order_type: OrderType::Market,
            product_type: ProductType::Intraday,
            requested_qty: 10,
            requested_price_micros: None,
            filled_qty: 0,
            avg_filled_price_micros: None,
            state: sfp_types::order::OrderState::Placing,
            broker_order_id: None,
            error: None,
            retry_count: 0,
            paper_mode: false,
            metadata: BTreeMap::new(),
            created_at_millis: 0,
            updated_at_millis: 0,
        }
    }

    #[tokio::test]
    async fn mock_broker_acks_by_default() {
        let broker = MockBroker::new();
        let req = SubmitRequest::from_order(&sample_order());
        match broker.submit(req).await {
            SubmitOutcome::Ack { .. } => {}
            other => panic!("expected ack, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn mock_broker_rejects_configured_symbol() {
        let broker = MockBroker::rejecting("RELIANCE");
        let req = SubmitRequest::from_order(&sample_order());
        match broker.submit(req).await {
            SubmitOutcome::Rejected { .. } => {}
            other => panic!("expected reject, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn authenticate_fails_on_empty_credentials() {
        let broker = MockBroker::new();
        assert!(broker.authenticate("").await.is_err());
    }
}
