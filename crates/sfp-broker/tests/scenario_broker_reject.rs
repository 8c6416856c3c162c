//! S3 — Broker reject: a live-mode MARKET order submitted against a broker
//! that returns a terminal rejection. Expected: `submit_with_retry` returns
//! `BrokerReject("InsufficientFunds")` on the very first attempt, with no
//! further attempts made.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use sfp_broker::submission::submit_with_retry;
use sfp_broker::{BrokerAdapter, CancelOutcome, SubmitOutcome, SubmitRequest};
use sfp_errors::PipelineError;
use sfp_types::order::{Order, OrderState, OrderType, ProductType, Side};
use uuid::Uuid;

struct InsufficientFundsBroker {
    attempts: AtomicU32,
}

#[async_trait]
impl BrokerAdapter for InsufficientFundsBroker {
    async fn authenticate(&self, _credentials: &str) -> Result<String, String> {
        Ok("tok".to_string())
    }

    async fn submit(&self, _req: SubmitRequest) -> SubmitOutcome {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        SubmitOutcome::Rejected {
            reason: "InsufficientFunds".to_string(),
        }
    }

    async fn cancel(&self, _broker_order_id: &str) -> CancelOutcome {
        CancelOutcome::Ack
    }
}

fn live_market_order() -> Order {
    Order {
        id: Uuid::new_v4(),
        user_id: "u1".into(),
        strategy_id: None,
        symbol: "INFY".into(),
        side: Side::Buy,
        order_type: OrderType::Market,
        product_type: ProductType::Intraday,
        requested_qty: 100,
        requested_price_micros: None,
        filled_qty: 0,
        avg_filled_price_micros: None,
        state: OrderState::Placing,
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
async fn terminal_rejection_short_circuits_retry() {
    let broker = Arc::new(InsufficientFundsBroker { attempts: AtomicU32::new(0) });
    let order = live_market_order();

    let err = submit_with_retry(&(broker.clone() as Arc<dyn BrokerAdapter>), &order)
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::BrokerReject(reason) if reason == "InsufficientFunds"));
    assert_eq!(broker.attempts.load(Ordering::SeqCst), 1, "no retry on a terminal rejection");
}
