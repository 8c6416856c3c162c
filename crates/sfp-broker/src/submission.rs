//! Submits an order to a concrete `BrokerAdapter`, applying the retry
//! policy and surfacing the outcome as a `PipelineError` variant the Order
//! Manager already knows how to interpret.

use std::sync::Arc;

use sfp_errors::PipelineError;
use sfp_types::order::Order;

use crate::adapter::{BrokerAdapter, SubmitOutcome, SubmitRequest};
use crate::retry::with_retry;

const RETRY_MAX_ATTEMPTS: u32 = 3;
const RETRY_BASE_MS: u64 = 500;
const RETRY_CAP_MS: u64 = 10_000;

/// Submit `order` via `broker`, retrying transient failures per the
/// documented backoff policy. A terminal rejection is returned as
/// `BrokerReject`; exhausting retries on transient failures is also
/// surfaced as `BrokerReject` so the caller transitions the order to
/// REJECTED with the last error, matching the exhaustion behavior.
///
/// Returns the assigned broker order id together with the number of
/// attempts it took (1 = accepted on the first try), so the caller can
/// persist `retry_count = attempts - 1` onto the order.
pub async fn submit_with_retry(
    broker: &Arc<dyn BrokerAdapter>,
    order: &Order,
) -> Result<(String, u32), PipelineError> {
    let req = SubmitRequest::from_order(order);

    let result = with_retry(
        RETRY_MAX_ATTEMPTS,
        RETRY_BASE_MS,
        RETRY_CAP_MS,
        |outcome: &SubmitOutcome| matches!(outcome, SubmitOutcome::Transient { .. }),
        || {
            let broker = broker.clone();
            let req = req.clone();
            async move {
                match broker.submit(req).await {
                    SubmitOutcome::Ack { broker_order_id } => Ok(broker_order_id),
                    other => Err(other),
                }
            }
        },
    )
    .await;

    result.map_err(|outcome| match outcome {
        SubmitOutcome::Rejected { reason } => PipelineError::BrokerReject(reason),
        SubmitOutcome::Transient { reason } => PipelineError::BrokerReject(format!("retries exhausted: {reason}")),
        SubmitOutcome::Ack { .. } => unreachable!("Ack is not an error path"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::MockBroker;
    use sfp_types::order::{OrderState, OrderType, ProductType, Side};
    use std::collections::BTreeMap;
    use uuid::Uuid;

    fn sample_order(symbol: &str) -> Order {
        Order {
            id: Uuid::new_v4(),
            user_id: "u1".into(),
            strategy_id: None,
            symbol: symbol.into(),
            side: Side::Buy,
            order_type: OrderType::Market,
            product_type: ProductType::Intraday,
            requested_qty: 10,
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
    async fn successful_submit_returns_broker_order_id() {
        let broker: Arc<dyn BrokerAdapter> = Arc::new(MockBroker::new());
        let order = sample_order("RELIANCE");
        let (broker_order_id, attempts) = submit_with_retry(&broker, &order).await.unwrap();
        assert!(!broker_order_id.is_empty());
        assert_eq!(attempts, 1);
    }

    #[tokio::test]
    async fn terminal_rejection_surfaces_as_broker_reject() {
        let broker: Arc<dyn BrokerAdapter> = Arc::new(MockBroker::rejecting("RELIANCE"));
        let order = sample_order("RELIANCE");
        let err = submit_with_retry(&broker, &order).await.unwrap_err();
        assert!(matches!(err, PipelineError::BrokerReject(_)));
    }
}
