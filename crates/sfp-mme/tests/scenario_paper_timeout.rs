//! S5 — Paper timeout: a BUY LIMIT at 3000 for TCS sits pending while ticks
//! stay away from the limit for 61 s. Expected: the engine reports a
//! `TimedOut` outcome once the 60 s match deadline is crossed, independent
//! of whether any further ticks arrive.

use sfp_mme::{MatchOutcome, MatchingEngine};
use sfp_types::order::{OrderType, Side};
use uuid::Uuid;

#[tokio::test(start_paused = true)]
async fn pending_limit_order_times_out_after_60s() {
    let engine = MatchingEngine::new(16);
    let order_id = Uuid::new_v4();

    engine.register(order_id, "TCS", Side::Buy, OrderType::Limit, Some(3_000_000), None, 60_000);
    assert!(engine.is_pending(order_id));

    tokio::time::advance(std::time::Duration::from_millis(59_999)).await;
    assert!(engine.sweep_timeouts().is_empty(), "must not time out before the deadline");

    tokio::time::advance(std::time::Duration::from_millis(2_000)).await;
    let outcomes = engine.sweep_timeouts();

    assert_eq!(outcomes.len(), 1);
    assert!(matches!(outcomes[0], MatchOutcome::TimedOut { order_id: id } if id == order_id));
    assert!(!engine.is_pending(order_id));
}
