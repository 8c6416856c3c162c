//! S2 — Paper BUY LIMIT fill: order `{BUY, qty=5, LIMIT, price=3500}` against
//! a two-tick stream `(3498/3501), (3497/3499)`. Expected: no fill on the
//! first tick, a fill at 3499 on the second.
//!
//! Drives the decision function directly rather than `on_tick` (which also
//! persists a tick-recovery stream over Redis): the fill/no-fill outcome is
//! fully determined by `evaluate`, so that's what this scenario checks.

use sfp_mme::matching::evaluate;
use sfp_types::order::{OrderType, Side};
use sfp_types::tick::Tick;

#[test]
fn buy_limit_waits_then_fills_on_second_tick() {
    let mut armed = false;
    let limit = 3500;

    let tick1 = Tick::new(3498, 3501, 3500, 0);
    let first = evaluate(Side::Buy, OrderType::Limit, Some(limit), None, &mut armed, &tick1);
    assert!(first.is_none(), "ask 3501 is above the limit, order must wait");

    let tick2 = Tick::new(3497, 3499, 3498, 1);
    let second = evaluate(Side::Buy, OrderType::Limit, Some(limit), None, &mut armed, &tick2);
    assert_eq!(second.map(|r| r.fill_price_micros), Some(3499));
}
