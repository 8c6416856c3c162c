//! The matching policy: given an order's side, type, and an observed
//! tick, decide whether it fills and at what price. No partial fills —
//! an order either fills in full on the first eligible tick or waits.

use sfp_types::order::{OrderType, Side};
use sfp_types::tick::Tick;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MatchResult {
    pub fill_price_micros: i64,
}

/// Evaluates one tick against one order. `armed` latches a STOP order
/// once its trigger has been crossed; after that it behaves as MARKET.
/// Callers own `armed` per pending order and pass it by reference since
/// arming is a one-way transition across ticks.
pub fn evaluate(
    side: Side,
    order_type: OrderType,
    limit_price_micros: Option<i64>,
    trigger_price_micros: Option<i64>,
    armed: &mut bool,
    tick: &Tick,
) -> Option<MatchResult> {
    if order_type == OrderType::Stop && !*armed {
        let trigger = trigger_price_micros?;
        let crossed = match side {
            Side::Buy => tick.last_micros >= trigger,
            Side::Sell => tick.last_micros <= trigger,
        };
        if !crossed {
            return None;
        }
        *armed = true;
    }

    match (side, order_type) {
        (Side::Buy, OrderType::Market) | (Side::Buy, OrderType::Stop) => {
            Some(MatchResult { fill_price_micros: tick.ask_micros })
        }
        (Side::Buy, OrderType::Limit) => {
            let limit = limit_price_micros?;
            (tick.ask_micros <= limit).then(|| MatchResult {
                fill_price_micros: tick.ask_micros.min(limit),
            })
        }
        (Side::Sell, OrderType::Market) | (Side::Sell, OrderType::Stop) => {
            Some(MatchResult { fill_price_micros: tick.bid_micros })
        }
        (Side::Sell, OrderType::Limit) => {
            let limit = limit_price_micros?;
            (tick.bid_micros >= limit).then(|| MatchResult {
                fill_price_micros: tick.bid_micros.max(limit),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tick(bid: i64, ask: i64, last: i64) -> Tick {
        Tick::new(bid, ask, last, 0)
    }

    #[test]
    fn buy_market_fills_at_ask() {
        let mut armed = false;
        let r = evaluate(Side::Buy, OrderType::Market, None, None, &mut armed, &tick(99, 101, 100));
        assert_eq!(r, Some(MatchResult { fill_price_micros: 101 }));
    }

    #[test]
    fn sell_market_fills_at_bid() {
        let mut armed = false;
        let r = evaluate(Side::Sell, OrderType::Market, None, None, &mut armed, &tick(99, 101, 100));
        assert_eq!(r, Some(MatchResult { fill_price_micros: 99 }));
    }

    #[test]
    fn buy_limit_waits_while_ask_above_limit() {
        let mut armed = false;
        let r = evaluate(Side::Buy, OrderType::Limit, Some(100), None, &mut armed, &tick(99, 105, 100));
        assert!(r.is_none());
    }

    #[test]
    fn buy_limit_fills_when_ask_at_or_below_limit() {
        let mut armed = false;
        let r = evaluate(Side::Buy, OrderType::Limit, Some(100), None, &mut armed, &tick(95, 98, 97));
        assert_eq!(r, Some(MatchResult { fill_price_micros: 98 }));
    }

    #[test]
    fn sell_limit_waits_while_bid_below_limit() {
        let mut armed = false;
        let r = evaluate(Side::Sell, OrderType::Limit, Some(100), None, &mut armed, &tick(95, 101, 98));
        assert!(r.is_none());
    }

    #[test]
    fn sell_limit_fills_when_bid_at_or_above_limit() {
        let mut armed = false;
        let r = evaluate(Side::Sell, OrderType::Limit, Some(100), None, &mut armed, &tick(103, 106, 104));
        assert_eq!(r, Some(MatchResult { fill_price_micros: 103 }));
    }

    #[test]
    fn buy_stop_stays_unarmed_below_trigger() {
        let mut armed = false;
        let r = evaluate(Side::Buy, OrderType::Stop, None, Some(100), &mut armed, &tick(90, 92, 95));
        assert!(r.is_none());
        assert!(!armed);
    }

    #[test]
    fn buy_stop_arms_and_fills_once_trigger_crossed() {
        let mut armed = false;
        let r = evaluate(Side::Buy, OrderType::Stop, None, Some(100), &mut armed, &tick(99, 101, 100));
        assert!(armed);
        assert_eq!(r, Some(MatchResult { fill_price_micros: 101 }));
    }

    #[test]
    fn sell_stop_arms_once_last_falls_to_trigger() {
        let mut armed = false;
        let r = evaluate(Side::Sell, OrderType::Stop, None, Some(100), &mut armed, &tick(99, 101, 99));
        assert!(armed);
        assert_eq!(r, Some(MatchResult { fill_price_micros: 99 }));
    }

    #[test]
    fn armed_stop_behaves_as_market_on_subsequent_ticks() {
        let mut armed = true;
        let r = evaluate(Side::Buy, OrderType::Stop, None, Some(100), &mut armed, &tick(110, 112, 111));
        assert_eq!(r, Some(MatchResult { fill_price_micros: 112 }));
    }
}
