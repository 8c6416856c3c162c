//! Strategy-produced trading intent, ingested at `submit_signal`.
//!
//! A `Signal` is ephemeral: it exists only long enough for the Order
//! Manager to fingerprint it, collapse duplicates, and either mint an
//! `Order` or reject it. Signals are never persisted on their own.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::order::{OrderType, ProductType, Side};

/// Strategy-produced trading intent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub user_id: String,
    pub strategy_id: Option<String>,
    pub symbol: String,
    pub side: Side,
    pub order_type: OrderType,
    pub product_type: ProductType,
    /// Suggested quantity (> 0).
    pub qty: i64,
    /// Limit/stop price in micros; `None` for MARKET orders.
    pub price_micros: Option<i64>,
    /// Whether this order is matched by the paper engine instead of a
    /// live broker. Decided at ingress; immutable thereafter.
    pub paper_mode: bool,
    /// Opaque metadata carried through to the Order.
    pub metadata: BTreeMap<String, String>,
    /// Millisecond epoch timestamp the signal was produced.
    pub ts_millis: i64,
}

impl Signal {
    /// The time bucket a signal's timestamp falls into, at the given
    /// window size in milliseconds. Two signals in the same bucket are
    /// candidates for fingerprint collapse.
    pub fn timestamp_bucket(&self, window_ms: i64) -> i64 {
        if window_ms <= 0 {
            return self.ts_millis;
        }
        self.ts_millis / window_ms
    }

    /// Deterministic fingerprint over `{user_id, strategy_id, symbol, side,
    /// timestamp_bucket}`, used by the Order Manager's duplicate guard.
    /// Quantity/price are intentionally excluded: two signals for the same
    /// symbol/side/window collapse regardless of size differences.
    pub fn fingerprint(&self, window_ms: i64) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.user_id.as_bytes());
        hasher.update(b"|");
        hasher.update(self.strategy_id.as_deref().unwrap_or("").as_bytes());
        hasher.update(b"|");
        hasher.update(self.symbol.as_bytes());
        hasher.update(b"|");
        hasher.update(format!("{:?}", self.side).as_bytes());
        hasher.update(b"|");
        hasher.update(self.timestamp_bucket(window_ms).to_string().as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Signature used for the *order* duplicate guard at creation time:
    /// `{user, signal_id=fingerprint, symbol, side, rounded_qty, order_type}`.
    /// `rounded_qty` buckets to the nearest 1 so distinct exact quantities
    /// still collapse when they land in the same signal fingerprint window.
    pub fn order_signature(&self, window_ms: i64) -> String {
        format!(
            "{}|{}|{}|{:?}|{}|{:?}",
            self.user_id,
            self.fingerprint(window_ms),
            self.symbol,
            self.side,
            self.qty,
            self.order_type
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_signal() -> Signal {
        Signal {
            user_id: "u1".into(),
            strategy_id: Some("s1".into()),
            symbol: "RELIANCE".into(),
            side: Side::Buy,
            order_type: OrderType::Market,
            product_type: ProductType::Intraday,
            qty: 10,
            price_micros: None,
            paper_mode: false,
            metadata: BTreeMap::new(),
            ts_millis: 1_000,
        }
    }

    #[test]
    fn identical_signals_in_same_window_fingerprint_equal() {
        let a = base_signal();
        let mut b = base_signal();
        b.ts_millis = 1_150; // same 1s bucket
        assert_eq!(a.fingerprint(1_000), b.fingerprint(1_000));
    }

    #[test]
    fn signals_in_different_windows_fingerprint_differ() {
        let a = base_signal();
        let mut b = base_signal();
        b.ts_millis = 5_000;
        assert_ne!(a.fingerprint(1_000), b.fingerprint(1_000));
    }

    #[test]
    fn different_symbol_changes_fingerprint() {
        let a = base_signal();
        let mut b = base_signal();
        b.symbol = "TCS".into();
        assert_ne!(a.fingerprint(1_000), b.fingerprint(1_000));
    }
}
