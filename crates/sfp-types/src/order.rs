//! Order — the central state-machine entity.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderType {
    Market,
    Limit,
    Stop,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProductType {
    Intraday,
    Delivery,
    Btst,
}

/// All states an Order can occupy. Exhaustive — see the permitted
/// transition diagram in the order manager's state machine.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderState {
    Created,
    Pending,
    Placing,
    Placed,
    Filling,
    Filled,
    Cancelling,
    Cancelled,
    Rejected,
}

impl OrderState {
    /// `true` for FILLED, REJECTED, CANCELLED — no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Filled | Self::Rejected | Self::Cancelled)
    }

    /// `true` once a `broker_order_id` is required to be set
    /// (`broker_order_id` is set iff state >= PLACED).
    pub fn requires_broker_order_id(self) -> bool {
        matches!(
            self,
            Self::Placed | Self::Filling | Self::Cancelling | Self::Filled | Self::Cancelled
        )
    }
}

impl fmt::Display for OrderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// The central trade record.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub user_id: String,
    pub strategy_id: Option<String>,
    pub symbol: String,
    pub side: Side,
    pub order_type: OrderType,
    pub product_type: ProductType,
    pub requested_qty: i64,
    pub requested_price_micros: Option<i64>,
    pub filled_qty: i64,
    pub avg_filled_price_micros: Option<i64>,
    pub state: OrderState,
    pub broker_order_id: Option<String>,
    pub error: Option<String>,
    pub retry_count: u32,
    pub paper_mode: bool,
    pub metadata: BTreeMap<String, String>,
    pub created_at_millis: i64,
    pub updated_at_millis: i64,
}

impl Order {
    /// `true` if this order satisfies both core invariants:
    /// `filled_quantity <= requested_quantity`, and `broker_order_id`
    /// presence matching state.
    pub fn invariants_hold(&self) -> bool {
        let qty_ok = self.filled_qty <= self.requested_qty && self.filled_qty >= 0;
        let broker_id_ok = self.state.requires_broker_order_id() == self.broker_order_id.is_some();
        qty_ok && broker_id_ok
    }

    /// `true` when a FILLED order has fully consumed its requested quantity.
    pub fn fill_complete_if_filled(&self) -> bool {
        if self.state == OrderState::Filled {
            self.filled_qty == self.requested_qty
        } else {
            true
        }
    }
}

/// `{order_id, from, to, actor, reason, ts}` — appended on every attempted
/// transition. The append-only recovery oracle for DSW.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransitionLogEntry {
    pub order_id: Uuid,
    pub from: OrderState,
    pub to: OrderState,
    pub actor: String,
    pub reason: Option<String>,
    pub ts_millis: i64,
}
