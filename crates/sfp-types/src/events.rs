//! Typed event-bus payloads that replace direct cross-component calls
//! between OM, QD, BA, and MME.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::order::OrderState;

/// Published by the Order Manager on every successful `transition` call.
/// QD, DSW, and notification fan-out all subscribe without any of them
/// calling back into OM directly.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OrderStateChanged {
    pub order_id: Uuid,
    pub user_id: String,
    pub from: OrderState,
    pub to: OrderState,
    pub ts_millis: i64,
}

/// Published by the Broker Adapter or the Mock Matching Engine when a
/// broker (or paper) event arrives. The Order Manager is the only
/// subscriber that mutates state in response.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum BrokerEventKind {
    Ack,
    PartialFill { delta_qty: i64, price_micros: i64 },
    Fill { delta_qty: i64, price_micros: i64 },
    Reject { reason: String },
    CancelAck,
    CancelReject { reason: String },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BrokerEvent {
    pub order_id: Uuid,
    pub broker_order_id: String,
    /// Idempotency key — the internal order id. Duplicate broker acks with
    /// the same key must be folded.
    pub idempotency_key: String,
    pub kind: BrokerEventKind,
    pub ts_millis: i64,
}
