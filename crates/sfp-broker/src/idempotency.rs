//! Idempotency folding: a broker may redeliver the same ack/fill/reject
//! more than once (at-least-once delivery on their side). Duplicate events
//! carrying the same `idempotency_key` + event-kind tag are folded to a
//! single application rather than double-counted.

use std::collections::HashSet;

use sfp_types::events::{BrokerEvent, BrokerEventKind};

fn kind_tag(kind: &BrokerEventKind) -> &'static str {
    match kind {
        BrokerEventKind::Ack => "ack",
        BrokerEventKind::PartialFill { .. } => "partial_fill",
        BrokerEventKind::Fill { .. } => "fill",
        BrokerEventKind::Reject { .. } => "reject",
        BrokerEventKind::CancelAck => "cancel_ack",
        BrokerEventKind::CancelReject { .. } => "cancel_reject",
    }
}

/// Folds duplicate broker events in-process. A partial fill is keyed by
/// its delta, since two distinct partial fills legitimately share an
/// `idempotency_key` (the order id) but represent different quantities.
#[derive(Default)]
pub struct IdempotencyFolder {
    seen: HashSet<String>,
}

impl IdempotencyFolder {
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` if this event has not been applied before and should be
    /// processed; `false` if it is a duplicate and must be dropped.
    pub fn should_apply(&mut self, event: &BrokerEvent) -> bool {
        let dedup_key = match &event.kind {
            BrokerEventKind::PartialFill { delta_qty, price_micros } => {
                format!("{}:{}:{}:{}", event.idempotency_key, kind_tag(&event.kind), delta_qty, price_micros)
            }
            _ => format!("{}:{}", event.idempotency_key, kind_tag(&event.kind)),
        };
        self.seen.insert(dedup_key)
    }
}
