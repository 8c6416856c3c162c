//! Orchestrates paper-mode matching: registers pending orders against a
//! symbol, feeds incoming ticks through the matching policy, and expires
//! orders whose monotonic deadline has passed. This is the MME's only
//! public entry point; `ring`, `matching`, and `timeout` are its building
//! blocks.

use std::collections::BTreeMap;

use dashmap::DashMap;
use tracing::{info, warn};
use uuid::Uuid;

use sfp_errors::PipelineError;
use sfp_hotstore::streams;
use sfp_hotstore::RedisPool;
use sfp_types::order::{OrderType, Side};
use sfp_types::tick::Tick;

use crate::matching::{evaluate, MatchResult};
use crate::ring::TickRings;
use crate::timeout::MatchDeadline;

struct PendingOrder {
    symbol: String,
    side: Side,
    order_type: OrderType,
    limit_price_micros: Option<i64>,
    trigger_price_micros: Option<i64>,
    armed: bool,
    deadline: MatchDeadline,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MatchOutcome {
    Filled { order_id: Uuid, fill_price_micros: i64 },
    TimedOut { order_id: Uuid },
}

pub struct MatchingEngine {
    rings: TickRings,
    pending: DashMap<Uuid, PendingOrder>,
    tick_stream_maxlen: usize,
}

impl MatchingEngine {
    pub fn new(buffer_size: u32) -> Self {
        Self {
            rings: TickRings::new(buffer_size as usize),
            pending: DashMap::new(),
            tick_stream_maxlen: buffer_size as usize,
        }
    }

    /// Register a paper order to be matched against future ticks for its
    /// symbol. STOP orders start unarmed; everything else is eligible on
    /// the very next tick.
    #[allow(clippy::too_many_arguments)]
    pub fn register(
        &self,
        order_id: Uuid,
        symbol: &str,
        side: Side,
        order_type: OrderType,
        limit_price_micros: Option<i64>,
        trigger_price_micros: Option<i64>,
        match_timeout_ms: i64,
    ) {
        self.pending.insert(
            order_id,
            PendingOrder {
                symbol: symbol.to_string(),
                side,
                order_type,
                limit_price_micros,
                trigger_price_micros,
                armed: false,
                deadline: MatchDeadline::starting_now(match_timeout_ms),
            },
        );
    }

    /// Withdraw a pending paper order, e.g. on user cancel. No-op if it
    /// already matched or timed out.
    pub fn cancel(&self, order_id: Uuid) {
        self.pending.remove(&order_id);
    }

    pub fn is_pending(&self, order_id: Uuid) -> bool {
        self.pending.contains_key(&order_id)
    }

    /// Persist `tick` to the bounded recovery stream and evaluate it
    /// against every pending order on `symbol`. Full-fill-only: the first
    /// eligible tick fills the whole order and removes it from the
    /// pending set; everything else waits for the next tick.
    pub async fn on_tick(
        &self,
        pool: &RedisPool,
        symbol: &str,
        tick: Tick,
    ) -> Result<Vec<MatchOutcome>, PipelineError> {
        self.rings.push(symbol, tick);

        let mut fields = BTreeMap::new();
        fields.insert("bid_micros".to_string(), tick.bid_micros.to_string());
        fields.insert("ask_micros".to_string(), tick.ask_micros.to_string());
        fields.insert("last_micros".to_string(), tick.last_micros.to_string());
        fields.insert("ts_millis".to_string(), tick.ts_millis.to_string());
        streams::push_bounded(pool, &format!("ticks:{symbol}"), self.tick_stream_maxlen, &fields).await?;

        let candidates: Vec<Uuid> = self
            .pending
            .iter()
            .filter(|entry| entry.value().symbol == symbol)
            .map(|entry| *entry.key())
            .collect();

        let mut outcomes = Vec::new();
        for order_id in candidates {
            let matched = {
                let mut entry = match self.pending.get_mut(&order_id) {
                    Some(e) => e,
                    None => continue,
                };
                evaluate(
                    entry.side,
                    entry.order_type,
                    entry.limit_price_micros,
                    entry.trigger_price_micros,
                    &mut entry.armed,
                    &tick,
                )
            };
            if let Some(MatchResult { fill_price_micros }) = matched {
                self.pending.remove(&order_id);
                info!(order_id = %order_id, symbol, fill_price_micros, "paper fill");
                outcomes.push(MatchOutcome::Filled { order_id, fill_price_micros });
            }
        }

        Ok(outcomes)
    }

    /// Sweep pending orders for expired deadlines, independent of tick
    /// arrival. Intended to be driven by a fixed-interval task alongside
    /// tick intake.
    pub fn sweep_timeouts(&self) -> Vec<MatchOutcome> {
        let expired: Vec<Uuid> = self
            .pending
            .iter()
            .filter(|entry| entry.value().deadline.expired())
            .map(|entry| *entry.key())
            .collect();

        expired
            .into_iter()
            .filter_map(|order_id| {
                self.pending.remove(&order_id).map(|_| {
                    warn!(order_id = %order_id, "paper match timed out");
                    MatchOutcome::TimedOut { order_id }
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_then_cancel_leaves_nothing_pending() {
        let engine = MatchingEngine::new(16);
        let id = Uuid::new_v4();
        engine.register(id, "RELIANCE", Side::Buy, OrderType::Market, None, None, 60_000);
        assert!(engine.is_pending(id));
        engine.cancel(id);
        assert!(!engine.is_pending(id));
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_times_out_expired_orders_only() {
        let engine = MatchingEngine::new(16);
        let expires_soon = Uuid::new_v4();
        let expires_later = Uuid::new_v4();
        engine.register(expires_soon, "RELIANCE", Side::Buy, OrderType::Market, None, None, 1_000);
        engine.register(expires_later, "RELIANCE", Side::Buy, OrderType::Market, None, None, 60_000);

        tokio::time::advance(std::time::Duration::from_millis(1_001)).await;

        let outcomes = engine.sweep_timeouts();
        assert_eq!(outcomes.len(), 1);
        assert!(matches!(outcomes[0], MatchOutcome::TimedOut { order_id } if order_id == expires_soon));
        assert!(engine.is_pending(expires_later));
        assert!(!engine.is_pending(expires_soon));
    }
}
