//! The Order Manager: single source of truth for order identity and state.

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{info, warn};
use uuid::Uuid;

use sfp_errors::{PipelineError, TimeoutScope};
use sfp_hotstore::RedisPool;
use sfp_types::events::OrderStateChanged;
use sfp_types::order::{Order, OrderState, TransitionLogEntry};
use sfp_types::signal::Signal;

use crate::duplicate_guard::check_and_record;
use crate::state_machine::validate_transition;

const DEFAULT_SIGNAL_WINDOW_MS: i64 = 1000;
const ORDER_LOCK_TTL_MS: i64 = 30_000;
const LOCK_RETRY_ATTEMPTS: u32 = 5;
/// `XADD ... MAXLEN ~ N`: enough history per order to replay a crash
/// recovery without the stream growing unbounded for long-lived orders.
const TX_STREAM_MAXLEN: usize = 256;

fn order_hot_key(order_id: Uuid) -> String {
    format!("order:{order_id}")
}

fn order_tx_stream_key(order_id: Uuid) -> String {
    format!("order:tx:{order_id}")
}

/// In-memory order registry plus the Redis-backed locks, hot-state key, and
/// transaction log stream that make its mutations crash-recoverable. Both
/// the live Order records and the append-only transition log are mirrored
/// to SQL by the DB Sync Worker, which reads them back out of Redis rather
/// than from this process's memory.
pub struct OrderManager {
    pool: RedisPool,
    orders: Arc<DashMap<Uuid, Order>>,
    /// Append-only, in-process view of the transaction log, mirroring what
    /// every mutation also pushes to the `order:tx:{id}` Redis stream.
    tx_log: Arc<DashMap<Uuid, Vec<TransitionLogEntry>>>,
    min_order_interval_ms: i64,
    lock_timeout_ms: i64,
}

impl OrderManager {
    pub fn new(pool: RedisPool, min_order_interval_ms: i64, lock_timeout_ms: i64) -> Self {
        Self {
            pool,
            orders: Arc::new(DashMap::new()),
            tx_log: Arc::new(DashMap::new()),
            min_order_interval_ms,
            lock_timeout_ms,
        }
    }

    /// Create an order from a signal, or reject it as a duplicate/rate
    /// limit hit. Atomic: the duplicate guard and the CREATED write happen
    /// under the per-user lock.
    pub async fn create(&self, signal: Signal, now_millis: i64) -> Result<Uuid, PipelineError> {
        let user_key = format!("lock:user:{}", signal.user_id);
        let guard = sfp_hotstore::acquire(
            &self.pool,
            &user_key,
            self.lock_timeout_ms,
            LOCK_RETRY_ATTEMPTS,
            TimeoutScope::LockAcquisition,
        )
        .await?;

        let result = check_and_record(
            &self.pool,
            &signal,
            DEFAULT_SIGNAL_WINDOW_MS,
            self.min_order_interval_ms,
            now_millis,
        )
        .await;

        let outcome = match result {
            Ok(()) => {
                let id = Uuid::new_v4();
                let order = Order {
                    id,
                    user_id: signal.user_id.clone(),
                    strategy_id: signal.strategy_id.clone(),
                    symbol: signal.symbol.clone(),
                    side: signal.side,
                    order_type: signal.order_type,
                    product_type: signal.product_type,
                    requested_qty: signal.qty,
                    requested_price_micros: signal.price_micros,
                    filled_qty: 0,
                    avg_filled_price_micros: None,
                    state: OrderState::Created,
                    broker_order_id: None,
                    error: None,
                    retry_count: 0,
                    paper_mode: signal.paper_mode,
                    metadata: signal.metadata.clone(),
                    created_at_millis: now_millis,
                    updated_at_millis: now_millis,
                };
                self.orders.insert(id, order);
                self.append_log(id, None, OrderState::Created, "system", None, now_millis).await;
                self.persist_hot_state(id).await;
                info!(order_id = %id, user_id = %signal.user_id, "order created");
                Ok(id)
            }
            Err(e) => {
                warn!(user_id = %signal.user_id, error = %e, "order creation rejected");
                Err(e)
            }
        };

        let _ = sfp_hotstore::release(&self.pool, &guard).await;
        outcome
    }

    /// Validate and apply a transition, appending to the transaction log
    /// and returning the event to publish on success.
    pub async fn transition(
        &self,
        order_id: Uuid,
        to: OrderState,
        actor: &str,
        reason: Option<String>,
        now_millis: i64,
    ) -> Result<OrderStateChanged, PipelineError> {
        let order_key = format!("lock:order:{order_id}");
        let guard = sfp_hotstore::acquire(
            &self.pool,
            &order_key,
            ORDER_LOCK_TTL_MS,
            LOCK_RETRY_ATTEMPTS,
            TimeoutScope::LockAcquisition,
        )
        .await?;

        let outcome = self.do_transition(order_id, to, actor, reason, now_millis).await;
        let _ = sfp_hotstore::release(&self.pool, &guard).await;
        outcome
    }

    async fn do_transition(
        &self,
        order_id: Uuid,
        to: OrderState,
        actor: &str,
        reason: Option<String>,
        now_millis: i64,
    ) -> Result<OrderStateChanged, PipelineError> {
        let from = {
            let mut entry = self
                .orders
                .get_mut(&order_id)
                .ok_or(PipelineError::NotFound)?;

            let from = entry.state;
            if let Err(e) = validate_transition(from, to) {
                warn!(order_id = %order_id, ?from, ?to, "invalid transition rejected");
                return Err(e);
            }

            entry.state = to;
            entry.updated_at_millis = now_millis;
            from
        };

        self.append_log(order_id, Some(from), to, actor, reason, now_millis).await;
        self.persist_hot_state(order_id).await;
        info!(order_id = %order_id, ?from, ?to, actor, "order transitioned");

        Ok(OrderStateChanged {
            order_id,
            user_id: self
                .orders
                .get(&order_id)
                .map(|o| o.user_id.clone())
                .unwrap_or_default(),
            from,
            to,
            ts_millis: now_millis,
        })
    }

    /// Convenience wrapper: request cancellation if the current state
    /// permits `-> CANCELLING`.
    pub async fn cancel(
        &self,
        order_id: Uuid,
        reason: String,
        now_millis: i64,
    ) -> Result<OrderStateChanged, PipelineError> {
        self.transition(order_id, OrderState::Cancelling, "operator", Some(reason), now_millis)
            .await
    }

    /// Record a broker (or paper-engine) acknowledgment: PLACING -> PLACED
    /// plus the assigned external order id. `broker_order_id` is the
    /// invariant-bearing field (`requires_broker_order_id`), so it is
    /// always set in the same locked step as the state change.
    pub async fn mark_placed(
        &self,
        order_id: Uuid,
        broker_order_id: String,
        retry_count: u32,
        now_millis: i64,
    ) -> Result<OrderStateChanged, PipelineError> {
        let order_key = format!("lock:order:{order_id}");
        let guard = sfp_hotstore::acquire(
            &self.pool,
            &order_key,
            ORDER_LOCK_TTL_MS,
            LOCK_RETRY_ATTEMPTS,
            TimeoutScope::LockAcquisition,
        )
        .await?;

        let outcome = (|| {
            let mut entry = self.orders.get_mut(&order_id).ok_or(PipelineError::NotFound)?;
            let from = entry.state;
            validate_transition(from, OrderState::Placed)?;
            entry.state = OrderState::Placed;
            entry.broker_order_id = Some(broker_order_id.clone());
            entry.retry_count = retry_count;
            entry.updated_at_millis = now_millis;
            Ok(from)
        })();

        let result = match outcome {
            Ok(from) => {
                self.append_log(order_id, Some(from), OrderState::Placed, "broker", None, now_millis)
                    .await;
                self.persist_hot_state(order_id).await;
                info!(order_id = %order_id, broker_order_id, retry_count, "order placed");
                Ok(OrderStateChanged {
                    order_id,
                    user_id: self.orders.get(&order_id).map(|o| o.user_id.clone()).unwrap_or_default(),
                    from,
                    to: OrderState::Placed,
                    ts_millis: now_millis,
                })
            }
            Err(e) => Err(e),
        };

        let _ = sfp_hotstore::release(&self.pool, &guard).await;
        result
    }

    /// Apply a fill (full or partial) from a live broker event or the
    /// paper matching engine. PLACED -> FILLING on the first fill;
    /// FILLING -> FILLED once the accumulated `filled_qty` reaches
    /// `requested_qty`. `avg_filled_price_micros` is the running
    /// volume-weighted average across every fill applied so far.
    pub async fn record_fill(
        &self,
        order_id: Uuid,
        delta_qty: i64,
        fill_price_micros: i64,
        now_millis: i64,
    ) -> Result<OrderStateChanged, PipelineError> {
        let order_key = format!("lock:order:{order_id}");
        let guard = sfp_hotstore::acquire(
            &self.pool,
            &order_key,
            ORDER_LOCK_TTL_MS,
            LOCK_RETRY_ATTEMPTS,
            TimeoutScope::LockAcquisition,
        )
        .await?;

        let outcome = (|| {
            let mut entry = self.orders.get_mut(&order_id).ok_or(PipelineError::NotFound)?;
            let from = entry.state;
            if from != OrderState::Filling {
                validate_transition(from, OrderState::Filling)?;
            }

            let prior_qty = entry.filled_qty;
            let prior_notional = entry.avg_filled_price_micros.unwrap_or(0) as i128 * prior_qty as i128;
            let new_qty = prior_qty + delta_qty;
            let new_notional = prior_notional + fill_price_micros as i128 * delta_qty as i128;

            entry.filled_qty = new_qty;
            entry.avg_filled_price_micros = if new_qty > 0 { Some((new_notional / new_qty as i128) as i64) } else { None };
            entry.state = OrderState::Filling;
            entry.updated_at_millis = now_millis;

            if new_qty >= entry.requested_qty {
                validate_transition(OrderState::Filling, OrderState::Filled)?;
                entry.state = OrderState::Filled;
            }

            Ok((from, entry.state))
        })();

        let result = match outcome {
            Ok((from, to)) => {
                self.append_log(order_id, Some(from), to, "fill", None, now_millis).await;
                self.persist_hot_state(order_id).await;
                info!(order_id = %order_id, delta_qty, fill_price_micros, ?to, "order fill applied");
                Ok(OrderStateChanged {
                    order_id,
                    user_id: self.orders.get(&order_id).map(|o| o.user_id.clone()).unwrap_or_default(),
                    from,
                    to,
                    ts_millis: now_millis,
                })
            }
            Err(e) => Err(e),
        };

        let _ = sfp_hotstore::release(&self.pool, &guard).await;
        result
    }

    pub fn get(&self, order_id: Uuid) -> Option<Order> {
        self.orders.get(&order_id).map(|o| o.clone())
    }

    pub fn list_by_user(&self, user_id: &str) -> Vec<Order> {
        self.orders
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .map(|entry| entry.clone())
            .collect()
    }

    pub fn history(&self, order_id: Uuid) -> Vec<TransitionLogEntry> {
        self.tx_log.get(&order_id).map(|v| v.clone()).unwrap_or_default()
    }

    /// Append to the in-process log and push the same entry to the
    /// durable `order:tx:{id}` stream. Best-effort on the Redis side: a
    /// failed push is logged rather than propagated, since the in-process
    /// log has already recorded the transition and the caller's state
    /// change must not be rolled back over a stream hiccup.
    async fn append_log(
        &self,
        order_id: Uuid,
        from: Option<OrderState>,
        to: OrderState,
        actor: &str,
        reason: Option<String>,
        now_millis: i64,
    ) {
        let entry = TransitionLogEntry {
            order_id,
            from: from.unwrap_or(OrderState::Created),
            to,
            actor: actor.to_string(),
            reason: reason.clone(),
            ts_millis: now_millis,
        };
        self.tx_log.entry(order_id).or_default().push(entry);

        let mut fields = BTreeMap::new();
        fields.insert("from".to_string(), format!("{:?}", from.unwrap_or(OrderState::Created)));
        fields.insert("to".to_string(), format!("{to:?}"));
        fields.insert("actor".to_string(), actor.to_string());
        fields.insert("reason".to_string(), reason.unwrap_or_default());
        fields.insert("ts_millis".to_string(), now_millis.to_string());

        if let Err(e) =
            sfp_hotstore::streams::push_bounded(&self.pool, &order_tx_stream_key(order_id), TX_STREAM_MAXLEN, &fields)
                .await
        {
            warn!(order_id = %order_id, error = %e, "failed to push transition to recovery stream");
        }
    }

    /// Mirror the current snapshot to the `order:{id}` hot key. Called
    /// under the same lock as the mutation it follows, so a reader never
    /// observes a state change that isn't also reflected in Redis.
    async fn persist_hot_state(&self, order_id: Uuid) {
        let Some(order) = self.orders.get(&order_id).map(|o| o.clone()) else {
            return;
        };
        let json = match serde_json::to_string(&order) {
            Ok(s) => s,
            Err(e) => {
                warn!(order_id = %order_id, error = %e, "failed to serialize order for hot key");
                return;
            }
        };

        let mut conn = match self.pool.get().await {
            Ok(c) => c,
            Err(e) => {
                warn!(order_id = %order_id, error = %e, "redis pool checkout failed for hot key write");
                return;
            }
        };

        use redis::AsyncCommands;
        if let Err(e) = conn.set::<_, _, ()>(order_hot_key(order_id), json).await {
            warn!(order_id = %order_id, error = %e, "failed to write order hot key");
        }
    }
}
