//! Background worker loops: claims queued orders and routes them to
//! either the broker adapter or the paper matching engine, sweeps expired
//! paper timeouts, and drives the DB Sync Worker's flush cadence.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use uuid::Uuid;

use sfp_broker::submission::submit_with_retry;
use sfp_errors::PipelineError;
use sfp_queue::{ClaimedItem, FairnessTick};
use sfp_types::events::OrderStateChanged;
use sfp_types::order::{Order, OrderState};
use sfp_types::queue::Priority;

use crate::state::{AppState, BusMsg};

/// Every Nth claim attempt is forced onto the lowest-priority stream
/// regardless of strict priority order, guaranteeing P3 makes progress
/// under sustained P1/P2 saturation.
const FAIRNESS_TICK_EVERY: u32 = 5;
const IDLE_POLL_MS: u64 = 200;
const ALL_PRIORITIES: [Priority; 3] = [Priority::High, Priority::Normal, Priority::Low];

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn publish(state: &AppState, event: OrderStateChanged) {
    let _ = state.bus.send(BusMsg::OrderEvent(event));
}

/// Run one worker's claim/process loop until the process shuts down.
/// Uses `FairnessTick` to pick which priority stream to draw from, trusting
/// the stream's own blocking claim to resolve a wrongly-guessed "non-empty"
/// priority to `None` rather than maintaining a separate emptiness oracle.
pub async fn run_dispatch_worker(state: Arc<AppState>, worker_id: String) {
    let mut fairness = FairnessTick::new(FAIRNESS_TICK_EVERY);
    loop {
        let Some(priority) = fairness.next_priority(&ALL_PRIORITIES) else {
            tokio::time::sleep(Duration::from_millis(IDLE_POLL_MS)).await;
            continue;
        };

        let claimed = match state.queue.claim(&worker_id, priority).await {
            Ok(found) => found,
            Err(e) => {
                warn!(error = %e, ?priority, "claim failed");
                None
            }
        };

        let Some((entry_id, item)) = claimed else {
            tokio::time::sleep(Duration::from_millis(IDLE_POLL_MS)).await;
            continue;
        };

        state.worker_stats.record_claim(&worker_id);
        let started = std::time::Instant::now();

        match process_claimed(&state, &entry_id, item.clone()).await {
            Ok(()) => {
                state.worker_stats.record_processed(&worker_id, started.elapsed().as_millis() as u64);
            }
            Err(e) => {
                state.worker_stats.record_failed(&worker_id);
                warn!(order_id = %item.order_id, error = %e, "dispatch failed, requeuing");
                let requeue = e.is_retryable();
                if let Err(nack_err) = state
                    .queue
                    .nack(item.priority, &entry_id, item, requeue, &e.to_string(), now_millis())
                    .await
                {
                    warn!(error = %nack_err, "nack itself failed");
                }
            }
        }
    }
}

async fn process_claimed(state: &Arc<AppState>, entry_id: &str, item: ClaimedItem) -> Result<(), PipelineError> {
    let now = now_millis();

    let order = match state.om.get(item.order_id) {
        Some(o) => o,
        None => {
            state.queue.ack(item.priority, entry_id).await?;
            return Ok(());
        }
    };

    let event = state.om.transition(order.id, OrderState::Placing, "dispatcher", None, now).await?;
    publish(state, event);
    state.mark_order_dirty(order.id).await;

    let order = state.om.get(order.id).ok_or(PipelineError::NotFound)?;

    if order.paper_mode {
        route_to_paper_engine(state, &order, now).await?;
    } else {
        route_to_broker(state, &order, now).await?;
    }

    state.queue.ack(item.priority, entry_id).await
}

async fn route_to_paper_engine(state: &Arc<AppState>, order: &Order, now: i64) -> Result<(), PipelineError> {
    let (limit_price, trigger_price) = match order.order_type {
        sfp_types::order::OrderType::Stop => (None, order.requested_price_micros),
        _ => (order.requested_price_micros, None),
    };

    state.mme.register(
        order.id,
        &order.symbol,
        order.side,
        order.order_type,
        limit_price,
        trigger_price,
        state.config.paper.match_timeout_ms,
    );

    let event = state.om.mark_placed(order.id, format!("paper-{}", order.id), 0, now).await?;
    publish(state, event);
    state.mark_order_dirty(order.id).await;
    info!(order_id = %order.id, symbol = %order.symbol, "registered with paper matching engine");
    Ok(())
}

async fn route_to_broker(state: &Arc<AppState>, order: &Order, now: i64) -> Result<(), PipelineError> {
    match submit_with_retry(&state.broker, order).await {
        Ok((broker_order_id, attempts)) => {
            let event = state.om.mark_placed(order.id, broker_order_id, attempts.saturating_sub(1), now).await?;
            publish(state, event);
            state.mark_order_dirty(order.id).await;
        }
        Err(PipelineError::BrokerReject(reason)) => {
            let event = state
                .om
                .transition(order.id, OrderState::Rejected, "broker", Some(reason), now)
                .await?;
            publish(state, event);
            state.mark_order_dirty(order.id).await;
        }
        Err(e) => return Err(e),
    }
    Ok(())
}

/// Periodically sweep the paper matching engine for expired deadlines,
/// independent of tick arrival.
pub async fn run_timeout_sweeper(state: Arc<AppState>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        for outcome in state.mme.sweep_timeouts() {
            if let sfp_mme::MatchOutcome::TimedOut { order_id } = outcome {
                apply_timeout(&state, order_id).await;
            }
        }
    }
}

async fn apply_timeout(state: &Arc<AppState>, order_id: Uuid) {
    let now = now_millis();
    match state
        .om
        .transition(order_id, OrderState::Rejected, "mme", Some("MatchTimeout".to_string()), now)
        .await
    {
        Ok(event) => {
            publish(state, event);
            state.mark_order_dirty(order_id).await;
        }
        Err(e) => warn!(%order_id, error = %e, "failed to apply paper timeout rejection"),
    }
}

/// Drive the DB Sync Worker's flush cadence, re-reading its own adaptive
/// interval after every cycle instead of running on a fixed timer.
pub async fn run_dsw_loop(state: Arc<AppState>) {
    loop {
        let interval_ms = {
            let worker = state.dsw.lock().await;
            worker.current_interval_ms()
        };
        tokio::time::sleep(Duration::from_millis(interval_ms.max(1) as u64)).await;

        let (flush_result, stalled, last_applied, next_interval_ms) = {
            let mut worker = state.dsw.lock().await;
            let flush_result = worker.flush_once().await;
            (
                flush_result,
                worker.is_stalled(),
                worker.last_applied_position(),
                worker.current_interval_ms(),
            )
        };

        match flush_result {
            Ok(stats) if stats.rows_written > 0 => {
                info!(rows_written = stats.rows_written, compressed = stats.compressed_count, "dsw flush cycle");
            }
            Ok(_) => {}
            Err(PipelineError::DbSyncStalled) => {
                warn!("dsw stalled, halting new flushes until sql recovers");
            }
            Err(e) => {
                warn!(error = %e, "dsw flush cycle failed");
            }
        }

        let mut status = state.status.write().await;
        status.dsw_stalled = stalled;
        status.dsw_last_applied_position = last_applied;
        status.dsw_interval_ms = next_interval_ms;
    }
}
