//! Orchestrates one flush cycle: drain dirty orders and positions,
//! pipeline-read their current hot state, compress oversized metadata,
//! bulk upsert to SQL alongside any newly appended transitions, and
//! advance the adaptive interval from the resulting queue depth.

use std::sync::Arc;

use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use sfp_errors::PipelineError;
use sfp_types::order::Order;
use sfp_types::position::Position;

use crate::compression::compress_if_over_threshold;
use crate::dirty::DirtyTracker;
use crate::interval::AdaptiveInterval;
use crate::position_source::PositionSource;
use crate::redis_source::OrderSource;
use crate::schema::{OrderRow, PositionRow};
use crate::stall::StallTracker;
use crate::transition_source::TransitionSource;
use crate::upsert::{bulk_insert_transitions, bulk_upsert_orders, bulk_upsert_positions};

pub struct FlushStats {
    pub rows_written: u64,
    pub compressed_count: usize,
}

#[allow(clippy::too_many_arguments)]
pub struct DbSyncWorker {
    pool: PgPool,
    source: Arc<dyn OrderSource>,
    transitions: Arc<dyn TransitionSource>,
    positions: Arc<dyn PositionSource>,
    dirty: DirtyTracker<Uuid>,
    position_dirty: DirtyTracker<(String, String)>,
    interval: AdaptiveInterval,
    stall: StallTracker,
    batch_size: usize,
    compress_threshold: usize,
}

impl DbSyncWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pool: PgPool,
        source: Arc<dyn OrderSource>,
        transitions: Arc<dyn TransitionSource>,
        positions: Arc<dyn PositionSource>,
        batch_size: usize,
        interval_min_ms: i64,
        interval_max_ms: i64,
        high_water: usize,
        low_water: usize,
        max_sql_retries: u32,
        compress_threshold: usize,
    ) -> Self {
        Self {
            pool,
            source,
            transitions,
            positions,
            dirty: DirtyTracker::new(),
            position_dirty: DirtyTracker::new(),
            interval: AdaptiveInterval::new(interval_min_ms, interval_max_ms, high_water, low_water),
            stall: StallTracker::new(max_sql_retries),
            batch_size,
            compress_threshold,
        }
    }

    pub fn mark_dirty(&self, order_id: Uuid) {
        self.dirty.mark(order_id);
    }

    pub fn mark_position_dirty(&self, key: (String, String)) {
        self.position_dirty.mark(key);
    }

    pub fn current_interval_ms(&self) -> i64 {
        self.interval.current_ms()
    }

    pub fn is_stalled(&self) -> bool {
        self.stall.is_stalled()
    }

    pub fn last_applied_position(&self) -> i64 {
        self.stall.last_applied_position()
    }

    /// Run one flush cycle. While stalled, the dirty batch is re-marked
    /// rather than written, so nothing is lost before the catch-up
    /// replay resumes.
    pub async fn flush_once(&mut self) -> Result<FlushStats, PipelineError> {
        let batch = self.dirty.drain_batch(self.batch_size);
        self.interval.observe(self.dirty.pending_count());

        let position_batch = self.position_dirty.drain_batch(self.batch_size);

        if batch.is_empty() && position_batch.is_empty() {
            return Ok(FlushStats { rows_written: 0, compressed_count: 0 });
        }

        if self.stall.is_stalled() {
            for id in batch {
                self.dirty.mark(id);
            }
            for key in position_batch {
                self.position_dirty.mark(key);
            }
            return Err(PipelineError::DbSyncStalled);
        }

        match self.flush_batches(&batch, &position_batch).await {
            Ok(stats) => {
                self.stall.record_success(stats.rows_written as i64);
                info!(
                    rows_written = stats.rows_written,
                    compressed = stats.compressed_count,
                    "dsw flush"
                );
                Ok(stats)
            }
            Err(e) => {
                warn!(error = %e, "dsw flush failed");
                for id in &batch {
                    self.dirty.mark(*id);
                }
                for key in &position_batch {
                    self.position_dirty.mark(key.clone());
                }
                self.stall.record_failure()?;
                Err(PipelineError::Transient(e.to_string()))
            }
        }
    }

    async fn flush_batches(
        &self,
        order_ids: &[Uuid],
        position_keys: &[(String, String)],
    ) -> anyhow::Result<FlushStats> {
        let mut rows_written = 0u64;
        let mut compressed_count = 0usize;

        if !order_ids.is_empty() {
            let fetched = self.source.fetch_many(order_ids).await?;
            let mut rows = Vec::with_capacity(fetched.len());
            for order in fetched.into_iter().flatten() {
                let (metadata_json, compressed) = self.encode_metadata(&order)?;
                if compressed {
                    compressed_count += 1;
                }
                rows.push(to_order_row(&order, metadata_json));
            }
            rows_written += bulk_upsert_orders(&self.pool, &rows).await?;

            // Per-order log order is preserved within each order's own
            // sub-sequence; orders within the batch are independent.
            let transition_rows = self.transitions.fetch_new(order_ids).await?;
            rows_written += bulk_insert_transitions(&self.pool, &transition_rows).await?;
        }

        if !position_keys.is_empty() {
            let fetched = self.positions.fetch_many(position_keys).await?;
            let rows: Vec<PositionRow> = fetched.into_iter().flatten().map(to_position_row).collect();
            rows_written += bulk_upsert_positions(&self.pool, &rows).await?;
        }

        Ok(FlushStats { rows_written, compressed_count })
    }

    fn encode_metadata(&self, order: &Order) -> Result<(Vec<u8>, bool), PipelineError> {
        let json = serde_json::to_vec(&order.metadata)
            .map_err(|e| PipelineError::Validation(format!("metadata encode failed: {e}")))?;
        compress_if_over_threshold(&json, self.compress_threshold)
            .map_err(|e| PipelineError::Validation(format!("metadata compress failed: {e}")))
    }
}

fn to_order_row(order: &Order, metadata_json: Vec<u8>) -> OrderRow {
    OrderRow {
        id: order.id,
        user_id: order.user_id.clone(),
        strategy_id: order.strategy_id.clone(),
        symbol: order.symbol.clone(),
        side: order.side.to_string(),
        order_type: format!("{:?}", order.order_type).to_uppercase(),
        product_type: format!("{:?}", order.product_type).to_uppercase(),
        qty: order.requested_qty,
        price: order.requested_price_micros,
        filled_qty: order.filled_qty,
        filled_price: order.avg_filled_price_micros,
        status: order.state.to_string(),
        broker_order_id: order.broker_order_id.clone(),
        error: order.error.clone(),
        retry_count: order.retry_count as i32,
        created_at: order.created_at_millis,
        updated_at: order.updated_at_millis,
        metadata_json,
    }
}

fn to_position_row(position: Position) -> PositionRow {
    PositionRow {
        user_id: position.user_id,
        symbol: position.symbol,
        qty: position.qty_signed,
        avg_price: position.avg_price_micros,
        realized_pnl: position.realized_pnl_micros,
        unrealized_pnl: position.unrealized_pnl_micros,
        status: format!("{:?}", position.status).to_uppercase(),
        opened_at: position.opened_at_millis,
        closed_at: position.closed_at_millis,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mark_dirty_tracks_pending_count() {
        // DbSyncWorker::new requires a live pool; exercise DirtyTracker
        // directly through the same path mark_dirty delegates to.
        let dirty: DirtyTracker<Uuid> = DirtyTracker::new();
        let id = Uuid::new_v4();
        dirty.mark(id);
        assert_eq!(dirty.pending_count(), 1);
    }

    #[test]
    fn mark_position_dirty_tracks_independently() {
        let dirty: DirtyTracker<(String, String)> = DirtyTracker::new();
        dirty.mark(("u1".to_string(), "RELIANCE".to_string()));
        assert_eq!(dirty.pending_count(), 1);
    }
}
