//! Reads new transition-log entries off each order's `order:tx:{id}`
//! Redis stream since the last flush, tracking a per-order cursor so the
//! same entry is never inserted into `order_transitions` twice.

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use sfp_errors::PipelineError;
use sfp_hotstore::RedisPool;

use crate::schema::TransitionRow;

const READ_COUNT_PER_ORDER: usize = 64;

#[async_trait]
pub trait TransitionSource: Send + Sync {
    /// Fetch every transition appended since the last call, for each of
    /// `order_ids`, in stream (append) order.
    async fn fetch_new(&self, order_ids: &[Uuid]) -> Result<Vec<TransitionRow>, PipelineError>;
}

pub struct RedisTransitionSource {
    pool: RedisPool,
    cursors: DashMap<Uuid, String>,
}

impl RedisTransitionSource {
    pub fn new(pool: RedisPool) -> Self {
        Self { pool, cursors: DashMap::new() }
    }
}

#[async_trait]
impl TransitionSource for RedisTransitionSource {
    async fn fetch_new(&self, order_ids: &[Uuid]) -> Result<Vec<TransitionRow>, PipelineError> {
        let mut rows = Vec::new();

        for &order_id in order_ids {
            let stream_key = format!("order:tx:{order_id}");
            let after = self.cursors.get(&order_id).map(|c| c.clone());

            let entries =
                sfp_hotstore::streams::read_after(&self.pool, &stream_key, after.as_deref(), READ_COUNT_PER_ORDER)
                    .await?;

            if let Some((last_id, _)) = entries.last() {
                self.cursors.insert(order_id, last_id.clone());
            }

            for (_, fields) in entries {
                let from_state = fields.get("from").cloned().unwrap_or_default();
                let to_state = fields.get("to").cloned().unwrap_or_default();
                let actor = fields.get("actor").cloned().unwrap_or_default();
                let reason = fields.get("reason").filter(|r| !r.is_empty()).cloned();
                let ts = fields.get("ts_millis").and_then(|s| s.parse().ok()).unwrap_or(0);
                rows.push(TransitionRow { order_id, from_state, to_state, reason, actor, ts });
            }
        }

        Ok(rows)
    }
}
