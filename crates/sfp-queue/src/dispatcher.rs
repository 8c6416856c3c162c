//! The Priority Queue Dispatcher: enqueue/claim/ack/nack against the three
//! priority streams, backed by a Redis consumer group per worker pool.

use std::collections::BTreeMap;

use uuid::Uuid;

use sfp_errors::PipelineError;
use sfp_hotstore::RedisPool;
use sfp_types::queue::{Priority, QueueItem};

pub const CONSUMER_GROUP: &str = "workers";
const MAX_ATTEMPTS: u32 = 5;
const CLAIM_BLOCK_MS: usize = 2_000;

pub struct Dispatcher {
    pool: RedisPool,
    max_queue_size: u32,
}

impl Dispatcher {
    pub fn new(pool: RedisPool, max_queue_size: u32) -> Self {
        Self { pool, max_queue_size }
    }

    /// Ensure the consumer group exists on all three priority streams.
    /// Call once at startup.
    pub async fn init(&self) -> Result<(), PipelineError> {
        for p in Priority::all() {
            sfp_hotstore::streams::ensure_group(&self.pool, p.stream_key(), CONSUMER_GROUP).await?;
        }
        Ok(())
    }

    /// Write `order_id` onto its priority stream. Fails with `QueueFull`
    /// once the combined pending count across all three streams exceeds
    /// `max_queue_size`.
    pub async fn enqueue(
        &self,
        order_id: Uuid,
        priority: Priority,
        enqueued_at_millis: i64,
    ) -> Result<(), PipelineError> {
        if self.total_pending().await? >= self.max_queue_size as u64 {
            return Err(PipelineError::QueueFull);
        }

        let item = QueueItem::new(order_id, priority, enqueued_at_millis);
        let mut fields = BTreeMap::new();
        fields.insert("order_id".to_string(), item.order_id.to_string());
        fields.insert("enqueued_at_millis".to_string(), item.enqueued_at_millis.to_string());
        fields.insert("attempts".to_string(), item.attempts.to_string());

        sfp_hotstore::streams::enqueue(&self.pool, priority.stream_key(), &fields).await?;
        Ok(())
    }

    async fn total_pending(&self) -> Result<u64, PipelineError> {
        // Approximated via XLEN on each stream; exact pending-per-consumer-group
        // counts are a later refinement once worker churn is observed in practice.
        let mut total = 0u64;
        for p in Priority::all() {
            let mut conn = self
                .pool
                .get()
                .await
                .map_err(|e| PipelineError::Transient(format!("redis pool checkout failed: {e}")))?;
            let len: u64 = redis::cmd("XLEN")
                .arg(p.stream_key())
                .query_async(&mut *conn)
                .await
                .map_err(|e| PipelineError::Transient(format!("XLEN failed: {e}")))?;
            total += len;
        }
        Ok(total)
    }

    /// Claim one entry for `worker_id`, trying streams in the order given
    /// by the caller's fairness decision.
    pub async fn claim(
        &self,
        worker_id: &str,
        priority: Priority,
    ) -> Result<Option<(String, ClaimedItem)>, PipelineError> {
        let entries = sfp_hotstore::streams::claim_new(
            &self.pool,
            priority.stream_key(),
            CONSUMER_GROUP,
            worker_id,
            1,
            CLAIM_BLOCK_MS,
        )
        .await?;

        Ok(entries.into_iter().next().map(|(id, fields)| (id, ClaimedItem::from_fields(priority, fields))))
    }

    pub async fn ack(&self, priority: Priority, entry_id: &str) -> Result<(), PipelineError> {
        sfp_hotstore::streams::ack(&self.pool, priority.stream_key(), CONSUMER_GROUP, &[entry_id.to_string()]).await
    }

    /// `requeue=true` re-delivers via the consumer group with an
    /// incremented attempt counter (a fresh XADD carrying the bumped
    /// count, then ack of the stale entry — Streams have no in-place
    /// field mutation). `requeue=false`, or attempts exhausted, moves the
    /// item to the DLQ stream instead.
    pub async fn nack(
        &self,
        priority: Priority,
        entry_id: &str,
        item: ClaimedItem,
        requeue: bool,
        last_error: &str,
        now_millis: i64,
    ) -> Result<(), PipelineError> {
        sfp_hotstore::streams::ack(&self.pool, priority.stream_key(), CONSUMER_GROUP, &[entry_id.to_string()]).await?;

        if requeue && item.attempts + 1 < MAX_ATTEMPTS {
            let mut fields = BTreeMap::new();
            fields.insert("order_id".to_string(), item.order_id.to_string());
            fields.insert("enqueued_at_millis".to_string(), item.enqueued_at_millis.to_string());
            fields.insert("attempts".to_string(), (item.attempts + 1).to_string());
            sfp_hotstore::streams::enqueue(&self.pool, priority.stream_key(), &fields).await?;
        } else {
            self.to_dlq(&item, last_error, now_millis).await?;
        }
        Ok(())
    }

    async fn to_dlq(&self, item: &ClaimedItem, last_error: &str, failed_at_millis: i64) -> Result<(), PipelineError> {
        let mut fields = BTreeMap::new();
        fields.insert("order_id".to_string(), item.order_id.to_string());
        fields.insert("priority".to_string(), format!("{:?}", item.priority));
        fields.insert("attempts".to_string(), item.attempts.to_string());
        fields.insert("last_error".to_string(), last_error.to_string());
        fields.insert("failed_at".to_string(), failed_at_millis.to_string());
        sfp_hotstore::streams::enqueue(&self.pool, "queue:dlq", &fields).await?;
        Ok(())
    }

    /// Reclaim entries idle past `stale_threshold_ms` across all priority
    /// streams, run periodically (default every 5 minutes per the stated
    /// rebalancing cadence).
    pub async fn rebalance(&self, worker_id: &str, stale_threshold_ms: i64) -> Result<u32, PipelineError> {
        let mut reclaimed = 0u32;
        for p in Priority::all() {
            let entries = sfp_hotstore::streams::reclaim_stale(
                &self.pool,
                p.stream_key(),
                CONSUMER_GROUP,
                worker_id,
                stale_threshold_ms,
                100,
            )
            .await?;
            reclaimed += entries.len() as u32;
        }
        Ok(reclaimed)
    }
}

#[derive(Debug, Clone)]
pub struct ClaimedItem {
    pub order_id: Uuid,
    pub priority: Priority,
    pub enqueued_at_millis: i64,
    pub attempts: u32,
}

impl ClaimedItem {
    fn from_fields(priority: Priority, fields: BTreeMap<String, String>) -> Self {
        Self {
            order_id: fields
                .get("order_id")
                .and_then(|s| Uuid::parse_str(s).ok())
                .unwrap_or_default(),
            priority,
            enqueued_at_millis: fields
                .get("enqueued_at_millis")
                .and_then(|s| s.parse().ok())
                .unwrap_or(0),
            attempts: fields.get("attempts").and_then(|s| s.parse().ok()).unwrap_or(0),
        }
    }
}
