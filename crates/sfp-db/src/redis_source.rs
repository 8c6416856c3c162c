//! Pipelined Redis reads for the flush cycle: one round trip fetches
//! every dirty order's hot record (`order:{id}`, serialized JSON)
//! instead of one GET per order.

use async_trait::async_trait;
use uuid::Uuid;

use sfp_errors::PipelineError;
use sfp_hotstore::RedisPool;
use sfp_types::order::Order;

#[async_trait]
pub trait OrderSource: Send + Sync {
    async fn fetch_many(&self, ids: &[Uuid]) -> Result<Vec<Option<Order>>, PipelineError>;
}

pub struct RedisOrderSource {
    pool: RedisPool,
}

impl RedisOrderSource {
    pub fn new(pool: RedisPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderSource for RedisOrderSource {
    async fn fetch_many(&self, ids: &[Uuid]) -> Result<Vec<Option<Order>>, PipelineError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| PipelineError::Transient(format!("redis pool checkout failed: {e}")))?;

        let mut pipe = redis::pipe();
        for id in ids {
            pipe.get(format!("order:{id}"));
        }

        let raw: Vec<Option<String>> = pipe
            .query_async(&mut *conn)
            .await
            .map_err(|e| PipelineError::Transient(format!("pipelined order read failed: {e}")))?;

        Ok(raw.into_iter().map(|opt| opt.and_then(|s| serde_json::from_str(&s).ok())).collect())
    }
}
