//! Connection pooling over a single Redis instance.

use std::time::Duration;

use anyhow::{Context, Result};
use bb8_redis::RedisConnectionManager;

pub type RedisPool = bb8::Pool<RedisConnectionManager>;
pub type RedisConn<'a> = bb8::PooledConnection<'a, RedisConnectionManager>;

/// Build a pool against `redis_url`. Connections idle past 60s are recycled;
/// a checkout waits at most 30s before failing, matching the broker/SQL
/// timeout budgets elsewhere in the pipeline.
pub async fn build_pool(redis_url: &str) -> Result<RedisPool> {
    let manager = RedisConnectionManager::new(redis_url).context("invalid redis url")?;
    bb8::Pool::builder()
        .connection_timeout(Duration::from_secs(30))
        .idle_timeout(Some(Duration::from_secs(60)))
        .max_size(32)
        .build(manager)
        .await
        .context("failed to build redis pool")
}
