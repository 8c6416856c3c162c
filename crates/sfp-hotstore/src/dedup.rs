//! Atomic dedup guards backed by Redis sorted sets: `ZADD key NX score
//! member` both records the first sighting and tells the caller whether it
//! was first, in one round trip.

use anyhow::Result;
use redis::AsyncCommands;

use crate::pool::RedisPool;
use sfp_errors::PipelineError;

/// Record `member` under `key` if absent. Returns `true` if this call was
/// the first to see it (the caller should proceed), `false` if it was
/// already present (the caller should treat this as a duplicate).
pub async fn record_if_absent(
    pool: &RedisPool,
    key: &str,
    member: &str,
    score: f64,
) -> Result<bool, PipelineError> {
    let mut conn = pool
        .get()
        .await
        .map_err(|e| PipelineError::Transient(format!("redis pool checkout failed: {e}")))?;

    let added: i32 = conn
        .zadd_nx(key, member, score)
        .await
        .map_err(|e| PipelineError::Transient(format!("redis ZADD NX failed: {e}")))?;

    Ok(added == 1)
}

/// Drop dedup entries older than `cutoff_score` (typically a timestamp) so
/// the set doesn't grow unbounded across a long-running process.
pub async fn trim_older_than(pool: &RedisPool, key: &str, cutoff_score: f64) -> Result<(), PipelineError> {
    let mut conn = pool
        .get()
        .await
        .map_err(|e| PipelineError::Transient(format!("redis pool checkout failed: {e}")))?;

    let _: i32 = conn
        .zrembyscore(key, f64::MIN, cutoff_score)
        .await
        .map_err(|e| PipelineError::Transient(format!("redis ZREMRANGEBYSCORE failed: {e}")))?;

    Ok(())
}

/// Mark `key` for `ttl_ms` if not already marked. Returns `true` if this
/// call placed the marker (the caller may proceed), `false` if a marker
/// from a still-live window already exists — a plain `SET NX PX` rate
/// limiter, distinct from the sorted-set dedup above because callers don't
/// need to remember individual members, only "has this fired recently".
pub async fn mark_if_unset(pool: &RedisPool, key: &str, ttl_ms: i64) -> Result<bool, PipelineError> {
    let mut conn = pool
        .get()
        .await
        .map_err(|e| PipelineError::Transient(format!("redis pool checkout failed: {e}")))?;

    let opts = redis::SetOptions::default()
        .conditional_set(redis::ExistenceCheck::NX)
        .with_expiration(redis::SetExpiry::PX(ttl_ms.max(1) as usize));

    let result: Option<String> = conn
        .set_options(key, "1", opts)
        .await
        .map_err(|e| PipelineError::Transient(format!("redis SET NX PX failed: {e}")))?;

    Ok(result.is_some())
}
