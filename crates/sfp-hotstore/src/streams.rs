//! Redis Stream primitives for the priority queue: one stream per priority
//! tier, a shared consumer group per worker pool, and the claim/ack/stale
//! reclaim cycle.

use std::collections::BTreeMap;

use anyhow::Result;
use redis::streams::{StreamClaimReply, StreamReadOptions, StreamReadReply};
use redis::{AsyncCommands, RedisResult};

use crate::pool::RedisPool;
use sfp_errors::PipelineError;

/// Ensure a consumer group exists on `stream_key`, creating the stream with
/// `MKSTREAM` if it doesn't exist yet. Idempotent: `BUSYGROUP` from a prior
/// creation is swallowed.
pub async fn ensure_group(pool: &RedisPool, stream_key: &str, group: &str) -> Result<(), PipelineError> {
    let mut conn = pool
        .get()
        .await
        .map_err(|e| PipelineError::Transient(format!("redis pool checkout failed: {e}")))?;

    let result: RedisResult<()> = redis::cmd("XGROUP")
        .arg("CREATE")
        .arg(stream_key)
        .arg(group)
        .arg("0")
        .arg("MKSTREAM")
        .query_async(&mut *conn)
        .await;

    match result {
        Ok(()) => Ok(()),
        Err(e) if e.to_string().contains("BUSYGROUP") => Ok(()),
        Err(e) => Err(PipelineError::Transient(format!("XGROUP CREATE failed: {e}"))),
    }
}

/// Append one item's fields to the stream, returning the assigned entry id.
pub async fn enqueue(
    pool: &RedisPool,
    stream_key: &str,
    fields: &BTreeMap<String, String>,
) -> Result<String, PipelineError> {
    let mut conn = pool
        .get()
        .await
        .map_err(|e| PipelineError::Transient(format!("redis pool checkout failed: {e}")))?;

    let mut cmd = redis::cmd("XADD");
    cmd.arg(stream_key).arg("*");
    for (k, v) in fields {
        cmd.arg(k).arg(v);
    }

    let id: String = cmd
        .query_async(&mut *conn)
        .await
        .map_err(|e| PipelineError::Transient(format!("XADD failed: {e}")))?;
    Ok(id)
}

/// Append one item's fields to a stream capped to approximately
/// `maxlen` entries (`MAXLEN ~ N`, no consumer group involved). Used by
/// tick intake, where the stream is a bounded recovery log rather than a
/// work queue.
pub async fn push_bounded(
    pool: &RedisPool,
    stream_key: &str,
    maxlen: usize,
    fields: &BTreeMap<String, String>,
) -> Result<String, PipelineError> {
    let mut conn = pool
        .get()
        .await
        .map_err(|e| PipelineError::Transient(format!("redis pool checkout failed: {e}")))?;

    let mut cmd = redis::cmd("XADD");
    cmd.arg(stream_key).arg("MAXLEN").arg("~").arg(maxlen).arg("*");
    for (k, v) in fields {
        cmd.arg(k).arg(v);
    }

    let id: String = cmd
        .query_async(&mut *conn)
        .await
        .map_err(|e| PipelineError::Transient(format!("XADD MAXLEN failed: {e}")))?;
    Ok(id)
}

/// Read up to `count` entries strictly after `after_id` (exclusive), or from
/// the start of the stream when `after_id` is `None`. No consumer group
/// involved: for a single in-process reader replaying its own cursor, not a
/// work queue shared across workers.
pub async fn read_after(
    pool: &RedisPool,
    stream_key: &str,
    after_id: Option<&str>,
    count: usize,
) -> Result<Vec<(String, BTreeMap<String, String>)>, PipelineError> {
    let mut conn = pool
        .get()
        .await
        .map_err(|e| PipelineError::Transient(format!("redis pool checkout failed: {e}")))?;

    let start = match after_id {
        Some(id) => format!("({id}"),
        None => "-".to_string(),
    };

    let reply: Vec<(String, Vec<(String, String)>)> = redis::cmd("XRANGE")
        .arg(stream_key)
        .arg(start)
        .arg("+")
        .arg("COUNT")
        .arg(count)
        .query_async(&mut *conn)
        .await
        .map_err(|e| PipelineError::Transient(format!("XRANGE failed: {e}")))?;

    Ok(reply.into_iter().map(|(id, kvs)| (id, kvs.into_iter().collect())).collect())
}

/// Read up to `count` unclaimed entries for `consumer` in `group`, blocking
/// up to `block_ms` if the stream is empty.
pub async fn claim_new(
    pool: &RedisPool,
    stream_key: &str,
    group: &str,
    consumer: &str,
    count: usize,
    block_ms: usize,
) -> Result<Vec<(String, BTreeMap<String, String>)>, PipelineError> {
    let mut conn = pool
        .get()
        .await
        .map_err(|e| PipelineError::Transient(format!("redis pool checkout failed: {e}")))?;

    let opts = StreamReadOptions::default()
        .group(group, consumer)
        .count(count)
        .block(block_ms);

    let reply: StreamReadReply = conn
        .xread_options(&[stream_key], &[">"], &opts)
        .await
        .map_err(|e| PipelineError::Transient(format!("XREADGROUP failed: {e}")))?;

    Ok(flatten_reply(reply))
}

/// Acknowledge successfully-processed entries, removing them from the
/// group's pending-entries list.
pub async fn ack(pool: &RedisPool, stream_key: &str, group: &str, ids: &[String]) -> Result<(), PipelineError> {
    if ids.is_empty() {
        return Ok(());
    }
    let mut conn = pool
        .get()
        .await
        .map_err(|e| PipelineError::Transient(format!("redis pool checkout failed: {e}")))?;

    let _: i32 = conn
        .xack(stream_key, group, ids)
        .await
        .map_err(|e| PipelineError::Transient(format!("XACK failed: {e}")))?;
    Ok(())
}

/// Reclaim entries that have sat pending for longer than `min_idle_ms`
/// (the owning consumer is presumed dead), transferring ownership to
/// `consumer`.
pub async fn reclaim_stale(
    pool: &RedisPool,
    stream_key: &str,
    group: &str,
    consumer: &str,
    min_idle_ms: i64,
    count: usize,
) -> Result<Vec<(String, BTreeMap<String, String>)>, PipelineError> {
    let mut conn = pool
        .get()
        .await
        .map_err(|e| PipelineError::Transient(format!("redis pool checkout failed: {e}")))?;

    let pending: Vec<(String, String, i64, i64)> = redis::cmd("XPENDING")
        .arg(stream_key)
        .arg(group)
        .arg("IDLE")
        .arg(min_idle_ms)
        .arg("-")
        .arg("+")
        .arg(count)
        .query_async(&mut *conn)
        .await
        .map_err(|e| PipelineError::Transient(format!("XPENDING failed: {e}")))?;

    if pending.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<String> = pending.into_iter().map(|(id, ..)| id).collect();

    let reply: StreamClaimReply = redis::cmd("XCLAIM")
        .arg(stream_key)
        .arg(group)
        .arg(consumer)
        .arg(min_idle_ms)
        .arg(&ids)
        .query_async::<_, StreamClaimReply>(&mut *conn)
        .await
        .map_err(|e| PipelineError::Transient(format!("XCLAIM failed: {e}")))?;

    Ok(reply
        .ids
        .into_iter()
        .map(|entry| {
            let fields: BTreeMap<String, String> = entry
                .map
                .into_iter()
                .filter_map(|(k, v)| redis::from_redis_value::<String>(&v).ok().map(|s| (k, s)))
                .collect();
            (entry.id, fields)
        })
        .collect())
}

fn flatten_reply(reply: StreamReadReply) -> Vec<(String, BTreeMap<String, String>)> {
    let mut out = Vec::new();
    for stream_key in reply.keys {
        for entry in stream_key.ids {
            let fields: BTreeMap<String, String> = entry
                .map
                .into_iter()
                .filter_map(|(k, v)| redis::from_redis_value::<String>(&v).ok().map(|s| (k, s)))
                .collect();
            out.push((entry.id, fields));
        }
    }
    out
}
