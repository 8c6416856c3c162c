//! TTL-bound distributed locks: `SET key value NX PX ttl` to acquire,
//! a compare-and-delete Lua script to release so a lock never frees a
//! token it doesn't own (a slow holder past its TTL must not release the
//! next holder's lock).

use anyhow::Result;
use redis::AsyncCommands;
use uuid::Uuid;

use crate::pool::RedisPool;
use sfp_errors::{PipelineError, TimeoutScope};

const RELEASE_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

/// A held lock. Dropping it does NOT release the Redis key — callers must
/// `release` explicitly (async Drop doesn't exist), typically in a
/// try/finally-shaped block around the critical section.
pub struct LockGuard {
    pub key: String,
    pub token: String,
}

/// Acquire `key` for `ttl_ms`, retrying up to `max_attempts` times with a
/// short randomized backoff between attempts. Returns `LockTimeout` if the
/// lock is still held after exhausting attempts.
pub async fn acquire(
    pool: &RedisPool,
    key: &str,
    ttl_ms: i64,
    max_attempts: u32,
    scope: TimeoutScope,
) -> Result<LockGuard, PipelineError> {
    let mut conn = pool
        .get()
        .await
        .map_err(|e| PipelineError::Transient(format!("redis pool checkout failed: {e}")))?;

    let token = Uuid::new_v4().to_string();

    let opts = redis::SetOptions::default()
        .conditional_set(redis::ExistenceCheck::NX)
        .with_expiration(redis::SetExpiry::PX(ttl_ms.max(1) as usize));

    for attempt in 0..max_attempts {
        let acquired: Option<String> = conn
            .set_options(key, &token, opts)
            .await
            .map_err(|e| PipelineError::Transient(format!("redis SET NX PX failed: {e}")))?;

        if acquired.is_some() {
            return Ok(LockGuard {
                key: key.to_string(),
                token,
            });
        }

        if attempt + 1 < max_attempts {
            let jitter_ms = 10 + (rand::random::<u64>() % 40);
            tokio::time::sleep(std::time::Duration::from_millis(jitter_ms)).await;
        }
    }

    Err(PipelineError::LockTimeout { scope })
}

/// Release a lock previously returned by `acquire`, but only if the stored
/// token still matches — an expired-then-reacquired lock is never released
/// out from under its new holder.
pub async fn release(pool: &RedisPool, guard: &LockGuard) -> Result<bool, PipelineError> {
    let mut conn = pool
        .get()
        .await
        .map_err(|e| PipelineError::Transient(format!("redis pool checkout failed: {e}")))?;

    let script = redis::Script::new(RELEASE_SCRIPT);
    let released: i32 = script
        .key(&guard.key)
        .arg(&guard.token)
        .invoke_async(&mut *conn)
        .await
        .map_err(|e| PipelineError::Transient(format!("redis lock release script failed: {e}")))?;

    Ok(released == 1)
}

/// Acquire locks in the fixed global order `order -> user -> symbol` to
/// avoid deadlock between concurrent holders contending on overlapping
/// subsets of the three.
pub async fn acquire_ordered(
    pool: &RedisPool,
    order_key: Option<&str>,
    user_key: Option<&str>,
    symbol_key: Option<&str>,
    ttl_ms: i64,
    max_attempts: u32,
) -> Result<Vec<LockGuard>, PipelineError> {
    let mut held = Vec::new();
    for key in [order_key, user_key, symbol_key].into_iter().flatten() {
        match acquire(pool, key, ttl_ms, max_attempts, TimeoutScope::LockAcquisition).await {
            Ok(guard) => held.push(guard),
            Err(e) => {
                for g in held.iter().rev() {
                    let _ = release(pool, g).await;
                }
                return Err(e);
            }
        }
    }
    Ok(held)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_script_is_well_formed_lua() {
        // Cheap sanity check that the script body only references KEYS[1]/ARGV[1]
        // and not a reserved Lua keyword misuse; a real assertion requires a server.
        assert!(RELEASE_SCRIPT.contains("KEYS[1]"));
        assert!(RELEASE_SCRIPT.contains("ARGV[1]"));
    }
}
