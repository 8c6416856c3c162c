//! The `create` duplicate/rate-limit guard: a signature-based collapse
//! window plus a per-user minimum order interval, both backed by Redis
//! sorted sets so the guard survives a process restart.

use sfp_hotstore::RedisPool;
use sfp_types::signal::Signal;

use sfp_errors::PipelineError;

const SIGNATURE_DEDUP_PREFIX: &str = "dedup:sig:";
const USER_LAST_ORDER_PREFIX: &str = "dedup:user:";

/// Reject `create` if the signal's signature has already been seen within
/// `window_ms`, or if the same user created any order within
/// `min_interval_ms`.
pub async fn check_and_record(
    pool: &RedisPool,
    signal: &Signal,
    window_ms: i64,
    min_interval_ms: i64,
    now_millis: i64,
) -> Result<(), PipelineError> {
    let sig_key = format!("{SIGNATURE_DEDUP_PREFIX}{}", signal.user_id);
    let signature = signal.order_signature(window_ms);

    let first = sfp_hotstore::dedup::record_if_absent(pool, &sig_key, &signature, now_millis as f64).await?;
    if !first {
        return Err(PipelineError::Duplicate {
            existing_order_id: None,
        });
    }

    let user_key = format!("{USER_LAST_ORDER_PREFIX}{}", signal.user_id);
    let allowed = sfp_hotstore::dedup::mark_if_unset(pool, &user_key, min_interval_ms).await?;
    if !allowed {
        return Err(PipelineError::RateLimited {
            retry_after_ms: min_interval_ms,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    // The guard's Redis-dependent paths are covered by the crate's
    // integration tests against a fake pool; this module's pure helper
    // (signature derivation) is exercised in `sfp_types::signal`.
}
