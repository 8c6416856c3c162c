//! Process bootstrap: builds every subsystem in dependency order
//! (config -> Redis pool -> SQL pool -> OM -> QD -> BA -> MME -> DSW) and
//! hands back the `AppState` the HTTP layer and background tasks share.
//!
//! `shutdown` tears subsystems down in the reverse order, draining the
//! dispatcher's consumer groups isn't needed (streams persist in Redis);
//! the only thing that needs an orderly stop is the Postgres pool.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::{broadcast, Mutex, RwLock};

use sfp_broker::{BrokerAdapter, MockBroker, SessionRegistry};
use sfp_config::{load_layered_yaml, Config};
use sfp_db::{BookPositionSource, DbSyncWorker, RedisOrderSource, RedisTransitionSource};
use sfp_mme::MatchingEngine;
use sfp_om::OrderManager;
use sfp_portfolio::PositionBook;
use sfp_queue::{Dispatcher, WorkerStatsRegistry};

use crate::state::{uptime_secs, AppState, BuildInfo, StatusSnapshot};

/// Batch-queue depth thresholds feeding the adaptive flush interval.
/// Not part of the enumerated §6 config surface; chosen as a fixed
/// multiple of `dsw.batch_size` so one full batch of slack exists on
/// either side before the interval adjusts.
const DSW_HIGH_WATER_MULTIPLIER: usize = 4;
const DSW_LOW_WATER_DIVISOR: usize = 2;
const DSW_MAX_SQL_RETRIES: u32 = 5;

pub async fn bootstrap(config_paths: &[&str]) -> Result<Arc<AppState>> {
    let loaded = load_layered_yaml(config_paths).context("loading configuration")?;
    let config = Config::from_loaded(&loaded).context("validating configuration")?;

    let redis_pool = sfp_hotstore::build_pool(&config.redis.url)
        .await
        .context("building redis pool")?;

    let pg_pool = sfp_db::connect(&config.db.url, config.db.max_connections)
        .await
        .context("connecting to postgres")?;
    sfp_db::migrate(&pg_pool).await.context("running db migrations")?;

    let om = Arc::new(OrderManager::new(
        redis_pool.clone(),
        config.order.min_interval_ms,
        config.order.lock_timeout_ms,
    ));

    let queue = Arc::new(Dispatcher::new(redis_pool.clone(), config.queue.max_size));
    queue.init().await.context("initializing priority streams")?;
    let worker_stats = Arc::new(WorkerStatsRegistry::new());

    let sessions = Arc::new(SessionRegistry::new());
    // No live broker binding is configured here; the mock fulfills the
    // same `BrokerAdapter` trait any concrete wire binding would.
    let broker: Arc<dyn BrokerAdapter> = Arc::new(MockBroker::new());

    let mme = Arc::new(MatchingEngine::new(config.paper.buffer_size));
    let portfolio = Arc::new(RwLock::new(PositionBook::new()));

    let order_source = Arc::new(RedisOrderSource::new(redis_pool.clone()));
    let transition_source = Arc::new(RedisTransitionSource::new(redis_pool.clone()));
    let position_source = Arc::new(BookPositionSource::new(portfolio.clone()));
    let batch_size = config.dsw.batch_size as usize;
    let dsw = Arc::new(Mutex::new(DbSyncWorker::new(
        pg_pool,
        order_source,
        transition_source,
        position_source,
        batch_size,
        config.dsw.interval_min_ms,
        config.dsw.interval_max_ms,
        batch_size * DSW_HIGH_WATER_MULTIPLIER,
        (batch_size / DSW_LOW_WATER_DIVISOR).max(1),
        DSW_MAX_SQL_RETRIES,
        config.dsw.compress_threshold_bytes as usize,
    )));

    let (bus, _rx) = broadcast::channel(1024);
    let config_hash = loaded.config_hash.clone();

    let status = StatusSnapshot {
        daemon_uptime_secs: uptime_secs(),
        config_hash: config_hash.clone(),
        dsw_stalled: false,
        dsw_last_applied_position: 0,
        dsw_interval_ms: config.dsw.interval_min_ms,
        notes: Some("daemon booted".to_string()),
    };

    Ok(Arc::new(AppState {
        bus,
        build: BuildInfo {
            service: "sfp-daemon",
            version: env!("CARGO_PKG_VERSION"),
        },
        config,
        config_hash,
        status: Arc::new(RwLock::new(status)),
        redis_pool,
        om,
        queue,
        worker_stats,
        sessions,
        broker,
        mme,
        portfolio,
        dsw,
    }))
}
