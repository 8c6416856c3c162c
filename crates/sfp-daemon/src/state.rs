//! Shared runtime state for sfp-daemon.
//!
//! All types here are `Clone`-able (via `Arc`) or copy. Handlers receive
//! `State<Arc<AppState>>` from Axum; this module owns nothing async itself
//! beyond the heartbeat task spawned by `spawn_heartbeat`.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, Mutex, RwLock};
use uuid::Uuid;

use sfp_broker::{BrokerAdapter, SessionRegistry};
use sfp_config::Config;
use sfp_db::DbSyncWorker;
use sfp_mme::MatchingEngine;
use sfp_om::OrderManager;
use sfp_portfolio::PositionBook;
use sfp_queue::{Dispatcher, WorkerStatsRegistry};
use sfp_types::events::OrderStateChanged;

/// Messages broadcast over the internal event bus and surfaced as SSE
/// events to operators.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusMsg {
    Heartbeat { ts_millis: i64 },
    Status(StatusSnapshot),
    OrderEvent(OrderStateChanged),
    LogLine { level: String, msg: String },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

/// Point-in-time snapshot of daemon state, returned by GET /v1/status and
/// carried inside SSE `status` events.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub daemon_uptime_secs: u64,
    pub config_hash: String,
    pub dsw_stalled: bool,
    pub dsw_last_applied_position: i64,
    pub dsw_interval_ms: i64,
    pub notes: Option<String>,
}

/// Cloneable (Arc) handle shared across every Axum handler and background
/// task. One instance per process, built once by `wiring::bootstrap`.
pub struct AppState {
    pub bus: broadcast::Sender<BusMsg>,
    pub build: BuildInfo,
    pub config: Config,
    pub config_hash: String,
    pub status: Arc<RwLock<StatusSnapshot>>,
    pub redis_pool: sfp_hotstore::RedisPool,
    pub om: Arc<OrderManager>,
    pub queue: Arc<Dispatcher>,
    pub worker_stats: Arc<WorkerStatsRegistry>,
    pub sessions: Arc<SessionRegistry>,
    pub broker: Arc<dyn BrokerAdapter>,
    pub mme: Arc<MatchingEngine>,
    pub portfolio: Arc<RwLock<PositionBook>>,
    pub dsw: Arc<Mutex<DbSyncWorker>>,
}

impl AppState {
    pub fn run_id_namespace(&self) -> Uuid {
        Uuid::new_v5(&Uuid::NAMESPACE_DNS, format!("sfp-daemon.run.v1|{}", self.config_hash).as_bytes())
    }

    /// Mark an order dirty for the next DB Sync Worker flush. Every call
    /// site that mutates an order through `om` calls this right after, so
    /// the flush loop always has something to drain.
    pub async fn mark_order_dirty(&self, order_id: Uuid) {
        self.dsw.lock().await.mark_dirty(order_id);
    }

    /// Mark a `(user, symbol)` position dirty for the next flush.
    pub async fn mark_position_dirty(&self, key: (String, String)) {
        self.dsw.lock().await.mark_position_dirty(key);
    }
}

/// Monotonically increasing uptime since first call (process lifetime).
pub fn uptime_secs() -> u64 {
    static START: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();
    START.get_or_init(std::time::Instant::now).elapsed().as_secs()
}

/// Spawn a background task that emits a heartbeat SSE every `interval`.
pub fn spawn_heartbeat(bus: broadcast::Sender<BusMsg>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let ts = chrono::Utc::now().timestamp_millis();
            let _ = bus.send(BusMsg::Heartbeat { ts_millis: ts });
        }
    });
}
