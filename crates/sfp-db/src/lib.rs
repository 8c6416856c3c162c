//! DB Sync Worker: persists hot (in-memory / Redis) state to SQL with
//! minimum write amplification — dirty-field diffing, adaptive-interval
//! batching, pipelined Redis reads, bulk upserts, and stall/catch-up
//! handling.

pub mod compression;
pub mod dirty;
pub mod interval;
pub mod pool;
pub mod position_source;
pub mod redis_source;
pub mod schema;
pub mod stall;
pub mod transition_source;
pub mod upsert;
pub mod worker;

pub use pool::{connect, connect_from_env, migrate, ENV_DB_URL};
pub use position_source::{BookPositionSource, PositionSource};
pub use redis_source::{OrderSource, RedisOrderSource};
pub use stall::{StallState, StallTracker};
pub use transition_source::{RedisTransitionSource, TransitionSource};
pub use worker::{DbSyncWorker, FlushStats};
