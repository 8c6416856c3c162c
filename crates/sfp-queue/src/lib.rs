//! Priority Queue Dispatcher: Redis-backed, priority-aware work
//! distribution to a worker pool.

pub mod dispatcher;
pub mod fairness;
pub mod worker_stats;

pub use dispatcher::{ClaimedItem, Dispatcher};
pub use fairness::FairnessTick;
pub use worker_stats::{WorkerStats, WorkerStatsRegistry};
