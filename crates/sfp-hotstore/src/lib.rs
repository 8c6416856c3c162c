//! The Redis-backed "hot store": connection pooling, distributed locks,
//! dedup guards, and stream primitives shared by the Order Manager, the
//! Priority Queue Dispatcher, and the Broker Adapter.

pub mod dedup;
pub mod lock;
pub mod pool;
pub mod streams;

pub use lock::{acquire, acquire_ordered, release, LockGuard};
pub use pool::{build_pool, RedisPool};
