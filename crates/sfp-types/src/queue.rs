//! Queue Item — transient work unit between `QD.enqueue` and worker claim.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 1 = high, 2 = normal, 3 = low.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Priority {
    High = 1,
    Normal = 2,
    Low = 3,
}

impl Priority {
    pub fn stream_key(self) -> &'static str {
        match self {
            Priority::High => "queue:p1",
            Priority::Normal => "queue:p2",
            Priority::Low => "queue:p3",
        }
    }

    pub fn all() -> [Priority; 3] {
        [Priority::High, Priority::Normal, Priority::Low]
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueueItem {
    pub order_id: Uuid,
    pub priority: Priority,
    pub enqueued_at_millis: i64,
    pub attempts: u32,
}

impl QueueItem {
    pub fn new(order_id: Uuid, priority: Priority, enqueued_at_millis: i64) -> Self {
        Self {
            order_id,
            priority,
            enqueued_at_millis,
            attempts: 0,
        }
    }
}
