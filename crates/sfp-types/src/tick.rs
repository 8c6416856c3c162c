//! Tick — transient per-symbol market-data record, MME-only.

use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub bid_micros: i64,
    pub ask_micros: i64,
    pub last_micros: i64,
    pub ts_millis: i64,
}

impl Tick {
    pub fn new(bid_micros: i64, ask_micros: i64, last_micros: i64, ts_millis: i64) -> Self {
        Self {
            bid_micros,
            ask_micros,
            last_micros,
            ts_millis,
        }
    }
}
