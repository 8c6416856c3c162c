//! Position — derived, per user×symbol state.

use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionStatus {
    Open,
    Closed,
}

/// Net quantity, VWAP, and PnL for one `(user, symbol)` pair. Always
/// reconstructable from the ordered FILLED-order log alone; `sfp-portfolio`
/// is the crate that performs the reconstruction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub user_id: String,
    pub symbol: String,
    /// Signed net quantity: positive = long, negative = short.
    pub qty_signed: i64,
    pub avg_price_micros: i64,
    pub realized_pnl_micros: i64,
    pub unrealized_pnl_micros: i64,
    pub status: PositionStatus,
    pub opened_at_millis: i64,
    pub closed_at_millis: Option<i64>,
}

impl Position {
    pub fn is_flat(&self) -> bool {
        self.qty_signed == 0
    }
}
