//! Row shapes mirroring the `orders`/`order_transitions`/`positions`
//! tables, decoupled from `sfp_types`'s in-memory representations so a
//! column rename doesn't ripple into the hot path.

use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct OrderRow {
    pub id: Uuid,
    pub user_id: String,
    pub strategy_id: Option<String>,
    pub symbol: String,
    pub side: String,
    pub order_type: String,
    pub product_type: String,
    pub qty: i64,
    pub price: Option<i64>,
    pub filled_qty: i64,
    pub filled_price: Option<i64>,
    pub status: String,
    pub broker_order_id: Option<String>,
    pub error: Option<String>,
    pub retry_count: i32,
    pub created_at: i64,
    pub updated_at: i64,
    pub metadata_json: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct TransitionRow {
    pub order_id: Uuid,
    pub from_state: String,
    pub to_state: String,
    pub reason: Option<String>,
    pub actor: String,
    pub ts: i64,
}

#[derive(Debug, Clone)]
pub struct PositionRow {
    pub user_id: String,
    pub symbol: String,
    pub qty: i64,
    pub avg_price: i64,
    pub realized_pnl: i64,
    pub unrealized_pnl: i64,
    pub status: String,
    pub opened_at: i64,
    pub closed_at: Option<i64>,
}
