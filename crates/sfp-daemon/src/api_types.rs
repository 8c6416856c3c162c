//! Request and response types for every sfp-daemon HTTP endpoint. No
//! business logic lives here; these are pure wire shapes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use sfp_types::order::{OrderType, ProductType, Side};
use sfp_types::signal::Signal;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: &'static str,
    pub version: &'static str,
}

/// Body of `POST /v1/signals`. Maps directly onto `sfp_types::signal::Signal`
/// minus the timestamp, which the daemon stamps itself at ingress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitSignalRequest {
    pub user_id: String,
    pub strategy_id: Option<String>,
    pub symbol: String,
    pub side: Side,
    pub order_type: OrderType,
    pub product_type: ProductType,
    pub qty: i64,
    pub price_micros: Option<i64>,
    pub paper_mode: bool,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl SubmitSignalRequest {
    pub fn into_signal(self, now_millis: i64) -> Signal {
        Signal {
            user_id: self.user_id,
            strategy_id: self.strategy_id,
            symbol: self.symbol,
            side: self.side,
            order_type: self.order_type,
            product_type: self.product_type,
            qty: self.qty,
            price_micros: self.price_micros,
            paper_mode: self.paper_mode,
            metadata: self.metadata,
            ts_millis: now_millis,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitSignalResponse {
    pub order_id: Uuid,
    pub status: String,
}

/// Error body shape for every non-2xx response. `tag` is the stable
/// `PipelineError` discriminant the control plane dispatches on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub tag: String,
    pub message: String,
    pub existing_order_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelRequest {
    pub reason: String,
}

/// Body of `POST /v1/ticks/{symbol}`: the sole tick-ingest surface. A real
/// market-data feed is a collaborator (out of scope here); this endpoint
/// is how one would drive the paper matching engine in tests or with a
/// bridged feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestTickRequest {
    pub bid_micros: i64,
    pub ask_micros: i64,
    pub last_micros: i64,
    pub ts_millis: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestTickResponse {
    pub fills: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionResponse {
    pub position: Option<sfp_types::position::Position>,
}
