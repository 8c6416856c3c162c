//! Axum router and all HTTP handlers for sfp-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and
//! attaches middleware layers. Handlers are `pub(crate)` so scenario
//! tests can compose the router directly without going through a socket.

use std::{convert::Infallible, sync::Arc};

use axum::{
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures_util::{Stream, StreamExt};
use sfp_errors::PipelineError;
use sfp_types::tick::Tick;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::info;
use uuid::Uuid;

use crate::api_types::{
    CancelRequest, ErrorResponse, HealthResponse, IngestTickRequest, IngestTickResponse, PositionResponse,
    SubmitSignalRequest, SubmitSignalResponse,
};
use crate::state::{uptime_secs, AppState, BusMsg};

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/status", get(status_handler))
        .route("/v1/stream", get(stream))
        .route("/v1/signals", post(submit_signal))
        .route("/v1/orders/:id", get(get_order))
        .route("/v1/orders/:id/cancel", post(cancel_order))
        .route("/v1/users/:user_id/orders", get(list_orders_for_user))
        .route("/v1/ticks/:symbol", post(ingest_tick))
        .route("/v1/positions/:user_id/:symbol", get(get_position))
        .with_state(state)
}

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service,
            version: st.build.version,
        }),
    )
}

pub(crate) async fn status_handler(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    let mut snap = st.status.read().await.clone();
    snap.daemon_uptime_secs = uptime_secs();
    let _ = st.bus.send(BusMsg::Status(snap.clone()));
    (StatusCode::OK, Json(snap))
}

pub(crate) async fn stream(State(st): State<Arc<AppState>>) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));
    headers.insert("Connection", HeaderValue::from_static("keep-alive"));

    let rx = st.bus.subscribe();
    let events = broadcast_to_sse(rx);
    (headers, Sse::new(events).keep_alive(KeepAlive::new())).into_response()
}

fn broadcast_to_sse(rx: broadcast::Receiver<BusMsg>) -> impl Stream<Item = Result<Event, Infallible>> {
    BroadcastStream::new(rx).filter_map(|msg| async move {
        match msg {
            Ok(m) => {
                let event_name = match &m {
                    BusMsg::Heartbeat { .. } => "heartbeat",
                    BusMsg::Status(_) => "status",
                    BusMsg::OrderEvent(_) => "order_event",
                    BusMsg::LogLine { .. } => "log",
                };
                let data = serde_json::to_string(&m).ok()?;
                Some(Ok(Event::default().event(event_name).data(data)))
            }
            Err(_) => None,
        }
    })
}

fn error_response(err: PipelineError) -> Response {
    let (status, tag) = match &err {
        PipelineError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION"),
        PipelineError::Duplicate { .. } => (StatusCode::CONFLICT, "DUPLICATE"),
        PipelineError::RateLimited { .. } => (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMITED"),
        PipelineError::Backpressure => (StatusCode::SERVICE_UNAVAILABLE, "BACKPRESSURE"),
        PipelineError::QueueFull => (StatusCode::SERVICE_UNAVAILABLE, "QUEUE_FULL"),
        PipelineError::Transient(_) => (StatusCode::BAD_GATEWAY, "TRANSIENT"),
        PipelineError::BrokerReject(_) => (StatusCode::UNPROCESSABLE_ENTITY, "BROKER_REJECT"),
        PipelineError::LockTimeout { .. } => (StatusCode::REQUEST_TIMEOUT, "LOCK_TIMEOUT"),
        PipelineError::Timeout { .. } => (StatusCode::REQUEST_TIMEOUT, "TIMEOUT"),
        PipelineError::InvalidTransition { .. } => (StatusCode::CONFLICT, "INVALID_TRANSITION"),
        PipelineError::DbSyncStalled => (StatusCode::SERVICE_UNAVAILABLE, "DB_SYNC_STALLED"),
        PipelineError::Fatal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "FATAL"),
        PipelineError::NotFound => (StatusCode::NOT_FOUND, "NOT_FOUND"),
    };

    let existing_order_id = match &err {
        PipelineError::Duplicate { existing_order_id } => {
            existing_order_id.as_ref().and_then(|s| Uuid::parse_str(s).ok())
        }
        _ => None,
    };

    (
        status,
        Json(ErrorResponse {
            tag: tag.to_string(),
            message: err.to_string(),
            existing_order_id,
        }),
    )
        .into_response()
}

pub(crate) async fn submit_signal(
    State(st): State<Arc<AppState>>,
    Json(body): Json<SubmitSignalRequest>,
) -> Response {
    let now = chrono::Utc::now().timestamp_millis();
    let signal = body.into_signal(now);

    let order_id = match st.om.create(signal, now).await {
        Ok(id) => id,
        Err(e) => return error_response(e),
    };
    st.mark_order_dirty(order_id).await;

    if let Err(e) = st.om.transition(order_id, sfp_types::order::OrderState::Pending, "submit_signal", None, now).await {
        return error_response(e);
    }
    st.mark_order_dirty(order_id).await;

    // Priority assignment is a collaborator policy in the full system;
    // every signal lands on the normal stream here.
    if let Err(e) = st.queue.enqueue(order_id, sfp_types::queue::Priority::Normal, now).await {
        return error_response(e);
    }

    info!(%order_id, "signal accepted");
    (
        StatusCode::ACCEPTED,
        Json(SubmitSignalResponse {
            order_id,
            status: "PENDING".to_string(),
        }),
    )
        .into_response()
}

pub(crate) async fn get_order(State(st): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Response {
    match st.om.get(id) {
        Some(order) => (StatusCode::OK, Json(order)).into_response(),
        None => error_response(PipelineError::NotFound),
    }
}

pub(crate) async fn list_orders_for_user(State(st): State<Arc<AppState>>, Path(user_id): Path<String>) -> Response {
    (StatusCode::OK, Json(st.om.list_by_user(&user_id))).into_response()
}

pub(crate) async fn cancel_order(
    State(st): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<CancelRequest>,
) -> Response {
    let now = chrono::Utc::now().timestamp_millis();
    match st.om.cancel(id, body.reason, now).await {
        Ok(event) => {
            st.mme.cancel(id);
            let _ = st.bus.send(BusMsg::OrderEvent(event));
            st.mark_order_dirty(id).await;
            StatusCode::OK.into_response()
        }
        Err(e) => error_response(e),
    }
}

pub(crate) async fn ingest_tick(
    State(st): State<Arc<AppState>>,
    Path(symbol): Path<String>,
    Json(body): Json<IngestTickRequest>,
) -> Response {
    let tick = Tick::new(body.bid_micros, body.ask_micros, body.last_micros, body.ts_millis);

    let outcomes = match st.mme.on_tick(&st.redis_pool, &symbol, tick).await {
        Ok(o) => o,
        Err(e) => return error_response(e),
    };

    let mut fills = 0usize;
    for outcome in outcomes {
        if let sfp_mme::MatchOutcome::Filled { order_id, fill_price_micros } = outcome {
            apply_paper_fill(&st, order_id, &symbol, fill_price_micros, body.ts_millis).await;
            fills += 1;
        }
    }

    (StatusCode::OK, Json(IngestTickResponse { fills })).into_response()
}

async fn apply_paper_fill(st: &Arc<AppState>, order_id: Uuid, symbol: &str, fill_price_micros: i64, ts_millis: i64) {
    let Some(order) = st.om.get(order_id) else { return };
    let remaining = order.requested_qty - order.filled_qty;
    if remaining <= 0 {
        return;
    }

    match st.om.record_fill(order_id, remaining, fill_price_micros, ts_millis).await {
        Ok(event) => {
            let _ = st.bus.send(BusMsg::OrderEvent(event));
            st.mark_order_dirty(order_id).await;

            let mut book = st.portfolio.write().await;
            let fill = sfp_portfolio::Fill {
                user_id: order.user_id.clone(),
                symbol: symbol.to_string(),
                side: order.side,
                qty: remaining,
                price_micros: fill_price_micros,
                ts_millis,
            };
            if let Err(e) = book.apply_fill(&fill) {
                tracing::warn!(%order_id, error = %e, "position application failed");
            } else {
                drop(book);
                st.mark_position_dirty((order.user_id.clone(), symbol.to_string())).await;
            }
        }
        Err(e) => tracing::warn!(%order_id, error = %e, "failed to apply paper fill"),
    }
}

pub(crate) async fn get_position(
    State(st): State<Arc<AppState>>,
    Path((user_id, symbol)): Path<(String, String)>,
) -> Response {
    let book = st.portfolio.read().await;
    let position = book.position(&user_id, &symbol, None);
    (StatusCode::OK, Json(PositionResponse { position })).into_response()
}
