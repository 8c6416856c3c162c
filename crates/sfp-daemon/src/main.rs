//! sfp-daemon entry point.
//!
//! This file is intentionally thin: it loads configuration, boots every
//! subsystem via `wiring::bootstrap`, spawns the background loops, and
//! starts the HTTP server. All route handlers live in `routes.rs`; all
//! shared state lives in `state.rs`; all bootstrap logic lives in
//! `wiring.rs`.

use std::{net::SocketAddr, time::Duration};

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use sfp_daemon::{dispatch, routes, state, wiring};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, Level};

const DEFAULT_CONFIG_PATH: &str = "crates/sfp-daemon/config/default.yaml";
const CONFIG_PATHS_ENV: &str = "SFP_CONFIG_PATHS";
const ADDR_ENV: &str = "SFP_DAEMON_ADDR";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env.local if present (dev convenience). Silent if the file
    // does not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let config_paths = resolve_config_paths();
    let path_refs: Vec<&str> = config_paths.iter().map(String::as_str).collect();
    let shared = wiring::bootstrap(&path_refs).await.context("daemon bootstrap failed")?;

    info!(config_hash = %shared.config_hash, "configuration loaded");

    state::spawn_heartbeat(shared.bus.clone(), Duration::from_secs(5));

    for n in 0..shared.config.queue.workers {
        let worker_id = format!("worker-{n}");
        let worker_state = shared.clone();
        tokio::spawn(async move { dispatch::run_dispatch_worker(worker_state, worker_id).await });
    }

    tokio::spawn(dispatch::run_timeout_sweeper(shared.clone(), Duration::from_millis(500)));
    tokio::spawn(dispatch::run_dsw_loop(shared.clone()));

    let app = routes::build_router(shared.clone())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_localhost_only());

    let addr = bind_addr_from_env().unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 8900)));
    info!("sfp-daemon listening on http://{}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .await
        .context("server crashed")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();
}

fn bind_addr_from_env() -> Option<SocketAddr> {
    std::env::var(ADDR_ENV).ok()?.parse().ok()
}

/// Config paths are layered in order: the shipped defaults, then any
/// comma-separated overlay paths from `SFP_CONFIG_PATHS` (later paths
/// win on key conflicts, per the layered-YAML loader).
fn resolve_config_paths() -> Vec<String> {
    let mut paths = vec![DEFAULT_CONFIG_PATH.to_string()];
    if let Ok(extra) = std::env::var(CONFIG_PATHS_ENV) {
        paths.extend(extra.split(',').map(str::trim).filter(|s| !s.is_empty()).map(String::from));
    }
    paths
}

/// CORS: allow only localhost origins.
fn cors_localhost_only() -> CorsLayer {
    let allowed_origins = [
        "http://localhost",
        "http://127.0.0.1",
        "http://localhost:3000",
        "http://127.0.0.1:3000",
        "http://localhost:5173",
        "http://127.0.0.1:5173",
    ];

    let origins: Vec<HeaderValue> = allowed_origins.iter().filter_map(|o| HeaderValue::from_str(o).ok()).collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(tower_http::cors::Any)
}
