//! Process wiring for the signal-to-fill pipeline: HTTP ingress, the
//! background dispatch/sweep/sync loops, and the shared state they run
//! against. `main.rs` is a thin binary shell around `bootstrap` and
//! `build_router`.

pub mod api_types;
pub mod dispatch;
pub mod routes;
pub mod state;
pub mod wiring;
