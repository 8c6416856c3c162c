//! Broker Adapter: session lifecycle, retry, idempotency, and the
//! broker-agnostic submission boundary.

pub mod adapter;
pub mod events;
pub mod idempotency;
pub mod registry;
pub mod retry;
pub mod session_fsm;
pub mod submission;

pub use adapter::{BrokerAdapter, CancelOutcome, MockBroker, SubmitOutcome, SubmitRequest};
pub use registry::SessionRegistry;
pub use session_fsm::{SessionHealthTracker, SessionPhase};
