//! Shared domain records for the Signal-to-Fill Pipeline.
//!
//! Every subsystem (OM, QD, BA, MME, DSW) depends on this crate instead of
//! on each other, so the types here are the only coupling surface between
//! them — mutation still happens through each subsystem's own API, never by
//! reaching into another subsystem's private state.

pub mod events;
pub mod fixedpoint;
pub mod order;
pub mod position;
pub mod queue;
pub mod session;
pub mod signal;
pub mod tick;

pub use events::{BrokerEvent, BrokerEventKind, OrderStateChanged};
pub use fixedpoint::Micros;
pub use order::{Order, OrderState, OrderType, ProductType, Side, TransitionLogEntry};
pub use position::{Position, PositionStatus};
pub use queue::{Priority, QueueItem};
pub use session::{EncryptedCredentials, Session, SessionHealth};
pub use signal::Signal;
pub use tick::Tick;
