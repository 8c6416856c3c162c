//! Position reconstruction: folds the ordered FILLED-order log into
//! per-`(user, symbol)` FIFO lot state and projects it as `Position`
//! records. Pure and deterministic — no IO, no time, no broker wiring.

mod accounting;
mod metrics;
mod types;

pub mod book;

pub use book::{PositionBook, PositionError};
pub use types::{Fill, Lot, PositionState};
