//! Mock Matching Engine: fills paper-mode orders against a live tick
//! stream instead of submitting them to a broker.

pub mod engine;
pub mod matching;
pub mod ring;
pub mod timeout;

pub use engine::{MatchOutcome, MatchingEngine};
pub use matching::MatchResult;
pub use timeout::MatchDeadline;
