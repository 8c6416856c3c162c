//! The Order state machine: legal transitions only, with idempotent replay
//! against a set of already-applied transition ids.
//!
//! Unlike a live broker order's ack/fill/cancel event vocabulary, Order
//! transitions here are named directly by destination state — the exact
//! nine-state diagram is narrow enough that the transition itself, not a
//! separate event enum, is the unit of idempotency.

use std::collections::HashSet;

use sfp_errors::PipelineError;
use sfp_types::order::OrderState;

/// `true` if `from -> to` is one of the permitted edges.
pub fn is_legal(from: OrderState, to: OrderState) -> bool {
    use OrderState::*;
    matches!(
        (from, to),
        (Created, Pending)
            | (Created, Rejected)
            | (Pending, Placing)
            | (Pending, Rejected)
            | (Pending, Cancelling)
            | (Placing, Placed)
            | (Placing, Rejected)
            | (Placed, Filling)
            | (Placed, Cancelling)
            | (Filling, Filled)
            | (Filling, Rejected)
            | (Cancelling, Cancelled)
    )
}

/// Validate `from -> to`; callers apply the mutation themselves once this
/// returns `Ok`, since the state machine here is free of any particular
/// storage representation.
pub fn validate_transition(from: OrderState, to: OrderState) -> Result<(), PipelineError> {
    if is_legal(from, to) {
        Ok(())
    } else {
        Err(PipelineError::InvalidTransition { from, to })
    }
}

/// Tracks which `(order_id, transition_id)` pairs have already been applied,
/// so replaying the transaction log on recovery converges without
/// double-applying a transition.
#[derive(Debug, Default)]
pub struct ReplayGuard {
    applied: HashSet<String>,
}

impl ReplayGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` if this is the first time `transition_id` has been seen;
    /// records it as seen either way.
    pub fn first_sighting(&mut self, transition_id: &str) -> bool {
        self.applied.insert(transition_id.to_string())
    }

    pub fn contains(&self, transition_id: &str) -> bool {
        self.applied.contains(transition_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use OrderState::*;

    #[test]
    fn full_live_path_is_legal() {
        assert!(is_legal(Created, Pending));
        assert!(is_legal(Pending, Placing));
        assert!(is_legal(Placing, Placed));
        assert!(is_legal(Placed, Filling));
        assert!(is_legal(Filling, Filled));
    }

    #[test]
    fn cancel_path_is_legal_from_pending_and_placed() {
        assert!(is_legal(Pending, Cancelling));
        assert!(is_legal(Placed, Cancelling));
        assert!(is_legal(Cancelling, Cancelled));
    }

    #[test]
    fn reject_reachable_from_every_non_terminal_live_state() {
        assert!(is_legal(Created, Rejected));
        assert!(is_legal(Pending, Rejected));
        assert!(is_legal(Placing, Rejected));
        assert!(is_legal(Filling, Rejected));
    }

    #[test]
    fn terminal_states_have_no_outgoing_edges() {
        for to in [Created, Pending, Placing, Placed, Filling, Filled, Rejected, Cancelling, Cancelled] {
            assert!(!is_legal(Filled, to));
            assert!(!is_legal(Rejected, to));
            assert!(!is_legal(Cancelled, to));
        }
    }

    #[test]
    fn skipping_a_state_is_illegal() {
        assert!(!is_legal(Created, Placing));
        assert!(!is_legal(Created, Placed));
        assert!(!is_legal(Placed, Filled));
    }

    #[test]
    fn validate_transition_surfaces_invalid_transition_error() {
        let err = validate_transition(Filled, Cancelling).unwrap_err();
        assert_eq!(
            err,
            PipelineError::InvalidTransition {
                from: Filled,
                to: Cancelling
            }
        );
    }

    #[test]
    fn replay_guard_reports_first_sighting_once() {
        let mut guard = ReplayGuard::new();
        assert!(guard.first_sighting("tx-1"));
        assert!(!guard.first_sighting("tx-1"));
        assert!(guard.contains("tx-1"));
    }
}
