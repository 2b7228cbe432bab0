//! Move Arbiter
//!
//! Enforces whose turn it is, delegates legality to the rules engine, and
//! commits the successor position. The caller holds the single game-state
//! lock across the whole validate-then-commit step, so at most one
//! submission per logical turn can ever succeed.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::game::position::GamePosition;
use crate::game::role::{ConnectionId, RoleRegistry};
use crate::game::rules::{MoveRequest, RulesEngine, Ruling};

/// Why a move was turned down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Submitter does not hold the slot whose turn it is. Also covers
    /// observers and moves for a slot vacated mid-flight.
    WrongTurn,
    /// The rules engine refused the move.
    IllegalMove,
}

/// Result of submitting a move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    /// Move committed; broadcast `request` and the new `position` to all
    /// connections.
    Accepted {
        /// The request as submitted.
        request: MoveRequest,
        /// The freshly committed position.
        position: GamePosition,
    },
    /// Move refused; echo `request` back to the sender only.
    Rejected {
        /// Why the move was refused.
        reason: RejectReason,
        /// The original request, so the client can revert optimistic UI.
        request: MoveRequest,
    },
}

/// Applies moves to the authoritative position.
pub struct MoveArbiter {
    rules: Arc<dyn RulesEngine>,
}

impl MoveArbiter {
    /// Create an arbiter delegating legality to `rules`.
    pub fn new(rules: Arc<dyn RulesEngine>) -> Self {
        Self { rules }
    }

    /// Validate and, if legal, commit a move.
    ///
    /// The turn check reads `position.to_move` and compares the holder of
    /// that slot against the submitter. A second submission for the same
    /// turn sees the already-advanced indicator and lands in `WrongTurn`,
    /// even if it would otherwise have been legal.
    pub fn submit_move(
        &self,
        roles: &RoleRegistry,
        position: &mut GamePosition,
        conn: ConnectionId,
        request: MoveRequest,
    ) -> MoveOutcome {
        let mover = position.to_move;
        if roles.holder(mover) != Some(conn) {
            return MoveOutcome::Rejected {
                reason: RejectReason::WrongTurn,
                request,
            };
        }

        match self.rules.try_move(position, &request) {
            Ruling::Legal(next) => {
                *position = next;
                MoveOutcome::Accepted {
                    request,
                    position: position.clone(),
                }
            }
            Ruling::Illegal => MoveOutcome::Rejected {
                reason: RejectReason::IllegalMove,
                request,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::role::{Role, Slot};
    use crate::game::rules::PassthroughRules;
    use proptest::prelude::*;

    fn setup() -> (MoveArbiter, RoleRegistry, GamePosition, ConnectionId, ConnectionId) {
        let rules = Arc::new(PassthroughRules);
        let arbiter = MoveArbiter::new(rules.clone());
        let mut roles = RoleRegistry::new();
        let c1 = ConnectionId::new();
        let c2 = ConnectionId::new();
        assert_eq!(roles.assign(c1), Role::Player(Slot::First));
        assert_eq!(roles.assign(c2), Role::Player(Slot::Second));
        let position = rules.initial_position();
        (arbiter, roles, position, c1, c2)
    }

    #[test]
    fn accepted_move_advances_turn() {
        let (arbiter, roles, mut position, c1, _) = setup();

        let outcome = arbiter.submit_move(&roles, &mut position, c1, MoveRequest::new("e2", "e4"));
        assert!(matches!(outcome, MoveOutcome::Accepted { .. }));
        assert_eq!(position.to_move, Slot::Second);
    }

    #[test]
    fn non_mover_is_rejected_with_wrong_turn() {
        let (arbiter, roles, mut position, _, c2) = setup();

        let request = MoveRequest::new("e7", "e5");
        let outcome = arbiter.submit_move(&roles, &mut position, c2, request.clone());
        assert_eq!(
            outcome,
            MoveOutcome::Rejected {
                reason: RejectReason::WrongTurn,
                request,
            }
        );
        // Position untouched.
        assert_eq!(position.to_move, Slot::First);
    }

    #[test]
    fn observer_is_always_rejected() {
        let (arbiter, mut roles, mut position, _, _) = setup();
        let observer = ConnectionId::new();
        assert_eq!(roles.assign(observer), Role::Observer);

        let outcome =
            arbiter.submit_move(&roles, &mut position, observer, MoveRequest::new("e2", "e4"));
        assert!(matches!(
            outcome,
            MoveOutcome::Rejected {
                reason: RejectReason::WrongTurn,
                ..
            }
        ));
    }

    #[test]
    fn move_for_vacated_slot_is_wrong_turn() {
        let (arbiter, mut roles, mut position, c1, _) = setup();
        roles.release(c1);

        let outcome = arbiter.submit_move(&roles, &mut position, c1, MoveRequest::new("e2", "e4"));
        assert!(matches!(
            outcome,
            MoveOutcome::Rejected {
                reason: RejectReason::WrongTurn,
                ..
            }
        ));
    }

    #[test]
    fn second_submission_for_same_turn_is_rejected() {
        let (arbiter, roles, mut position, c1, _) = setup();

        let first = arbiter.submit_move(&roles, &mut position, c1, MoveRequest::new("e2", "e4"));
        assert!(matches!(first, MoveOutcome::Accepted { .. }));

        // Same player again, before the counterpart moved: the turn
        // indicator already advanced.
        let second = arbiter.submit_move(&roles, &mut position, c1, MoveRequest::new("d2", "d4"));
        assert!(matches!(
            second,
            MoveOutcome::Rejected {
                reason: RejectReason::WrongTurn,
                ..
            }
        ));
    }

    #[test]
    fn illegal_move_echoes_original_request() {
        let (arbiter, roles, mut position, c1, _) = setup();

        let request = MoveRequest::new("", "e4");
        let outcome = arbiter.submit_move(&roles, &mut position, c1, request.clone());
        assert_eq!(
            outcome,
            MoveOutcome::Rejected {
                reason: RejectReason::IllegalMove,
                request,
            }
        );
        assert_eq!(position.to_move, Slot::First);
    }

    proptest! {
        /// Whatever order submissions arrive in, only the holder of the
        /// slot indicated by the position ever commits, and each commit
        /// flips the indicator.
        #[test]
        fn turn_strictly_alternates(submitters in proptest::collection::vec(0usize..3, 1..60)) {
            let (arbiter, mut roles, mut position, c1, c2) = setup();
            let observer = ConnectionId::new();
            roles.assign(observer);
            let conns = [c1, c2, observer];

            for &pick in &submitters {
                let conn = conns[pick];
                let before = position.to_move;
                let outcome = arbiter.submit_move(
                    &roles,
                    &mut position,
                    conn,
                    MoveRequest::new("a1", "a2"),
                );
                match outcome {
                    MoveOutcome::Accepted { .. } => {
                        prop_assert_eq!(roles.holder(before), Some(conn));
                        prop_assert_eq!(position.to_move, before.other());
                    }
                    MoveOutcome::Rejected { reason, .. } => {
                        prop_assert_eq!(reason, RejectReason::WrongTurn);
                        prop_assert_eq!(position.to_move, before);
                    }
                }
            }
        }
    }
}
