//! Rules Engine Seam
//!
//! Board-rule validation is an external collaborator. The coordinator
//! hands the engine the current position plus a move request and gets
//! back either a successor position or a rejection; it never inspects
//! board contents itself.

use serde::{Deserialize, Serialize};

use crate::game::position::GamePosition;
use crate::game::role::Slot;

/// A move as submitted by a client.
///
/// Squares and the optional promotion piece are opaque to the
/// coordinator; only the rules engine interprets them. The coordinator
/// validates presence, nothing more.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRequest {
    /// Origin square.
    pub from: String,
    /// Destination square.
    pub to: String,
    /// Promotion piece, when the move requires one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promotion: Option<String>,
}

impl MoveRequest {
    /// Build a request without a promotion.
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            promotion: None,
        }
    }

    /// Envelope-level validity: both squares present.
    pub fn is_well_formed(&self) -> bool {
        !self.from.is_empty() && !self.to.is_empty()
    }
}

/// Verdict of the rules engine on a single move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ruling {
    /// The move is legal; the engine produced the successor position.
    Legal(GamePosition),
    /// The move is illegal in the current position.
    Illegal,
}

/// External collaborator validating moves and producing successor
/// positions. Implementations must be cheap and synchronous; the arbiter
/// calls this under the game-state lock.
pub trait RulesEngine: Send + Sync {
    /// The position a fresh game starts from.
    fn initial_position(&self) -> GamePosition;

    /// Validate `request` against `position`.
    fn try_move(&self, position: &GamePosition, request: &MoveRequest) -> Ruling;
}

/// Stand-in engine for demos and tests: accepts every well-formed move
/// and flips the side to move, recording the move on the board string.
/// Real deployments inject an actual rules engine.
#[derive(Debug, Default)]
pub struct PassthroughRules;

impl RulesEngine for PassthroughRules {
    fn initial_position(&self) -> GamePosition {
        GamePosition::new("start", Slot::First)
    }

    fn try_move(&self, position: &GamePosition, request: &MoveRequest) -> Ruling {
        if !request.is_well_formed() {
            return Ruling::Illegal;
        }
        let board = format!("{} {}{}", position.board, request.from, request.to);
        Ruling::Legal(GamePosition::new(board, position.to_move.other()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passthrough_alternates_side_to_move() {
        let rules = PassthroughRules;
        let start = rules.initial_position();
        assert_eq!(start.to_move, Slot::First);

        let Ruling::Legal(next) = rules.try_move(&start, &MoveRequest::new("e2", "e4")) else {
            panic!("well-formed move should be legal");
        };
        assert_eq!(next.to_move, Slot::Second);

        let Ruling::Legal(after) = rules.try_move(&next, &MoveRequest::new("e7", "e5")) else {
            panic!("well-formed move should be legal");
        };
        assert_eq!(after.to_move, Slot::First);
    }

    #[test]
    fn passthrough_rejects_empty_squares() {
        let rules = PassthroughRules;
        let start = rules.initial_position();
        let request = MoveRequest::new("", "e4");
        assert_eq!(rules.try_move(&start, &request), Ruling::Illegal);
    }
}
