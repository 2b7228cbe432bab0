//! Authoritative Game Position
//!
//! Single process-wide position, mutated only by the move arbiter after
//! the rules engine has confirmed legality. The board itself is an opaque
//! serialized form produced and consumed by the rules engine; the
//! coordinator never interprets it.

use serde::{Deserialize, Serialize};

use crate::game::role::Slot;

/// The authoritative game state as the rules engine last produced it.
///
/// Whose turn it is (`to_move`) lives here and nowhere else, so the
/// turn indicator can never drift from the position it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GamePosition {
    /// Opaque serialized board, e.g. a FEN string. Interpreted only by
    /// the rules engine.
    pub board: String,
    /// The slot that moves next.
    pub to_move: Slot,
}

impl GamePosition {
    /// Build a position from its serialized board and the side to move.
    pub fn new(board: impl Into<String>, to_move: Slot) -> Self {
        Self {
            board: board.into(),
            to_move,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json() {
        let position = GamePosition::new("8/8/8/8/8/8/8/8 w - - 0 1", Slot::Second);
        let json = serde_json::to_string(&position).unwrap();
        let back: GamePosition = serde_json::from_str(&json).unwrap();
        assert_eq!(back, position);
    }
}
