//! Game Coordination Module
//!
//! Role assignment, turn arbitration, and the authoritative position.
//!
//! ## Module Structure
//!
//! - `role`: Player slots, roles, and the slot registry
//! - `position`: Authoritative game position and turn indicator
//! - `rules`: Rules-engine seam (legality is an external concern)
//! - `arbiter`: Turn enforcement and validate-then-commit

pub mod arbiter;
pub mod position;
pub mod role;
pub mod rules;

// Re-export key types
pub use arbiter::{MoveArbiter, MoveOutcome, RejectReason};
pub use position::GamePosition;
pub use role::{ConnectionId, Role, RoleRegistry, Slot};
pub use rules::{MoveRequest, PassthroughRules, RulesEngine, Ruling};
