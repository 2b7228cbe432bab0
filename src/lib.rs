//! # Gambit Session Coordinator
//!
//! Server-side coordinator for a two-player turn-based board game played
//! over a real-time channel, with a relay for peer-to-peer media
//! negotiation that never stores or inspects the media payloads.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      GAMBIT SERVER                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  game/            - Roles, turns, authoritative position    │
//! │  ├── role.rs      - Player slots and the slot registry      │
//! │  ├── position.rs  - Opaque board + turn indicator           │
//! │  ├── rules.rs     - Rules-engine seam (legality external)   │
//! │  └── arbiter.rs   - Turn check, validate-then-commit        │
//! │                                                             │
//! │  signaling/       - Peer negotiation relay                  │
//! │  ├── session.rs   - Offer/answer state machine, buffering   │
//! │  └── relay.rs     - Session map and teardown propagation    │
//! │                                                             │
//! │  network/         - Transport and dispatch                  │
//! │  ├── protocol.rs  - Closed inbound/outbound message enums   │
//! │  ├── broadcaster.rs - Injected outbound capability          │
//! │  ├── coordinator.rs - Per-connection lifecycle binding      │
//! │  └── server.rs    - WebSocket accept loop and frame I/O     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Coordination Guarantees
//!
//! - At most one connection holds each player slot at any time.
//! - The turn indicator lives inside the position and advances only
//!   under one lock, so at most one move commits per logical turn.
//! - Candidates relayed for a pairing preserve arrival order, including
//!   across the buffered-then-flushed boundary.
//! - Teardown notifies the surviving peer at most once per event.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod game;
pub mod network;
pub mod signaling;

// Re-export commonly used types
pub use game::arbiter::{MoveArbiter, MoveOutcome, RejectReason};
pub use game::position::GamePosition;
pub use game::role::{ConnectionId, Role, RoleRegistry, Slot};
pub use game::rules::{MoveRequest, PassthroughRules, RulesEngine, Ruling};
pub use network::broadcaster::{Broadcaster, ChannelBroadcaster};
pub use network::coordinator::GameCoordinator;
pub use network::protocol::{ClientMessage, ServerMessage};
pub use network::server::{CoordinatorServer, CoordinatorServerError, ServerConfig};
pub use signaling::relay::SignalingRelay;
pub use signaling::session::NegotiationPhase;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
