//! Peer Signaling Module
//!
//! Relays the four-message peer negotiation protocol (offer, answer,
//! network-path candidate, teardown) between the two slot-holding
//! connections. Payloads stay opaque end to end.
//!
//! ## Module Structure
//!
//! - `session`: Per-pairing negotiation state machine with candidate
//!   buffering
//! - `relay`: Session map, routing, and teardown propagation

pub mod relay;
pub mod session;

// Re-export key types
pub use relay::{RelayEffect, SignalingRelay};
pub use session::{
    BufferedCandidate, CandidateRouting, NegotiationPhase, SignalingError, SignalingSession,
};
