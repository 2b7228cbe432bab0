//! Protocol Messages
//!
//! Wire format for client-server communication over WebSocket.
//! All messages are serialized as JSON for debugging ease,
//! with optional binary (bincode) for production.
//!
//! Both directions are closed enums, so adding a message kind is a
//! compile-time-checked change everywhere it is dispatched.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::game::arbiter::RejectReason;
use crate::game::position::GamePosition;
use crate::game::role::{Role, Slot};
use crate::game::rules::MoveRequest;

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Submit a move for arbitration.
    Move(MoveRequest),

    /// Open peer negotiation with a session description.
    Offer(SignalEnvelope),

    /// Answer a relayed offer.
    Answer(SignalEnvelope),

    /// A network-path candidate for the peer link.
    Candidate(SignalEnvelope),

    /// Tear the peer negotiation down.
    Teardown,

    /// Chat line for everyone at the board.
    Chat(ChatRequest),

    /// Ping for latency measurement.
    Ping {
        /// Client timestamp, echoed back.
        timestamp: u64,
    },
}

/// Envelope around an opaque signaling payload.
///
/// The payload is never interpreted, only checked for presence. The slot
/// hint is advisory: routing always goes by the slot the sender actually
/// holds, and a mismatching hint is merely logged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalEnvelope {
    /// Opaque negotiation payload, forwarded verbatim.
    pub payload: String,
    /// The slot the sender believes it holds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_slot_hint: Option<Slot>,
}

impl SignalEnvelope {
    /// Build an envelope without a slot hint.
    pub fn new(payload: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
            sender_slot_hint: None,
        }
    }

    /// Field-presence validation. Nothing beyond the envelope is checked.
    pub fn validate(&self) -> Result<(), EnvelopeError> {
        if self.payload.trim().is_empty() {
            return Err(EnvelopeError::EmptyPayload);
        }
        Ok(())
    }
}

/// Envelope-level validation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvelopeError {
    /// The signaling payload field is missing or empty.
    #[error("signaling payload is empty")]
    EmptyPayload,
}

/// A chat line as submitted by a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The message text.
    pub text: String,
    /// Client-side timestamp; the broadcast carries the server's.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from server to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Role notification for a freshly connected player (unicast).
    RoleAssigned {
        /// The granted role.
        role: Role,
    },

    /// Role notification for an observer, carrying the current position
    /// so late joiners render correct state immediately (unicast).
    ObserverAssigned {
        /// Snapshot of the authoritative position.
        position: GamePosition,
    },

    /// An accepted move, echoed to every connection.
    MoveBroadcast(MoveRequest),

    /// The authoritative position after an accepted move (all
    /// connections).
    PositionBroadcast {
        /// The freshly committed position.
        position: GamePosition,
    },

    /// A refused move, echoed back to the sender only.
    MoveRejected {
        /// Why it was refused.
        reason: RejectReason,
        /// The original request, for optimistic-UI rollback.
        request: MoveRequest,
    },

    /// Relayed offer (unicast to the counterpart).
    OfferForwarded {
        /// Verbatim payload.
        payload: String,
    },

    /// Relayed answer (unicast to the offer's originator).
    AnswerForwarded {
        /// Verbatim payload.
        payload: String,
    },

    /// Relayed network-path candidate (unicast to the counterpart).
    CandidateForwarded {
        /// Verbatim payload.
        payload: String,
    },

    /// The peer negotiation is gone; the recipient survived it (unicast).
    TeardownNotice,

    /// A player slot was filled (all connections).
    PeerJoined {
        /// The slot that was claimed.
        slot: Slot,
    },

    /// A player slot was vacated (all connections).
    PeerLeft {
        /// The slot that was vacated.
        slot: Slot,
    },

    /// Chat line from a player (all connections).
    ChatBroadcast {
        /// The message text.
        text: String,
        /// The sender's slot.
        slot: Slot,
        /// Server receive time, Unix milliseconds.
        timestamp: i64,
    },

    /// Local warning about a dropped request (unicast to sender).
    Warning(ServerWarning),

    /// Pong response.
    Pong {
        /// Echo of the client's timestamp.
        timestamp: u64,
        /// Server time, Unix milliseconds.
        server_time: u64,
    },

    /// Server is shutting down.
    Shutdown {
        /// Why.
        reason: String,
    },
}

/// A dropped-request warning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerWarning {
    /// Warning code.
    pub code: WarningCode,
    /// Human-readable message.
    pub message: String,
}

/// Warning codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningCode {
    /// Signaling envelope failed field-presence validation.
    MalformedSignalingPayload,
    /// Frame could not be parsed as a known message.
    InvalidMessage,
    /// Chat text exceeded the server's length limit.
    ChatTooLong,
}

// =============================================================================
// SERIALIZATION HELPERS
// =============================================================================

impl ClientMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// Serialize to binary.
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Deserialize from binary.
    pub fn from_bytes(data: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(data)
    }
}

impl ServerMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// Serialize to binary.
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Deserialize from binary.
    pub fn from_bytes(data: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(data)
    }
}
