//! Network Layer
//!
//! WebSocket front end, wire protocol, and the lifecycle coordinator
//! tying roles, moves, and signaling together per connection.

pub mod broadcaster;
pub mod coordinator;
pub mod protocol;
pub mod server;

pub use broadcaster::{Broadcaster, ChannelBroadcaster};
pub use coordinator::{GameCoordinator, DEFAULT_CHAT_TEXT_LIMIT};
pub use protocol::{
    ChatRequest, ClientMessage, EnvelopeError, ServerMessage, ServerWarning, SignalEnvelope,
    WarningCode,
};
pub use server::{CoordinatorServer, CoordinatorServerError, ServerConfig};
