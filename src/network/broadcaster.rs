//! Outbound Delivery
//!
//! The coordinator core never talks to sockets. It is handed a
//! [`Broadcaster`] capability and addresses connections through it; the
//! WebSocket front end supplies the channel-backed implementation.

use std::collections::HashMap;
use std::sync::RwLock;

use tokio::sync::mpsc;
use tracing::debug;

use crate::game::role::ConnectionId;
use crate::network::protocol::ServerMessage;

/// Capability for delivering outbound messages.
///
/// Sends are best-effort and must never block: a full or closed receiver
/// is the receiver's problem, not the sender's.
pub trait Broadcaster: Send + Sync {
    /// Deliver to a single connection.
    fn send(&self, to: ConnectionId, message: ServerMessage);

    /// Deliver to every registered connection.
    fn broadcast(&self, message: ServerMessage);

    /// Deliver to every registered connection except one. Used for
    /// relayed content the sender already rendered locally.
    fn broadcast_except(&self, except: ConnectionId, message: ServerMessage);
}

/// [`Broadcaster`] backed by per-connection mpsc channels.
///
/// The WebSocket front end registers a sender per connection; a writer
/// task on the other end drains it onto the socket.
pub struct ChannelBroadcaster {
    channels: RwLock<HashMap<ConnectionId, mpsc::Sender<ServerMessage>>>,
}

impl ChannelBroadcaster {
    /// Create a broadcaster with no registered connections.
    pub fn new() -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
        }
    }

    /// Register a connection's outbound channel.
    pub fn register(&self, conn: ConnectionId, sender: mpsc::Sender<ServerMessage>) {
        let mut channels = self.channels.write().unwrap_or_else(|e| e.into_inner());
        channels.insert(conn, sender);
    }

    /// Drop a connection's outbound channel.
    pub fn unregister(&self, conn: ConnectionId) {
        let mut channels = self.channels.write().unwrap_or_else(|e| e.into_inner());
        channels.remove(&conn);
    }

    /// Number of registered connections.
    pub fn connection_count(&self) -> usize {
        self.channels.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl Broadcaster for ChannelBroadcaster {
    fn send(&self, to: ConnectionId, message: ServerMessage) {
        let channels = self.channels.read().unwrap_or_else(|e| e.into_inner());
        if let Some(sender) = channels.get(&to) {
            if sender.try_send(message).is_err() {
                debug!(%to, "skipping send to slow or closed connection");
            }
        } else {
            debug!(%to, "send to unregistered connection dropped");
        }
    }

    fn broadcast(&self, message: ServerMessage) {
        let channels = self.channels.read().unwrap_or_else(|e| e.into_inner());
        for (conn, sender) in channels.iter() {
            if sender.try_send(message.clone()).is_err() {
                debug!(%conn, "skipping broadcast to slow or closed connection");
            }
        }
    }

    fn broadcast_except(&self, except: ConnectionId, message: ServerMessage) {
        let channels = self.channels.read().unwrap_or_else(|e| e.into_inner());
        for (conn, sender) in channels.iter() {
            if *conn == except {
                continue;
            }
            if sender.try_send(message.clone()).is_err() {
                debug!(%conn, "skipping broadcast to slow or closed connection");
            }
        }
    }
}

impl Default for ChannelBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unicast_reaches_only_the_target() {
        let broadcaster = ChannelBroadcaster::new();
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        let (tx_a, mut rx_a) = mpsc::channel(4);
        let (tx_b, mut rx_b) = mpsc::channel(4);
        broadcaster.register(a, tx_a);
        broadcaster.register(b, tx_b);

        broadcaster.send(a, ServerMessage::TeardownNotice);

        assert!(matches!(rx_a.try_recv(), Ok(ServerMessage::TeardownNotice)));
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn broadcast_reaches_everyone() {
        let broadcaster = ChannelBroadcaster::new();
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        let (tx_a, mut rx_a) = mpsc::channel(4);
        let (tx_b, mut rx_b) = mpsc::channel(4);
        broadcaster.register(a, tx_a);
        broadcaster.register(b, tx_b);

        broadcaster.broadcast(ServerMessage::Shutdown {
            reason: "bye".into(),
        });

        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_ok());
    }

    #[tokio::test]
    async fn broadcast_except_skips_the_excluded_connection() {
        let broadcaster = ChannelBroadcaster::new();
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        let (tx_a, mut rx_a) = mpsc::channel(4);
        let (tx_b, mut rx_b) = mpsc::channel(4);
        broadcaster.register(a, tx_a);
        broadcaster.register(b, tx_b);

        broadcaster.broadcast_except(a, ServerMessage::TeardownNotice);

        assert!(rx_a.try_recv().is_err());
        assert!(rx_b.try_recv().is_ok());
    }

    #[tokio::test]
    async fn full_channel_is_skipped_not_blocked() {
        let broadcaster = ChannelBroadcaster::new();
        let a = ConnectionId::new();
        let (tx, _rx) = mpsc::channel(1);
        broadcaster.register(a, tx);

        broadcaster.send(a, ServerMessage::TeardownNotice);
        // Channel now full; this must drop silently rather than block.
        broadcaster.send(a, ServerMessage::TeardownNotice);
    }

    #[tokio::test]
    async fn unregistered_connection_is_ignored() {
        let broadcaster = ChannelBroadcaster::new();
        let a = ConnectionId::new();
        let (tx, mut rx) = mpsc::channel(4);
        broadcaster.register(a, tx);
        broadcaster.unregister(a);
        assert_eq!(broadcaster.connection_count(), 0);

        broadcaster.send(a, ServerMessage::TeardownNotice);
        assert!(rx.try_recv().is_err());
    }
}
