//! Session Lifecycle Coordination
//!
//! Binds the role registry, the move arbiter, and the signaling relay
//! together per connection: a connect gets a role, inbound messages are
//! dispatched to the right component, and a disconnect releases the slot
//! and tears the peer negotiation down for whoever is left.
//!
//! All game-state reads and writes go through one lock, so a move's
//! validate-then-commit is a single atomic step; the relay serializes
//! per pairing on its own.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::game::arbiter::{MoveArbiter, MoveOutcome};
use crate::game::position::GamePosition;
use crate::game::role::{ConnectionId, Role, RoleRegistry, Slot};
use crate::game::rules::{MoveRequest, RulesEngine};
use crate::network::broadcaster::Broadcaster;
use crate::network::protocol::{
    ChatRequest, ClientMessage, ServerMessage, ServerWarning, SignalEnvelope, WarningCode,
};
use crate::signaling::relay::{RelayEffect, SignalingRelay};

/// Chat line cap the reference client enforces; the server backs it up.
pub const DEFAULT_CHAT_TEXT_LIMIT: usize = 200;

/// Which negotiation message a signal envelope arrived as.
enum SignalKind {
    Offer,
    Answer,
    Candidate,
}

/// Role slots plus the authoritative position, guarded together so a
/// turn check can never race a commit.
struct CoreState {
    roles: RoleRegistry,
    position: GamePosition,
}

/// The session coordinator: one per process, shared across connections.
pub struct GameCoordinator {
    state: Mutex<CoreState>,
    relay: SignalingRelay,
    arbiter: MoveArbiter,
    broadcaster: Arc<dyn Broadcaster>,
    chat_text_limit: usize,
}

impl GameCoordinator {
    /// Create a coordinator over a fresh game.
    ///
    /// The rules engine supplies the starting position; the broadcaster
    /// is the only way anything leaves this struct.
    pub fn new(rules: Arc<dyn RulesEngine>, broadcaster: Arc<dyn Broadcaster>) -> Self {
        let position = rules.initial_position();
        Self {
            state: Mutex::new(CoreState {
                roles: RoleRegistry::new(),
                position,
            }),
            relay: SignalingRelay::new(),
            arbiter: MoveArbiter::new(rules),
            broadcaster,
            chat_text_limit: DEFAULT_CHAT_TEXT_LIMIT,
        }
    }

    /// Override the chat text limit.
    pub fn with_chat_text_limit(mut self, limit: usize) -> Self {
        self.chat_text_limit = limit;
        self
    }

    /// A new connection arrived: assign a role and notify.
    ///
    /// Players get their role; observers get the role notification with
    /// a position snapshot so late joiners render correct state
    /// immediately. Slot claims also go out to everyone at the board.
    pub async fn handle_connect(&self, conn: ConnectionId) {
        let (role, snapshot) = {
            let mut state = self.state.lock().await;
            let role = state.roles.assign(conn);
            (role, state.position.clone())
        };

        match role {
            Role::Player(slot) => {
                info!(%conn, ?slot, "player connected");
                self.broadcaster
                    .send(conn, ServerMessage::RoleAssigned { role });
                self.broadcaster
                    .broadcast(ServerMessage::PeerJoined { slot });
            }
            Role::Observer => {
                info!(%conn, "observer connected");
                self.broadcaster
                    .send(conn, ServerMessage::ObserverAssigned { position: snapshot });
            }
        }
    }

    /// A connection went away: release its slot and tear down signaling.
    ///
    /// Disconnect is the only cancellation signal: the slot, any live
    /// session, and its buffered candidates are all cleaned up in this
    /// one pass. The vacated slot waits for the next new connection;
    /// observers are never promoted into it.
    pub async fn handle_disconnect(&self, conn: ConnectionId) {
        let (released, counterpart) = {
            let mut state = self.state.lock().await;
            let counterpart = state.roles.counterpart_of(conn);
            (state.roles.release(conn), counterpart)
        };

        let effects = self.relay.teardown(conn).await;
        let session_notified = effects
            .iter()
            .any(|effect| matches!(effect, RelayEffect::TeardownNotice { .. }));
        self.apply_effects(effects);

        let Some(slot) = released else {
            debug!(%conn, "observer disconnected");
            return;
        };

        info!(%conn, ?slot, "player disconnected, slot vacated");
        if let Some(counterpart) = counterpart {
            // The counterpart learns its peer is gone even when no
            // negotiation session was live at that moment.
            if !session_notified {
                self.broadcaster.send(counterpart, ServerMessage::TeardownNotice);
            }
        }
        self.broadcaster.broadcast(ServerMessage::PeerLeft { slot });
    }

    /// Dispatch one inbound message.
    pub async fn handle_message(&self, conn: ConnectionId, message: ClientMessage) {
        match message {
            ClientMessage::Move(request) => self.handle_move(conn, request).await,
            ClientMessage::Offer(envelope) => {
                self.handle_signal(conn, envelope, SignalKind::Offer).await
            }
            ClientMessage::Answer(envelope) => {
                self.handle_signal(conn, envelope, SignalKind::Answer).await
            }
            ClientMessage::Candidate(envelope) => {
                self.handle_signal(conn, envelope, SignalKind::Candidate).await
            }
            ClientMessage::Teardown => {
                let effects = self.relay.teardown(conn).await;
                self.apply_effects(effects);
            }
            ClientMessage::Chat(chat) => self.handle_chat(conn, chat).await,
            ClientMessage::Ping { timestamp } => {
                self.broadcaster.send(
                    conn,
                    ServerMessage::Pong {
                        timestamp,
                        server_time: Utc::now().timestamp_millis() as u64,
                    },
                );
            }
        }
    }

    async fn handle_move(&self, conn: ConnectionId, request: MoveRequest) {
        let outcome = {
            let mut state = self.state.lock().await;
            let CoreState { roles, position } = &mut *state;
            self.arbiter.submit_move(roles, position, conn, request)
        };

        match outcome {
            MoveOutcome::Accepted { request, position } => {
                info!(%conn, from = %request.from, to = %request.to, "move accepted");
                self.broadcaster
                    .broadcast(ServerMessage::MoveBroadcast(request));
                self.broadcaster
                    .broadcast(ServerMessage::PositionBroadcast { position });
            }
            MoveOutcome::Rejected { reason, request } => {
                debug!(%conn, ?reason, "move rejected");
                self.broadcaster
                    .send(conn, ServerMessage::MoveRejected { reason, request });
            }
        }
    }

    async fn handle_signal(
        &self,
        conn: ConnectionId,
        envelope: SignalEnvelope,
        kind: SignalKind,
    ) {
        if let Err(err) = envelope.validate() {
            warn!(%conn, %err, "dropping malformed signaling payload");
            self.broadcaster.send(
                conn,
                ServerMessage::Warning(ServerWarning {
                    code: WarningCode::MalformedSignalingPayload,
                    message: err.to_string(),
                }),
            );
            return;
        }

        let (slot, counterpart) = {
            let state = self.state.lock().await;
            (state.roles.slot_of(conn), state.roles.counterpart_of(conn))
        };

        let Some(slot) = slot else {
            debug!(%conn, "dropping signaling message from a connection without a slot");
            return;
        };
        if let Some(hint) = envelope.sender_slot_hint {
            if hint != slot {
                warn!(%conn, ?hint, ?slot, "slot hint disagrees with held slot; routing by held slot");
            }
        }
        let Some(counterpart) = counterpart else {
            debug!(%conn, "no counterpart connected, dropping signaling message");
            return;
        };

        let payload = envelope.payload;
        let effects = match kind {
            SignalKind::Offer => self.relay.offer(conn, counterpart, payload).await,
            SignalKind::Answer => self.relay.answer(conn, counterpart, payload).await,
            SignalKind::Candidate => self.relay.candidate(conn, counterpart, payload).await,
        };
        self.apply_effects(effects);
    }

    async fn handle_chat(&self, conn: ConnectionId, chat: ChatRequest) {
        let slot = { self.state.lock().await.roles.slot_of(conn) };
        let Some(slot) = slot else {
            debug!(%conn, "dropping chat from a connection without a slot");
            return;
        };

        if chat.text.chars().count() > self.chat_text_limit {
            self.broadcaster.send(
                conn,
                ServerMessage::Warning(ServerWarning {
                    code: WarningCode::ChatTooLong,
                    message: format!(
                        "chat messages are limited to {} characters",
                        self.chat_text_limit
                    ),
                }),
            );
            return;
        }

        // The sender's client already rendered the line locally.
        self.broadcaster.broadcast_except(
            conn,
            ServerMessage::ChatBroadcast {
                text: chat.text,
                slot,
                timestamp: Utc::now().timestamp_millis(),
            },
        );
    }

    fn apply_effects(&self, effects: Vec<RelayEffect>) {
        for effect in effects {
            let (to, message) = match effect {
                RelayEffect::ForwardOffer { to, payload } => {
                    (to, ServerMessage::OfferForwarded { payload })
                }
                RelayEffect::ForwardAnswer { to, payload } => {
                    (to, ServerMessage::AnswerForwarded { payload })
                }
                RelayEffect::ForwardCandidate { to, payload } => {
                    (to, ServerMessage::CandidateForwarded { payload })
                }
                RelayEffect::TeardownNotice { to } => (to, ServerMessage::TeardownNotice),
            };
            self.broadcaster.send(to, message);
        }
    }

    /// Record that the paired peers report their direct link up. This is
    /// a transport-layer signal, not relayed content.
    pub async fn mark_established(&self, conn: ConnectionId) {
        if let Err(err) = self.relay.mark_established(conn).await {
            debug!(%conn, %err, "establish signal ignored");
        }
    }

    /// Snapshot of the authoritative position.
    pub async fn position(&self) -> GamePosition {
        self.state.lock().await.position.clone()
    }

    /// The slot held by `conn`, if any.
    pub async fn slot_of(&self, conn: ConnectionId) -> Option<Slot> {
        self.state.lock().await.roles.slot_of(conn)
    }
}
