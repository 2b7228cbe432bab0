//! Signaling Relay
//!
//! Owns the per-pairing negotiation sessions and turns inbound signaling
//! traffic into forwarding effects. The relay never reads payload
//! contents; it only moves validated envelopes between counterparts and
//! tears sessions down when a participant leaves.
//!
//! Each pairing has its own lock, so independent pairings proceed fully
//! in parallel; the shared map is only touched to look sessions up.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::game::role::ConnectionId;
use crate::signaling::session::{
    CandidateRouting, NegotiationPhase, SignalingError, SignalingSession,
};

/// Unordered pair of participant connections, used as the session key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PairKey(ConnectionId, ConnectionId);

impl PairKey {
    fn new(a: ConnectionId, b: ConnectionId) -> Self {
        if a <= b {
            Self(a, b)
        } else {
            Self(b, a)
        }
    }

    fn involves(&self, conn: ConnectionId) -> bool {
        self.0 == conn || self.1 == conn
    }
}

/// Outbound consequence of a relay operation. The lifecycle manager maps
/// these onto wire messages; the relay itself stays transport-agnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayEffect {
    /// Deliver an offer payload to the counterpart.
    ForwardOffer {
        /// Destination connection.
        to: ConnectionId,
        /// Verbatim payload.
        payload: String,
    },
    /// Deliver an answer payload to the offer's originator.
    ForwardAnswer {
        /// Destination connection.
        to: ConnectionId,
        /// Verbatim payload.
        payload: String,
    },
    /// Deliver a network-path candidate to the counterpart.
    ForwardCandidate {
        /// Destination connection.
        to: ConnectionId,
        /// Verbatim payload.
        payload: String,
    },
    /// Tell the surviving participant its peer session is gone.
    TeardownNotice {
        /// The survivor.
        to: ConnectionId,
    },
}

/// Forwards negotiation messages between paired connections.
pub struct SignalingRelay {
    sessions: RwLock<HashMap<PairKey, Arc<Mutex<SignalingSession>>>>,
}

impl SignalingRelay {
    /// Create a relay with no active sessions.
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    async fn get_or_create(
        &self,
        from: ConnectionId,
        to: ConnectionId,
    ) -> Arc<Mutex<SignalingSession>> {
        let key = PairKey::new(from, to);
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(SignalingSession::new(from, to))))
            .clone()
    }

    async fn find_involving(
        &self,
        conn: ConnectionId,
    ) -> Option<Arc<Mutex<SignalingSession>>> {
        let sessions = self.sessions.read().await;
        sessions
            .iter()
            .find(|(key, _)| key.involves(conn))
            .map(|(_, session)| session.clone())
    }

    /// Relay an offer from `from` towards `to`.
    ///
    /// Creates a fresh session for the pairing when none is live; a
    /// previous teardown leaves nothing behind, so renegotiation after a
    /// teardown starts clean here.
    pub async fn offer(
        &self,
        from: ConnectionId,
        to: ConnectionId,
        payload: String,
    ) -> Vec<RelayEffect> {
        let session = self.get_or_create(from, to).await;
        let mut session = session.lock().await;
        match session.record_offer(from) {
            Ok(dest) => {
                debug!(%from, to = %dest, "relaying offer");
                vec![RelayEffect::ForwardOffer { to: dest, payload }]
            }
            Err(err) => {
                warn!(%from, %err, "dropping offer");
                Vec::new()
            }
        }
    }

    /// Relay an answer from `from` towards `to`, flushing any buffered
    /// candidates in arrival order once the answer has gone through.
    pub async fn answer(
        &self,
        from: ConnectionId,
        to: ConnectionId,
        payload: String,
    ) -> Vec<RelayEffect> {
        let key = PairKey::new(from, to);
        let session = {
            let sessions = self.sessions.read().await;
            sessions.get(&key).cloned()
        };
        let Some(session) = session else {
            debug!(%from, "dropping answer with no active session");
            return Vec::new();
        };

        let mut session = session.lock().await;
        match session.record_answer(from) {
            Ok((dest, flushed)) => {
                debug!(%from, to = %dest, buffered = flushed.len(), "relaying answer");
                let mut effects = vec![RelayEffect::ForwardAnswer { to: dest, payload }];
                for candidate in flushed {
                    // A buffer entry goes to its own sender's counterpart.
                    match session.counterpart(candidate.from) {
                        Ok(dest) => effects.push(RelayEffect::ForwardCandidate {
                            to: dest,
                            payload: candidate.payload,
                        }),
                        Err(err) => warn!(%err, "buffered candidate lost its session"),
                    }
                }
                effects
            }
            Err(err) => {
                warn!(%from, %err, "dropping answer");
                Vec::new()
            }
        }
    }

    /// Relay a candidate from `from` towards `to`.
    ///
    /// A candidate may arrive before any offer; that creates the session
    /// in its idle phase and buffers the candidate for the later flush.
    pub async fn candidate(
        &self,
        from: ConnectionId,
        to: ConnectionId,
        payload: String,
    ) -> Vec<RelayEffect> {
        let session = self.get_or_create(from, to).await;
        let mut session = session.lock().await;
        match session.record_candidate(from, payload) {
            Ok(CandidateRouting::Buffered) => {
                debug!(%from, "buffering candidate until descriptions are exchanged");
                Vec::new()
            }
            Ok(CandidateRouting::Forward { to, payload }) => {
                debug!(%from, %to, "relaying candidate");
                vec![RelayEffect::ForwardCandidate { to, payload }]
            }
            Err(err) => {
                warn!(%from, %err, "dropping candidate");
                Vec::new()
            }
        }
    }

    /// Tear down every session involving `conn`, notifying each survivor
    /// exactly once. Used for explicit teardown messages, disconnects,
    /// and failure signals alike; repeats find nothing and stay silent.
    pub async fn teardown(&self, conn: ConnectionId) -> Vec<RelayEffect> {
        let removed: Vec<Arc<Mutex<SignalingSession>>> = {
            let mut sessions = self.sessions.write().await;
            let keys: Vec<PairKey> = sessions
                .keys()
                .filter(|key| key.involves(conn))
                .copied()
                .collect();
            keys.iter().filter_map(|key| sessions.remove(key)).collect()
        };

        if removed.is_empty() {
            debug!(%conn, "teardown with no active session");
            return Vec::new();
        }

        let mut effects = Vec::new();
        for session in removed {
            let mut session = session.lock().await;
            if session.close() {
                if let Ok(survivor) = session.counterpart(conn) {
                    debug!(%conn, %survivor, "session torn down");
                    effects.push(RelayEffect::TeardownNotice { to: survivor });
                }
            }
        }
        effects
    }

    /// Record that the peers report their direct link established.
    pub async fn mark_established(&self, conn: ConnectionId) -> Result<(), SignalingError> {
        let session = self
            .find_involving(conn)
            .await
            .ok_or(SignalingError::SessionClosed)?;
        let mut session = session.lock().await;
        session.mark_established()
    }

    /// Phase of the session between `a` and `b`, if one is live.
    pub async fn phase_between(
        &self,
        a: ConnectionId,
        b: ConnectionId,
    ) -> Option<NegotiationPhase> {
        let session = {
            let sessions = self.sessions.read().await;
            sessions.get(&PairKey::new(a, b)).cloned()
        };
        match session {
            Some(session) => Some(session.lock().await.phase()),
            None => None,
        }
    }

    /// Number of live sessions.
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

impl Default for SignalingRelay {
    fn default() -> Self {
        Self::new()
    }
}
