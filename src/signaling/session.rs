//! Negotiation Session State Machine
//!
//! One session per active pairing, driving the offer/answer/candidate
//! exchange between the two peers. Candidates that arrive before both
//! descriptions have been exchanged are buffered in arrival order and
//! flushed the moment the answer goes through.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::game::role::ConnectionId;

/// Where a session stands in the negotiation exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NegotiationPhase {
    /// Session exists but no description has been relayed yet.
    Idle,
    /// The offer went out to the counterpart.
    OfferSent,
    /// The answer came back; both sides hold a description.
    AnswerReceived,
    /// The peers report their direct link is up. Informational only.
    Connected,
    /// Torn down. Terminal; a fresh session handles any new offer.
    Closed,
}

/// A candidate held back until descriptions are exchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferedCandidate {
    /// Who sent it; the flush delivers to this side's counterpart.
    pub from: ConnectionId,
    /// Opaque candidate payload, forwarded verbatim.
    pub payload: String,
}

/// What to do with a freshly arrived candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateRouting {
    /// Held back; descriptions not yet exchanged.
    Buffered,
    /// Forward immediately to `to`.
    Forward {
        /// The counterpart the candidate goes to.
        to: ConnectionId,
        /// The payload, handed back for delivery.
        payload: String,
    },
}

/// Invalid transitions and routing mistakes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignalingError {
    /// Offer arrived while the session was past `Idle`.
    #[error("unexpected offer in {phase:?} phase")]
    UnexpectedOffer {
        /// Phase the session was in.
        phase: NegotiationPhase,
    },
    /// Answer arrived while the session was not awaiting one.
    #[error("unexpected answer in {phase:?} phase")]
    UnexpectedAnswer {
        /// Phase the session was in.
        phase: NegotiationPhase,
    },
    /// Answer came from someone other than the offer's counterpart.
    #[error("answer must come from the offer's counterpart")]
    AnswerFromWrongSide,
    /// The session was already torn down.
    #[error("session is closed")]
    SessionClosed,
    /// The connection is not one of the session's two participants.
    #[error("connection is not part of this session")]
    NotAParticipant,
    /// Establish signal before the answer went through.
    #[error("establish signal only valid once the answer has been relayed")]
    NotEstablishable,
}

/// Per-pairing negotiation state.
#[derive(Debug)]
pub struct SignalingSession {
    a: ConnectionId,
    b: ConnectionId,
    offerer: Option<ConnectionId>,
    phase: NegotiationPhase,
    buffered: VecDeque<BufferedCandidate>,
}

impl SignalingSession {
    /// Create an idle session between two participants.
    pub fn new(a: ConnectionId, b: ConnectionId) -> Self {
        Self {
            a,
            b,
            offerer: None,
            phase: NegotiationPhase::Idle,
            buffered: VecDeque::new(),
        }
    }

    /// Current phase.
    pub fn phase(&self) -> NegotiationPhase {
        self.phase
    }

    /// The other participant.
    pub fn counterpart(&self, conn: ConnectionId) -> Result<ConnectionId, SignalingError> {
        if conn == self.a {
            Ok(self.b)
        } else if conn == self.b {
            Ok(self.a)
        } else {
            Err(SignalingError::NotAParticipant)
        }
    }

    /// Record an offer from `from`. Returns who to forward it to.
    pub fn record_offer(&mut self, from: ConnectionId) -> Result<ConnectionId, SignalingError> {
        let to = self.counterpart(from)?;
        match self.phase {
            NegotiationPhase::Idle => {
                self.offerer = Some(from);
                self.phase = NegotiationPhase::OfferSent;
                Ok(to)
            }
            NegotiationPhase::Closed => Err(SignalingError::SessionClosed),
            phase => Err(SignalingError::UnexpectedOffer { phase }),
        }
    }

    /// Record the answer from the counterpart. Returns the offerer to
    /// forward it to, plus every buffered candidate in arrival order.
    pub fn record_answer(
        &mut self,
        from: ConnectionId,
    ) -> Result<(ConnectionId, Vec<BufferedCandidate>), SignalingError> {
        self.counterpart(from)?;
        match self.phase {
            NegotiationPhase::OfferSent => {
                let offerer = self.offerer.ok_or(SignalingError::UnexpectedAnswer {
                    phase: self.phase,
                })?;
                if from == offerer {
                    return Err(SignalingError::AnswerFromWrongSide);
                }
                self.phase = NegotiationPhase::AnswerReceived;
                Ok((offerer, self.buffered.drain(..).collect()))
            }
            NegotiationPhase::Closed => Err(SignalingError::SessionClosed),
            phase => Err(SignalingError::UnexpectedAnswer { phase }),
        }
    }

    /// Route a candidate: buffered until the answer has been relayed,
    /// forwarded immediately afterwards.
    pub fn record_candidate(
        &mut self,
        from: ConnectionId,
        payload: String,
    ) -> Result<CandidateRouting, SignalingError> {
        let to = self.counterpart(from)?;
        match self.phase {
            NegotiationPhase::Idle | NegotiationPhase::OfferSent => {
                self.buffered.push_back(BufferedCandidate { from, payload });
                Ok(CandidateRouting::Buffered)
            }
            NegotiationPhase::AnswerReceived | NegotiationPhase::Connected => {
                Ok(CandidateRouting::Forward { to, payload })
            }
            NegotiationPhase::Closed => Err(SignalingError::SessionClosed),
        }
    }

    /// Note that the peers report their direct link established.
    /// Informational; nothing is forwarded.
    pub fn mark_established(&mut self) -> Result<(), SignalingError> {
        match self.phase {
            NegotiationPhase::AnswerReceived => {
                self.phase = NegotiationPhase::Connected;
                Ok(())
            }
            NegotiationPhase::Connected => Ok(()),
            _ => Err(SignalingError::NotEstablishable),
        }
    }

    /// Tear the session down, discarding any buffered candidates.
    /// Returns false if it was already closed.
    pub fn close(&mut self) -> bool {
        if self.phase == NegotiationPhase::Closed {
            return false;
        }
        self.phase = NegotiationPhase::Closed;
        self.buffered.clear();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair() -> (ConnectionId, ConnectionId) {
        (ConnectionId::new(), ConnectionId::new())
    }

    #[test]
    fn offer_then_answer_reaches_answer_received() {
        let (a, b) = pair();
        let mut session = SignalingSession::new(a, b);

        assert_eq!(session.record_offer(a), Ok(b));
        assert_eq!(session.phase(), NegotiationPhase::OfferSent);

        let (to, flushed) = session.record_answer(b).unwrap();
        assert_eq!(to, a);
        assert!(flushed.is_empty());
        assert_eq!(session.phase(), NegotiationPhase::AnswerReceived);
    }

    #[test]
    fn either_participant_may_open_with_an_offer() {
        let (a, b) = pair();
        let mut session = SignalingSession::new(a, b);
        assert_eq!(session.record_offer(b), Ok(a));
        let (to, _) = session.record_answer(a).unwrap();
        assert_eq!(to, b);
    }

    #[test]
    fn answer_from_the_offerer_is_refused() {
        let (a, b) = pair();
        let mut session = SignalingSession::new(a, b);
        session.record_offer(a).unwrap();
        assert_eq!(session.record_answer(a), Err(SignalingError::AnswerFromWrongSide));
        assert_eq!(session.phase(), NegotiationPhase::OfferSent);
    }

    #[test]
    fn answer_without_offer_is_refused() {
        let (a, b) = pair();
        let mut session = SignalingSession::new(a, b);
        assert_eq!(
            session.record_answer(b),
            Err(SignalingError::UnexpectedAnswer {
                phase: NegotiationPhase::Idle
            })
        );
    }

    #[test]
    fn repeated_offer_is_an_invalid_transition() {
        let (a, b) = pair();
        let mut session = SignalingSession::new(a, b);
        session.record_offer(a).unwrap();
        assert_eq!(
            session.record_offer(a),
            Err(SignalingError::UnexpectedOffer {
                phase: NegotiationPhase::OfferSent
            })
        );
    }

    #[test]
    fn candidates_buffer_until_answer_then_flush_in_order() {
        let (a, b) = pair();
        let mut session = SignalingSession::new(a, b);

        // Before any description: buffered, not forwarded.
        assert_eq!(
            session.record_candidate(a, "cand-1".into()),
            Ok(CandidateRouting::Buffered)
        );
        session.record_offer(a).unwrap();
        assert_eq!(
            session.record_candidate(a, "cand-2".into()),
            Ok(CandidateRouting::Buffered)
        );
        assert_eq!(
            session.record_candidate(b, "cand-3".into()),
            Ok(CandidateRouting::Buffered)
        );

        let (_, flushed) = session.record_answer(b).unwrap();
        let payloads: Vec<_> = flushed.iter().map(|c| c.payload.as_str()).collect();
        assert_eq!(payloads, ["cand-1", "cand-2", "cand-3"]);
        assert_eq!(flushed[0].from, a);
        assert_eq!(flushed[2].from, b);

        // After the flush, candidates forward immediately.
        assert_eq!(
            session.record_candidate(a, "cand-4".into()),
            Ok(CandidateRouting::Forward {
                to: b,
                payload: "cand-4".into()
            })
        );
    }

    #[test]
    fn establish_only_after_answer() {
        let (a, b) = pair();
        let mut session = SignalingSession::new(a, b);
        assert_eq!(session.mark_established(), Err(SignalingError::NotEstablishable));

        session.record_offer(a).unwrap();
        session.record_answer(b).unwrap();
        assert_eq!(session.mark_established(), Ok(()));
        assert_eq!(session.phase(), NegotiationPhase::Connected);

        // Idempotent once connected.
        assert_eq!(session.mark_established(), Ok(()));
    }

    #[test]
    fn close_is_terminal_and_drops_buffer() {
        let (a, b) = pair();
        let mut session = SignalingSession::new(a, b);
        session.record_candidate(a, "cand".into()).unwrap();

        assert!(session.close());
        assert!(!session.close());
        assert_eq!(session.phase(), NegotiationPhase::Closed);
        assert_eq!(
            session.record_candidate(a, "late".into()),
            Err(SignalingError::SessionClosed)
        );
        assert_eq!(session.record_offer(a), Err(SignalingError::SessionClosed));
    }

    #[test]
    fn outsiders_are_rejected() {
        let (a, b) = pair();
        let mut session = SignalingSession::new(a, b);
        let stranger = ConnectionId::new();
        assert_eq!(session.record_offer(stranger), Err(SignalingError::NotAParticipant));
        assert_eq!(
            session.record_candidate(stranger, "cand".into()),
            Err(SignalingError::NotAParticipant)
        );
    }
}
