//! Answer admission: the lock set and the verdicts it produces.
//!
//! An [`AnswerLock`] is the key `(session, participant)`. Admitting an
//! answer acquires its key; a second answer under a held key is a
//! duplicate no matter how or when it arrived. Combined with the duel
//! rule "first admitted answer resolves the session", this gives at most
//! one resolving answer per session under any delivery order.

use std::collections::HashSet;

use geoduel_protocol::{AnswerRecord, PlayerId, RejectReason, ServerEvent, SessionId};

use crate::ClosedSession;

/// Exclusivity key of one participant's answer in one session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AnswerLock {
    pub session_id: SessionId,
    pub participant: PlayerId,
}

/// The set of held answer locks across all sessions.
#[derive(Debug, Default)]
pub struct AnswerLocks {
    held: HashSet<AnswerLock>,
}

impl AnswerLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the lock for `(session_id, participant)`.
    ///
    /// Returns `false` if it was already held.
    pub fn try_acquire(&mut self, session_id: SessionId, participant: &PlayerId) -> bool {
        self.held.insert(AnswerLock {
            session_id,
            participant: participant.clone(),
        })
    }

    pub fn is_held(&self, session_id: SessionId, participant: &PlayerId) -> bool {
        self.held.contains(&AnswerLock {
            session_id,
            participant: participant.clone(),
        })
    }

    /// Drops every lock of a finished session. Returns how many were held.
    pub fn release_session(&mut self, session_id: SessionId) -> usize {
        let before = self.held.len();
        self.held.retain(|lock| lock.session_id != session_id);
        before - self.held.len()
    }

    pub fn len(&self) -> usize {
        self.held.len()
    }

    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }
}

/// The result of submitting an answer.
#[derive(Debug, Clone)]
pub enum AnswerVerdict {
    /// Admitted, and it ended the session (duel mode).
    AcceptedResolving {
        answer: AnswerRecord,
        closed: Box<ClosedSession>,
    },
    /// Admitted and recorded; the session stays open (broadcast mode).
    AcceptedRecorded { answer: AnswerRecord },
    /// This participant already answered.
    RejectedDuplicateOrLocked,
    /// Unknown session, or no longer `Active`.
    RejectedSessionNotActive,
    /// The sender is not part of this session.
    RejectedNotParticipant,
}

impl AnswerVerdict {
    pub fn is_accepted(&self) -> bool {
        matches!(
            self,
            Self::AcceptedResolving { .. } | Self::AcceptedRecorded { .. }
        )
    }

    /// The admitted answer, if any.
    pub fn answer(&self) -> Option<&AnswerRecord> {
        match self {
            Self::AcceptedResolving { answer, .. } | Self::AcceptedRecorded { answer } => {
                Some(answer)
            }
            _ => None,
        }
    }

    pub fn reject_reason(&self) -> Option<RejectReason> {
        match self {
            Self::RejectedDuplicateOrLocked => Some(RejectReason::DuplicateOrLocked),
            Self::RejectedSessionNotActive => Some(RejectReason::SessionNotActive),
            Self::RejectedNotParticipant => Some(RejectReason::NotParticipant),
            Self::AcceptedResolving { .. } | Self::AcceptedRecorded { .. } => None,
        }
    }

    /// The reply owed to the submitter.
    pub fn reply(&self, session_id: SessionId) -> ServerEvent {
        match self.reject_reason() {
            Some(reason) => ServerEvent::AnswerRejected { session_id, reason },
            None => ServerEvent::AnswerAccepted {
                session_id,
                resolving: matches!(self, Self::AcceptedResolving { .. }),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_acquire_second_attempt_same_key_fails() {
        let mut locks = AnswerLocks::new();
        let p = PlayerId::new("p1");

        assert!(locks.try_acquire(SessionId(1), &p));
        assert!(!locks.try_acquire(SessionId(1), &p));
        assert!(locks.is_held(SessionId(1), &p));
    }

    #[test]
    fn test_try_acquire_keys_are_per_session_and_participant() {
        let mut locks = AnswerLocks::new();

        assert!(locks.try_acquire(SessionId(1), &PlayerId::new("p1")));
        assert!(locks.try_acquire(SessionId(1), &PlayerId::new("p2")));
        assert!(locks.try_acquire(SessionId(2), &PlayerId::new("p1")));
        assert_eq!(locks.len(), 3);
    }

    #[test]
    fn test_release_session_drops_only_that_session() {
        let mut locks = AnswerLocks::new();
        locks.try_acquire(SessionId(1), &PlayerId::new("p1"));
        locks.try_acquire(SessionId(1), &PlayerId::new("p2"));
        locks.try_acquire(SessionId(2), &PlayerId::new("p1"));

        assert_eq!(locks.release_session(SessionId(1)), 2);
        assert_eq!(locks.len(), 1);
        assert!(locks.is_held(SessionId(2), &PlayerId::new("p1")));
    }

    #[test]
    fn test_verdict_reply_maps_rejections_to_reasons() {
        let sid = SessionId(3);
        assert_eq!(
            AnswerVerdict::RejectedSessionNotActive.reply(sid),
            ServerEvent::AnswerRejected {
                session_id: sid,
                reason: RejectReason::SessionNotActive
            }
        );
        assert_eq!(
            AnswerVerdict::RejectedDuplicateOrLocked.reject_reason(),
            Some(RejectReason::DuplicateOrLocked)
        );
        assert_eq!(
            AnswerVerdict::RejectedNotParticipant.reject_reason(),
            Some(RejectReason::NotParticipant)
        );
    }

    #[test]
    fn test_verdict_recorded_reply_is_accepted_not_resolving() {
        let verdict = AnswerVerdict::AcceptedRecorded {
            answer: AnswerRecord {
                participant: PlayerId::new("p1"),
                team: geoduel_protocol::Team::A,
                label: "a".into(),
                submitted_at: 1,
                correct: true,
            },
        };

        assert!(verdict.is_accepted());
        assert_eq!(
            verdict.reply(SessionId(4)),
            ServerEvent::AnswerAccepted {
                session_id: SessionId(4),
                resolving: false
            }
        );
    }
}
