//! Battle manager: owns every live session and arbitrates answers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use geoduel_protocol::{AnswerRecord, PlayerId, Question, SessionId, unix_millis};

use crate::{
    AnswerLocks, AnswerVerdict, BattleConfig, BattleError, BattleSession, ClosedSession, Ending,
    Participant, Participants, SessionState,
};

/// Counter for generating unique, creation-ordered session IDs.
static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Both players of a duel whose question is still being fetched.
///
/// While held, neither player can be matched again. Hand it back through
/// [`BattleManager::open_duel`] or [`BattleManager::release`].
#[derive(Debug)]
pub struct PairReservation {
    token: u64,
    players: [PlayerId; 2],
}

impl PairReservation {
    pub fn players(&self) -> &[PlayerId; 2] {
        &self.players
    }
}

/// Manages all live battle sessions.
///
/// Terminal sessions are removed as soon as they end, so every session
/// in `sessions` is `Active`. Each state-changing method that ends a
/// session returns a [`ClosedSession`] exactly once; callers turn it
/// into the terminal event.
///
/// The manager is plain data; the engine serializes access to it, which
/// makes every method here atomic with respect to the others.
pub struct BattleManager {
    config: BattleConfig,

    sessions: HashMap<SessionId, BattleSession>,

    /// Duellists of active duels. A player is in at most one duel.
    engaged: HashMap<PlayerId, SessionId>,

    /// Players reserved for a duel whose question is in flight, with the
    /// reservation token.
    pending: HashMap<PlayerId, u64>,
    next_token: u64,

    active_broadcast: Option<SessionId>,

    locks: AnswerLocks,
}

impl BattleManager {
    pub fn new(config: BattleConfig) -> Self {
        Self {
            config,
            sessions: HashMap::new(),
            engaged: HashMap::new(),
            pending: HashMap::new(),
            next_token: 1,
            active_broadcast: None,
            locks: AnswerLocks::new(),
        }
    }

    pub fn config(&self) -> &BattleConfig {
        &self.config
    }

    // -----------------------------------------------------------------
    // Engagement
    // -----------------------------------------------------------------

    /// Whether the player is in an active duel or reserved for one.
    pub fn is_engaged(&self, player_id: &PlayerId) -> bool {
        self.engaged.contains_key(player_id) || self.pending.contains_key(player_id)
    }

    /// The active duel a player is in.
    pub fn duel_of(&self, player_id: &PlayerId) -> Option<SessionId> {
        self.engaged.get(player_id).copied()
    }

    /// Reserves both players for a duel about to be created.
    ///
    /// # Errors
    /// [`BattleError::PlayerBusy`] if either player is already engaged.
    pub fn reserve_pair(
        &mut self,
        a: &PlayerId,
        b: &PlayerId,
    ) -> Result<PairReservation, BattleError> {
        for player in [a, b] {
            if self.is_engaged(player) {
                return Err(BattleError::PlayerBusy(player.clone()));
            }
        }
        let token = self.next_token;
        self.next_token += 1;
        self.pending.insert(a.clone(), token);
        self.pending.insert(b.clone(), token);
        tracing::debug!(a = %a, b = %b, token, "pair reserved");
        Ok(PairReservation {
            token,
            players: [a.clone(), b.clone()],
        })
    }

    /// Gives up a reservation; both players become eligible again.
    ///
    /// Entries that were already cleared (or re-reserved under another
    /// token) are left alone.
    pub fn release(&mut self, reservation: PairReservation) {
        for player in &reservation.players {
            if self.pending.get(player) == Some(&reservation.token) {
                self.pending.remove(player);
            }
        }
        tracing::debug!(token = reservation.token, "pair reservation released");
    }

    fn reservation_held(&self, reservation: &PairReservation) -> bool {
        reservation
            .players
            .iter()
            .all(|p| self.pending.get(p) == Some(&reservation.token))
    }

    // -----------------------------------------------------------------
    // Creation
    // -----------------------------------------------------------------

    /// Opens a duel for a reserved pair.
    ///
    /// # Errors
    /// - [`BattleError::ReservationLost`] — a player left while the
    ///   question was being fetched
    /// - [`BattleError::InvalidState`] — `participants` don't match the
    ///   reservation
    pub fn open_duel(
        &mut self,
        reservation: PairReservation,
        participants: [Participant; 2],
        question: Question,
    ) -> Result<BattleSession, BattleError> {
        let [a, b] = &reservation.players;
        if !self.reservation_held(&reservation) {
            let err = BattleError::ReservationLost(a.clone(), b.clone());
            self.release(reservation);
            return Err(err);
        }
        let matches_reservation = participants
            .iter()
            .all(|p| reservation.players.contains(&p.player_id))
            && participants[0].player_id != participants[1].player_id;
        if !matches_reservation {
            let err = BattleError::InvalidState(format!(
                "duel participants do not match reservation of {a} and {b}"
            ));
            self.release(reservation);
            return Err(err);
        }

        for player in &reservation.players {
            self.pending.remove(player);
        }

        let session = self.insert_session(
            Participants::Duel(participants),
            question,
            self.config.duel_budget,
            None,
        );
        for player in &reservation.players {
            self.engaged.insert(player.clone(), session.id);
        }
        tracing::info!(
            session_id = %session.id,
            a = %a,
            b = %b,
            "duel started"
        );
        Ok(session)
    }

    /// Opens a broadcast put to every connected player.
    ///
    /// # Errors
    /// [`BattleError::BroadcastAlreadyActive`] while another broadcast runs.
    pub fn open_broadcast(
        &mut self,
        question: Question,
        initiator: Option<String>,
    ) -> Result<BattleSession, BattleError> {
        if let Some(active) = self.active_broadcast {
            return Err(BattleError::BroadcastAlreadyActive(active));
        }
        let session = self.insert_session(
            Participants::Broadcast,
            question,
            self.config.broadcast_budget,
            initiator,
        );
        self.active_broadcast = Some(session.id);
        tracing::info!(
            session_id = %session.id,
            initiator = session.initiator.as_deref().unwrap_or("-"),
            "broadcast started"
        );
        Ok(session)
    }

    fn insert_session(
        &mut self,
        participants: Participants,
        question: Question,
        time_budget: Duration,
        initiator: Option<String>,
    ) -> BattleSession {
        let id = SessionId(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed));
        let session = BattleSession {
            id,
            question,
            participants,
            started_at: Instant::now(),
            started_at_ms: unix_millis(),
            time_budget,
            state: SessionState::Active,
            answers: Vec::new(),
            initiator,
        };
        self.sessions.insert(id, session.clone());
        session
    }

    // -----------------------------------------------------------------
    // Arbitration
    // -----------------------------------------------------------------

    /// Submits `answerer`'s answer to a session.
    ///
    /// Steps, all under the caller's exclusive access:
    ///
    /// 1. Unknown or non-active session → `RejectedSessionNotActive`
    /// 2. Answerer not a participant → `RejectedNotParticipant`
    /// 3. Lock `(session, answerer)` already held → `RejectedDuplicateOrLocked`
    /// 4. Acquire the lock and record the answer
    /// 5. Duel: the session resolves on this answer. Broadcast: it stays open.
    pub fn submit_answer(
        &mut self,
        session_id: SessionId,
        answerer: &Participant,
        label: &str,
        submitted_at: Option<u64>,
    ) -> AnswerVerdict {
        let Some(session) = self.sessions.get_mut(&session_id) else {
            return AnswerVerdict::RejectedSessionNotActive;
        };
        if !session.is_active() {
            return AnswerVerdict::RejectedSessionNotActive;
        }
        if !session.participants.includes(&answerer.player_id) {
            return AnswerVerdict::RejectedNotParticipant;
        }
        if !self.locks.try_acquire(session_id, &answerer.player_id) {
            tracing::debug!(%session_id, player_id = %answerer.player_id, "duplicate answer");
            return AnswerVerdict::RejectedDuplicateOrLocked;
        }

        let label = session.question.canonical_label(label);
        let answer = AnswerRecord {
            participant: answerer.player_id.clone(),
            team: answerer.team,
            correct: session.question.is_correct(&label),
            label,
            submitted_at: submitted_at.unwrap_or_else(unix_millis),
        };
        session.answers.push(answer.clone());

        if matches!(session.participants, Participants::Broadcast) {
            return AnswerVerdict::AcceptedRecorded { answer };
        }
        let Some(outcome) = session.duel_outcome(&answer) else {
            return AnswerVerdict::RejectedNotParticipant;
        };
        match self.finish(session_id, SessionState::Resolved, Ending::Resolved(outcome)) {
            Some(closed) => AnswerVerdict::AcceptedResolving {
                answer,
                closed: Box::new(closed),
            },
            None => AnswerVerdict::RejectedSessionNotActive,
        }
    }

    // -----------------------------------------------------------------
    // Termination
    // -----------------------------------------------------------------

    /// Cancels an active session. Idempotent: returns `None` if the
    /// session is already gone.
    pub fn cancel(&mut self, session_id: SessionId, reason: &str) -> Option<ClosedSession> {
        self.finish(
            session_id,
            SessionState::Cancelled,
            Ending::Cancelled {
                reason: reason.to_string(),
            },
        )
    }

    /// Cancels the duel `player_id` is in and drops any reservation they
    /// hold. Broadcasts are unaffected.
    pub fn cancel_for_player(
        &mut self,
        player_id: &PlayerId,
        reason: &str,
    ) -> Option<ClosedSession> {
        if let Some(token) = self.pending.remove(player_id) {
            // The partner stays reserved until the fetch returns and
            // `open_duel` notices the reservation is broken.
            tracing::debug!(%player_id, token, "pending reservation dropped");
        }
        let session_id = self.duel_of(player_id)?;
        self.cancel(session_id, reason)
    }

    /// Expires one session if it is still active.
    ///
    /// Duels expire without a winner; broadcasts expire with their
    /// aggregate statistics.
    pub fn expire(&mut self, session_id: SessionId) -> Option<ClosedSession> {
        let outcome = self.sessions.get(&session_id)?.expiry_outcome();
        self.finish(session_id, SessionState::Expired, Ending::Expired(outcome))
    }

    /// Expires every active session older than its budget × the grace
    /// multiplier, oldest first.
    pub fn expire_overdue(&mut self, now: Instant) -> Vec<ClosedSession> {
        let grace = self.config.grace_multiplier.max(1.0);
        let mut overdue: Vec<SessionId> = self
            .sessions
            .values()
            .filter(|s| s.is_active() && s.is_overdue(now, grace))
            .map(|s| s.id)
            .collect();
        overdue.sort();
        overdue
            .into_iter()
            .filter_map(|id| self.expire(id))
            .collect()
    }

    /// Ends an active broadcast now, as `Resolved`, with its aggregate
    /// statistics.
    ///
    /// # Errors
    /// - [`BattleError::SessionNotFound`] — no such live session
    /// - [`BattleError::NotABroadcast`] — the session is a duel
    pub fn end_broadcast(&mut self, session_id: SessionId) -> Result<ClosedSession, BattleError> {
        let session = self
            .sessions
            .get(&session_id)
            .ok_or(BattleError::SessionNotFound(session_id))?;
        if !matches!(session.participants, Participants::Broadcast) {
            return Err(BattleError::NotABroadcast(session_id));
        }
        let outcome = session.expiry_outcome();
        self.finish(session_id, SessionState::Resolved, Ending::Resolved(outcome))
            .ok_or(BattleError::SessionNotFound(session_id))
    }

    /// Moves a session into `state`, removes it, and releases everything
    /// it held. Returns `None` if it was already gone or terminal.
    fn finish(
        &mut self,
        session_id: SessionId,
        state: SessionState,
        ending: Ending,
    ) -> Option<ClosedSession> {
        let mut session = self.sessions.remove(&session_id)?;
        if let Err(e) = session.transition(state) {
            tracing::warn!(%session_id, error = %e, "dropping session in unexpected state");
            return None;
        }

        self.locks.release_session(session_id);
        if let Participants::Duel(pair) = &session.participants {
            for p in pair {
                if self.engaged.get(&p.player_id) == Some(&session_id) {
                    self.engaged.remove(&p.player_id);
                }
            }
        }
        if self.active_broadcast == Some(session_id) {
            self.active_broadcast = None;
        }

        tracing::info!(
            %session_id,
            state = %session.state,
            answers = session.answers.len(),
            "battle finished"
        );
        Some(ClosedSession { session, ending })
    }

    // -----------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------

    pub fn session(&self, session_id: SessionId) -> Option<&BattleSession> {
        self.sessions.get(&session_id)
    }

    pub fn active_broadcast(&self) -> Option<SessionId> {
        self.active_broadcast
    }

    /// Number of live (active) sessions.
    pub fn active_count(&self) -> usize {
        self.sessions.len()
    }

    /// Ids of every live session.
    pub fn session_ids(&self) -> Vec<SessionId> {
        self.sessions.keys().copied().collect()
    }
}

impl Default for BattleManager {
    fn default() -> Self {
        Self::new(BattleConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use geoduel_protocol::{BattleOutcome, Team};
    use geoduel_transport::ConnectionId;

    fn participant(id: &str, team: Team, conn: u64) -> Participant {
        Participant {
            player_id: PlayerId::new(id),
            display_name: id.to_string(),
            team,
            connection: ConnectionId::new(conn),
        }
    }

    fn p1() -> Participant {
        participant("p1", Team::A, 1)
    }

    fn p2() -> Participant {
        participant("p2", Team::B, 2)
    }

    fn open_duel(mgr: &mut BattleManager) -> SessionId {
        let reservation = mgr
            .reserve_pair(&p1().player_id, &p2().player_id)
            .expect("both free");
        mgr.open_duel(reservation, [p1(), p2()], Question::sample())
            .expect("reservation held")
            .id
    }

    // =====================================================================
    // Reservation
    // =====================================================================

    #[test]
    fn test_reserve_pair_marks_both_engaged() {
        let mut mgr = BattleManager::default();

        let _r = mgr.reserve_pair(&p1().player_id, &p2().player_id).unwrap();

        assert!(mgr.is_engaged(&p1().player_id));
        assert!(mgr.is_engaged(&p2().player_id));
    }

    #[test]
    fn test_reserve_pair_busy_player_is_rejected() {
        let mut mgr = BattleManager::default();
        let _r = mgr.reserve_pair(&p1().player_id, &p2().player_id).unwrap();

        let third = PlayerId::new("p3");
        let result = mgr.reserve_pair(&third, &p2().player_id);

        assert!(matches!(result, Err(BattleError::PlayerBusy(p)) if p == p2().player_id));
        assert!(!mgr.is_engaged(&third), "failed reservation must not leak");
    }

    #[test]
    fn test_release_makes_players_eligible_again() {
        let mut mgr = BattleManager::default();
        let r = mgr.reserve_pair(&p1().player_id, &p2().player_id).unwrap();

        mgr.release(r);

        assert!(!mgr.is_engaged(&p1().player_id));
        assert!(mgr.reserve_pair(&p1().player_id, &p2().player_id).is_ok());
    }

    #[test]
    fn test_open_duel_after_player_left_fails_and_frees_partner() {
        let mut mgr = BattleManager::default();
        let r = mgr.reserve_pair(&p1().player_id, &p2().player_id).unwrap();

        assert!(mgr.cancel_for_player(&p1().player_id, "left").is_none());
        let result = mgr.open_duel(r, [p1(), p2()], Question::sample());

        assert!(matches!(result, Err(BattleError::ReservationLost(..))));
        assert!(!mgr.is_engaged(&p2().player_id));
        assert_eq!(mgr.active_count(), 0);
    }

    #[test]
    fn test_open_duel_moves_pair_from_pending_to_engaged() {
        let mut mgr = BattleManager::default();

        let id = open_duel(&mut mgr);

        assert_eq!(mgr.duel_of(&p1().player_id), Some(id));
        assert_eq!(mgr.duel_of(&p2().player_id), Some(id));
        assert!(mgr.session(id).unwrap().is_active());
    }

    #[test]
    fn test_session_ids_increase_with_creation_order() {
        let mut mgr = BattleManager::default();
        let first = open_duel(&mut mgr);
        let second = mgr.open_broadcast(Question::sample(), None).unwrap().id;

        assert!(second > first);
    }

    // =====================================================================
    // Arbitration
    // =====================================================================

    #[test]
    fn test_submit_answer_correct_first_answer_resolves_for_answerer() {
        let mut mgr = BattleManager::default();
        let id = open_duel(&mut mgr);

        let verdict = mgr.submit_answer(id, &p1(), "a", Some(1_000));

        let AnswerVerdict::AcceptedResolving { answer, closed } = verdict else {
            panic!("expected resolving verdict");
        };
        assert!(answer.correct);
        assert_eq!(closed.session.state, SessionState::Resolved);
        assert!(matches!(
            &closed.ending,
            Ending::Resolved(BattleOutcome::DuelResolved { winner, .. }) if *winner == p1().player_id
        ));
        assert!(mgr.session(id).is_none());
        assert!(!mgr.is_engaged(&p1().player_id));
        assert!(!mgr.is_engaged(&p2().player_id));
    }

    #[test]
    fn test_submit_answer_late_second_answer_is_session_not_active() {
        let mut mgr = BattleManager::default();
        let id = open_duel(&mut mgr);

        let first = mgr.submit_answer(id, &p1(), "a", Some(1_000));
        let late = mgr.submit_answer(id, &p2(), "b", Some(1_050));

        assert!(matches!(first, AnswerVerdict::AcceptedResolving { .. }));
        assert!(matches!(late, AnswerVerdict::RejectedSessionNotActive));
    }

    #[test]
    fn test_submit_answer_incorrect_first_answer_resolves_for_opponent() {
        let mut mgr = BattleManager::default();
        let id = open_duel(&mut mgr);

        let verdict = mgr.submit_answer(id, &p2(), "c", None);

        let AnswerVerdict::AcceptedResolving { closed, .. } = verdict else {
            panic!("expected resolving verdict");
        };
        assert!(matches!(
            closed.ending,
            Ending::Resolved(BattleOutcome::DuelResolved { winner, loser, .. })
                if winner == p1().player_id && loser == p2().player_id
        ));
    }

    #[test]
    fn test_submit_answer_any_interleaving_resolves_exactly_once() {
        let submissions = [
            (p1(), "a"),
            (p1(), "a"),
            (p2(), "b"),
            (p2(), "a"),
            (p1(), "d"),
        ];
        // Every rotation of the submission order.
        for start in 0..submissions.len() {
            let mut mgr = BattleManager::default();
            let id = open_duel(&mut mgr);

            let resolving = (0..submissions.len())
                .map(|i| &submissions[(start + i) % submissions.len()])
                .map(|(who, label)| mgr.submit_answer(id, who, label, None))
                .filter(|v| matches!(v, AnswerVerdict::AcceptedResolving { .. }))
                .count();

            assert_eq!(resolving, 1, "rotation {start}");
        }
    }

    #[test]
    fn test_submit_answer_outsider_is_not_participant() {
        let mut mgr = BattleManager::default();
        let id = open_duel(&mut mgr);

        let verdict = mgr.submit_answer(id, &participant("p9", Team::A, 9), "a", None);

        assert!(matches!(verdict, AnswerVerdict::RejectedNotParticipant));
        assert!(mgr.session(id).unwrap().is_active());
    }

    #[test]
    fn test_submit_answer_unknown_session_is_not_active() {
        let mut mgr = BattleManager::default();

        let verdict = mgr.submit_answer(SessionId(u64::MAX), &p1(), "a", None);

        assert!(matches!(verdict, AnswerVerdict::RejectedSessionNotActive));
    }

    #[test]
    fn test_submit_answer_broadcast_records_each_player_once() {
        let mut mgr = BattleManager::default();
        let id = mgr.open_broadcast(Question::sample(), None).unwrap().id;

        let first = mgr.submit_answer(id, &p1(), "a", None);
        let again = mgr.submit_answer(id, &p1(), "b", None);
        let other = mgr.submit_answer(id, &p2(), "b", None);

        assert!(matches!(first, AnswerVerdict::AcceptedRecorded { .. }));
        assert!(matches!(again, AnswerVerdict::RejectedDuplicateOrLocked));
        assert!(matches!(other, AnswerVerdict::AcceptedRecorded { .. }));
        assert_eq!(mgr.session(id).unwrap().answers.len(), 2);
    }

    // =====================================================================
    // Termination
    // =====================================================================

    #[test]
    fn test_cancel_is_idempotent() {
        let mut mgr = BattleManager::default();
        let id = open_duel(&mut mgr);

        let first = mgr.cancel(id, "test");
        let second = mgr.cancel(id, "test");

        assert_eq!(first.unwrap().session.state, SessionState::Cancelled);
        assert!(second.is_none());
    }

    #[test]
    fn test_cancel_for_player_cancels_their_duel_only() {
        let mut mgr = BattleManager::default();
        let duel = open_duel(&mut mgr);
        let broadcast = mgr.open_broadcast(Question::sample(), None).unwrap().id;

        let closed = mgr.cancel_for_player(&p2().player_id, "participant left").unwrap();

        assert_eq!(closed.id(), duel);
        assert!(matches!(closed.ending, Ending::Cancelled { ref reason } if reason == "participant left"));
        assert!(mgr.session(broadcast).is_some());
    }

    #[test]
    fn test_expire_overdue_respects_budget_and_grace() {
        let mut mgr = BattleManager::default();
        let id = open_duel(&mut mgr);
        let started = mgr.session(id).unwrap().started_at;

        // Within budget: never expired.
        assert!(mgr.expire_overdue(started + Duration::from_secs(29)).is_empty());
        // Past budget but within grace: the janitor leaves it for the deadline task.
        assert!(mgr.expire_overdue(started + Duration::from_secs(60)).is_empty());
        // Past budget × grace: always expired.
        let closed = mgr.expire_overdue(started + Duration::from_secs(61));
        assert_eq!(closed.len(), 1);
        assert!(matches!(
            closed[0].ending,
            Ending::Expired(BattleOutcome::DuelExpired { .. })
        ));
        assert!(!mgr.is_engaged(&p1().player_id));
    }

    #[test]
    fn test_expire_overdue_infinite_grace_never_expires() {
        let mut mgr = BattleManager::new(BattleConfig {
            grace_multiplier: f64::INFINITY,
            ..BattleConfig::default()
        });
        let id = open_duel(&mut mgr);
        let started = mgr.session(id).unwrap().started_at;

        assert!(mgr.expire_overdue(started + Duration::from_secs(3600)).is_empty());
        assert!(mgr.is_engaged(&p1().player_id));
    }

    #[test]
    fn test_expire_overdue_huge_budget_never_expires() {
        let mut mgr = BattleManager::new(BattleConfig {
            duel_budget: Duration::from_secs(u64::MAX),
            ..BattleConfig::default()
        });
        let id = open_duel(&mut mgr);
        let started = mgr.session(id).unwrap().started_at;

        assert!(mgr.expire_overdue(started + Duration::from_secs(3600)).is_empty());
        assert!(mgr.session(id).is_some());
    }

    #[test]
    fn test_broadcast_summary_counts_labels_case_insensitively() {
        let mut mgr = BattleManager::default();
        let id = mgr.open_broadcast(Question::sample(), None).unwrap().id;
        mgr.submit_answer(id, &p1(), "A", None);
        mgr.submit_answer(id, &p2(), " a", None);
        mgr.submit_answer(id, &participant("p3", Team::A, 3), "B", None);

        let summary = mgr.session(id).unwrap().broadcast_summary();

        assert_eq!(summary.label_counts.get("a"), Some(&2));
        assert_eq!(summary.label_counts.get("b"), Some(&1));
        assert_eq!(summary.label_counts.get("A"), None);
        assert_eq!(summary.teams[&Team::A].correct, 1);
        assert_eq!(summary.teams[&Team::B].correct, 1);
    }

    #[test]
    fn test_expire_broadcast_carries_summary() {
        let mut mgr = BattleManager::default();
        let id = mgr.open_broadcast(Question::sample(), None).unwrap().id;
        mgr.submit_answer(id, &p1(), "a", None);

        let closed = mgr.expire(id).unwrap();

        assert!(matches!(
            closed.ending,
            Ending::Expired(BattleOutcome::Broadcast(ref s)) if s.total_answers == 1
        ));
        assert_eq!(mgr.active_broadcast(), None);
    }

    #[test]
    fn test_open_broadcast_second_while_active_is_rejected() {
        let mut mgr = BattleManager::default();
        let id = mgr.open_broadcast(Question::sample(), None).unwrap().id;

        let result = mgr.open_broadcast(Question::sample(), None);

        assert!(matches!(result, Err(BattleError::BroadcastAlreadyActive(a)) if a == id));
    }

    #[test]
    fn test_end_broadcast_resolves_and_rejects_duels() {
        let mut mgr = BattleManager::default();
        let duel = open_duel(&mut mgr);
        let broadcast = mgr.open_broadcast(Question::sample(), None).unwrap().id;

        assert!(matches!(
            mgr.end_broadcast(duel),
            Err(BattleError::NotABroadcast(_))
        ));
        let closed = mgr.end_broadcast(broadcast).unwrap();
        assert_eq!(closed.session.state, SessionState::Resolved);
        assert!(matches!(
            mgr.end_broadcast(broadcast),
            Err(BattleError::SessionNotFound(_))
        ));
    }
}
