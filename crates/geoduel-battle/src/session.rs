//! Battle sessions and how they end.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use geoduel_protocol::{
    AnswerRecord, BattleMode, BattleOutcome, BroadcastSummary, PlayerId, Question, RosterEntry,
    ServerEvent, SessionId, Team, TeamTally,
};
use geoduel_transport::ConnectionId;

use crate::{BattleError, SessionState};

/// A player taking part in (or answering) a battle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub player_id: PlayerId,
    pub display_name: String,
    pub team: Team,
    pub connection: ConnectionId,
}

impl Participant {
    pub fn roster_entry(&self) -> RosterEntry {
        RosterEntry {
            player_id: self.player_id.clone(),
            display_name: self.display_name.clone(),
            team: self.team,
        }
    }
}

/// Who a session is put to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Participants {
    /// Exactly two opposing players.
    Duel([Participant; 2]),
    /// Every connected player, whoever they are at answer time.
    Broadcast,
}

impl Participants {
    pub fn mode(&self) -> BattleMode {
        match self {
            Self::Duel(_) => BattleMode::Duel,
            Self::Broadcast => BattleMode::Broadcast,
        }
    }

    /// Whether `player_id` may answer. Everyone may answer a broadcast.
    pub fn includes(&self, player_id: &PlayerId) -> bool {
        match self {
            Self::Duel(pair) => pair.iter().any(|p| &p.player_id == player_id),
            Self::Broadcast => true,
        }
    }

    /// The other duellist.
    pub fn opponent_of(&self, player_id: &PlayerId) -> Option<&Participant> {
        match self {
            Self::Duel([a, b]) if &a.player_id == player_id => Some(b),
            Self::Duel([a, b]) if &b.player_id == player_id => Some(a),
            _ => None,
        }
    }

    /// Both duellists' connections.
    pub fn connections(&self) -> Option<(ConnectionId, ConnectionId)> {
        match self {
            Self::Duel([a, b]) => Some((a.connection, b.connection)),
            Self::Broadcast => None,
        }
    }

    /// Roster entries of the duellists; empty for a broadcast.
    pub fn roster(&self) -> Vec<RosterEntry> {
        match self {
            Self::Duel(pair) => pair.iter().map(Participant::roster_entry).collect(),
            Self::Broadcast => Vec::new(),
        }
    }
}

/// One question put to a set of participants.
#[derive(Debug, Clone)]
pub struct BattleSession {
    pub id: SessionId,
    pub question: Question,
    pub participants: Participants,
    pub started_at: Instant,
    /// Wall-clock start, Unix milliseconds.
    pub started_at_ms: u64,
    pub time_budget: Duration,
    pub state: SessionState,
    /// Admitted answers in admission order.
    pub answers: Vec<AnswerRecord>,
    /// Who asked for a broadcast, when known.
    pub initiator: Option<String>,
}

impl BattleSession {
    pub fn mode(&self) -> BattleMode {
        self.participants.mode()
    }

    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    /// `true` once the session is older than `time_budget × grace`.
    ///
    /// A limit too large for a `Duration` never elapses.
    pub fn is_overdue(&self, now: Instant, grace_multiplier: f64) -> bool {
        let age = now.saturating_duration_since(self.started_at);
        match Duration::try_from_secs_f64(self.time_budget.as_secs_f64() * grace_multiplier) {
            Ok(limit) => age > limit,
            Err(_) => false,
        }
    }

    pub(crate) fn transition(&mut self, target: SessionState) -> Result<(), BattleError> {
        if !self.state.can_transition_to(target) {
            return Err(BattleError::InvalidState(format!(
                "session {} cannot go from {} to {}",
                self.id, self.state, target
            )));
        }
        self.state = target;
        Ok(())
    }

    /// The outcome of a duel decided by `answer`: a correct answer wins
    /// for the answerer, an incorrect one for the opponent.
    pub(crate) fn duel_outcome(&self, answer: &AnswerRecord) -> Option<BattleOutcome> {
        let opponent = self.participants.opponent_of(&answer.participant)?;
        let (winner, loser) = if answer.correct {
            (answer.participant.clone(), opponent.player_id.clone())
        } else {
            (opponent.player_id.clone(), answer.participant.clone())
        };
        Some(BattleOutcome::DuelResolved {
            winner,
            loser,
            resolving_answer: answer.clone(),
            correct_label: self.question.correct_label.clone(),
        })
    }

    /// Aggregate statistics over the recorded answers.
    pub fn broadcast_summary(&self) -> BroadcastSummary {
        let mut label_counts: BTreeMap<String, usize> = BTreeMap::new();
        let mut teams: BTreeMap<Team, TeamTally> =
            [(Team::A, TeamTally::default()), (Team::B, TeamTally::default())].into();

        for answer in &self.answers {
            *label_counts.entry(answer.label.clone()).or_default() += 1;
            let tally = teams.entry(answer.team).or_default();
            tally.answered += 1;
            if answer.correct {
                tally.correct += 1;
            }
        }

        BroadcastSummary {
            correct_label: self.question.correct_label.clone(),
            total_answers: self.answers.len(),
            label_counts,
            teams,
        }
    }

    /// How the session ends when its budget runs out.
    pub(crate) fn expiry_outcome(&self) -> BattleOutcome {
        match self.participants {
            Participants::Duel(_) => BattleOutcome::DuelExpired {
                correct_label: self.question.correct_label.clone(),
            },
            Participants::Broadcast => BattleOutcome::Broadcast(self.broadcast_summary()),
        }
    }

    /// The `battle-started` event for this session.
    pub fn started_event(&self) -> ServerEvent {
        ServerEvent::BattleStarted {
            session_id: self.id,
            mode: self.mode(),
            question: self.question.public(),
            participants: self.participants.roster(),
            time_budget_ms: self.time_budget.as_millis() as u64,
        }
    }
}

/// Why a session left `Active`.
#[derive(Debug, Clone, PartialEq)]
pub enum Ending {
    Resolved(BattleOutcome),
    Expired(BattleOutcome),
    Cancelled { reason: String },
}

/// A session that just reached a terminal state and was removed from
/// the manager. Carries everything needed to notify its audience.
#[derive(Debug, Clone)]
pub struct ClosedSession {
    pub session: BattleSession,
    pub ending: Ending,
}

impl ClosedSession {
    pub fn id(&self) -> SessionId {
        self.session.id
    }

    /// The terminal event: `battle-ended` or `battle-cancelled`.
    pub fn event(&self) -> ServerEvent {
        match &self.ending {
            Ending::Resolved(outcome) | Ending::Expired(outcome) => ServerEvent::BattleEnded {
                session_id: self.session.id,
                outcome: outcome.clone(),
            },
            Ending::Cancelled { reason } => ServerEvent::BattleCancelled {
                session_id: self.session.id,
                reason: reason.clone(),
            },
        }
    }
}
