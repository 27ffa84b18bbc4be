//! Inbound and outbound events.
//!
//! Both directions use adjacently tagged JSON inside an [`Envelope`]:
//!
//! ```text
//! { "seq": 4, "timestamp": 1200,
//!   "payload": { "event": "updateLocation",
//!                "data": { "location": { "latitude": 0.0, "longitude": 0.0 } } } }
//! ```
//!
//! Client event names are camelCase (`submitAnswer`), server event names
//! kebab-case (`battle-started`), and every field is camelCase.

use std::collections::BTreeMap;

use geoduel_transport::ConnectionId;
use serde::{Deserialize, Serialize};

use crate::{Location, PlayerId, PublicQuestion, Question, SessionId, SpectatorId, Team};

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// The top-level wire wrapper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<P> {
    /// Per-direction sequence number, starting at 1 for server output.
    pub seq: u64,
    /// Milliseconds since the sender's connection started.
    pub timestamp: u64,
    pub payload: P,
}

// ---------------------------------------------------------------------------
// ClientEvent
// ---------------------------------------------------------------------------

/// Everything a client can ask of the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ClientEvent {
    /// Enter the game as a player.
    Join {
        player_id: PlayerId,
        display_name: String,
        team: Team,
        #[serde(default)]
        location: Option<Location>,
    },

    /// Enter the game as a spectator.
    JoinSpectator {
        spectator_id: SpectatorId,
        display_name: String,
    },

    /// Leave without closing the socket.
    Leave,

    /// Report a new position.
    UpdateLocation { location: Location },

    /// Answer the question of a running session.
    SubmitAnswer {
        session_id: SessionId,
        label: String,
        /// Client-side submit time in Unix milliseconds.
        #[serde(default)]
        submitted_at: Option<u64>,
    },

    /// Start a question for every connected player. Without an explicit
    /// `question` one is fetched from the question source.
    GameMasterTriggerBroadcast {
        #[serde(default)]
        token: Option<String>,
        #[serde(default)]
        category: Option<String>,
        #[serde(default)]
        question: Option<Question>,
    },

    /// End a running broadcast before its time budget.
    GameMasterEndBroadcast {
        #[serde(default)]
        token: Option<String>,
        session_id: SessionId,
    },

    /// Keep-alive.
    Heartbeat { client_time: u64 },
}

// ---------------------------------------------------------------------------
// ServerEvent and its payload types
// ---------------------------------------------------------------------------

/// A player as shown in rosters and battle announcements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntry {
    pub player_id: PlayerId,
    pub display_name: String,
    pub team: Team,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BattleMode {
    Duel,
    Broadcast,
}

/// One admitted answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRecord {
    pub participant: PlayerId,
    pub team: Team,
    pub label: String,
    /// Unix milliseconds; the client's own timestamp when it sent one.
    pub submitted_at: u64,
    pub correct: bool,
}

/// Why an answer was not admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RejectReason {
    /// This participant already has an admitted answer in the session.
    DuplicateOrLocked,
    /// The session is unknown or no longer `Active`.
    SessionNotActive,
    /// The sender is not a participant of the session.
    NotParticipant,
}

/// Answer tallies of one team in a broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TeamTally {
    pub answered: usize,
    pub correct: usize,
}

/// Aggregate result of a broadcast question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastSummary {
    pub correct_label: String,
    pub total_answers: usize,
    pub label_counts: BTreeMap<String, usize>,
    pub teams: BTreeMap<Team, TeamTally>,
}

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum BattleOutcome {
    /// The first admitted answer decided the duel.
    DuelResolved {
        winner: PlayerId,
        loser: PlayerId,
        resolving_answer: AnswerRecord,
        correct_label: String,
    },
    /// Nobody answered within the time budget.
    DuelExpired { correct_label: String },
    /// A broadcast ended (explicitly or by time budget).
    Broadcast(BroadcastSummary),
}

/// Everything the engine sends to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum ServerEvent {
    /// Lobby view: present players not currently duelling.
    RosterChanged {
        players: Vec<RosterEntry>,
        spectators: usize,
    },

    /// Current members of one team.
    TeamRoster {
        team: Team,
        members: Vec<RosterEntry>,
    },

    /// A session the receiver takes part in has started.
    BattleStarted {
        session_id: SessionId,
        mode: BattleMode,
        question: PublicQuestion,
        /// Both duellists; empty for a broadcast.
        participants: Vec<RosterEntry>,
        time_budget_ms: u64,
    },

    /// Spectator notice that a duel started.
    LiveDuel {
        session_id: SessionId,
        participants: Vec<RosterEntry>,
        prompt: String,
    },

    /// Spectator feed of each admitted answer.
    LiveAnswer {
        session_id: SessionId,
        answer: AnswerRecord,
    },

    /// The sender's answer was admitted.
    AnswerAccepted {
        session_id: SessionId,
        resolving: bool,
    },

    /// The sender's answer was not admitted.
    AnswerRejected {
        session_id: SessionId,
        reason: RejectReason,
    },

    /// Terminal event of a resolved or expired session.
    BattleEnded {
        session_id: SessionId,
        outcome: BattleOutcome,
    },

    /// Terminal event of a cancelled session.
    BattleCancelled { session_id: SessionId, reason: String },

    HeartbeatAck { client_time: u64, server_time: u64 },

    /// Something about the last client event was wrong. `code` follows
    /// HTTP conventions (400 malformed, 403 forbidden, 409 conflict,
    /// 503 collaborator unavailable).
    Error { code: u16, message: String },
}

// ---------------------------------------------------------------------------
// Audience
// ---------------------------------------------------------------------------

/// Who an outbound event is delivered to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Audience {
    /// One connection.
    Connection(ConnectionId),
    /// Both duel participants.
    Pair(ConnectionId, ConnectionId),
    /// Every connected player on a team.
    Team(Team),
    /// Every connected player.
    AllPlayers,
    /// Every connected spectator.
    Spectators,
}
