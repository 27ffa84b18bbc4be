//! Error types for the battle layer.

use std::time::Duration;

use geoduel_protocol::{PlayerId, SessionId};

/// Errors that can occur while creating or ending battle sessions.
///
/// Answer submission never returns an error; its outcomes are the
/// verdicts of [`AnswerVerdict`](crate::AnswerVerdict).
#[derive(Debug, thiserror::Error)]
pub enum BattleError {
    /// The question source could not produce a question.
    #[error("question source unavailable: {0}")]
    QuestionUnavailable(String),

    /// The question source did not answer in time.
    #[error("question fetch timed out after {0:?}")]
    QuestionTimeout(Duration),

    /// No live session has this id.
    #[error("session {0} not found")]
    SessionNotFound(SessionId),

    /// The operation only applies to broadcast sessions.
    #[error("session {0} is not a broadcast")]
    NotABroadcast(SessionId),

    /// The player is already in an active or pending duel.
    #[error("player {0} is already engaged in a battle")]
    PlayerBusy(PlayerId),

    /// Only one broadcast may run at a time.
    #[error("broadcast {0} is still active")]
    BroadcastAlreadyActive(SessionId),

    /// The pair reservation was released (e.g. a player left) before the
    /// duel could open.
    #[error("reservation for {0} and {1} is no longer held")]
    ReservationLost(PlayerId, PlayerId),

    /// A state transition the lifecycle does not allow.
    #[error("invalid session state for this operation: {0}")]
    InvalidState(String),
}
