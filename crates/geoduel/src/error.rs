//! Unified error type for the Geoduel engine.

use geoduel_battle::BattleError;
use geoduel_presence::PresenceError;
use geoduel_protocol::ProtocolError;
use geoduel_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum GeoduelError {
    /// A transport-level error (connection, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A presence-level error (unknown connection, not a player).
    #[error(transparent)]
    Presence(#[from] PresenceError),

    /// A battle-level error (question source, busy player, broadcast).
    #[error(transparent)]
    Battle(#[from] BattleError),

    /// A game-master action with a missing or wrong token.
    #[error("forbidden: {0}")]
    Forbidden(String),
}

impl GeoduelError {
    /// The status code reported to the client in an `error` event.
    pub fn code(&self) -> u16 {
        match self {
            Self::Protocol(_) => 400,
            Self::Forbidden(_) => 403,
            Self::Battle(BattleError::SessionNotFound(_)) => 404,
            Self::Battle(BattleError::QuestionUnavailable(_) | BattleError::QuestionTimeout(_)) => {
                503
            }
            Self::Presence(_) | Self::Battle(_) => 409,
            Self::Transport(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use geoduel_protocol::SessionId;
    use geoduel_transport::ConnectionId;

    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let geoduel_err: GeoduelError = err.into();
        assert!(matches!(geoduel_err, GeoduelError::Transport(_)));
        assert!(geoduel_err.to_string().contains("gone"));
        assert_eq!(geoduel_err.code(), 500);
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::InvalidMessage("bad".into());
        let geoduel_err: GeoduelError = err.into();
        assert!(matches!(geoduel_err, GeoduelError::Protocol(_)));
        assert_eq!(geoduel_err.code(), 400);
    }

    #[test]
    fn test_from_presence_error() {
        let err = PresenceError::UnknownConnection(ConnectionId::new(3));
        let geoduel_err: GeoduelError = err.into();
        assert!(matches!(geoduel_err, GeoduelError::Presence(_)));
        assert_eq!(geoduel_err.code(), 409);
    }

    #[test]
    fn test_battle_error_codes() {
        let unavailable: GeoduelError = BattleError::QuestionTimeout(Duration::from_secs(5)).into();
        let missing: GeoduelError = BattleError::SessionNotFound(SessionId(1)).into();
        let busy: GeoduelError = BattleError::BroadcastAlreadyActive(SessionId(2)).into();

        assert_eq!(unavailable.code(), 503);
        assert_eq!(missing.code(), 404);
        assert_eq!(busy.code(), 409);
    }

    #[test]
    fn test_forbidden_code() {
        assert_eq!(GeoduelError::Forbidden("token".into()).code(), 403);
    }
}
