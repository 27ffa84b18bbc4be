//! Error types for the presence layer.

use geoduel_protocol::PlayerId;
use geoduel_transport::ConnectionId;

/// Errors that can occur during presence bookkeeping.
///
/// None of these are fatal: the engine treats them as input
/// inconsistencies (a stale or never-joined connection) and drops the
/// request.
#[derive(Debug, thiserror::Error)]
pub enum PresenceError {
    /// Nothing is registered under this connection handle.
    #[error("no player or spectator registered for {0}")]
    UnknownConnection(ConnectionId),

    /// The connection belongs to a spectator, not a player.
    #[error("{0} is a spectator, not a player")]
    NotAPlayer(ConnectionId),

    /// No live connection is registered for this player.
    #[error("player {0} is not present")]
    UnknownPlayer(PlayerId),
}
