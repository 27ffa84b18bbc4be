//! The presence registry: who is connected, on which team, and where.
//!
//! # Concurrency note
//!
//! `PresenceRegistry` is plain data behind `&mut self`. The engine owns
//! exactly one instance behind a mutex, which is what serializes joins,
//! leaves, and location updates against each other and against the scans
//! they trigger. Every read handed out for a scan is an owned copy, so a
//! scan never observes a half-applied update.

use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use geoduel_protocol::{Location, PlayerId, RosterEntry, SpectatorId, Team};
use geoduel_transport::ConnectionId;

use crate::PresenceError;

/// A connected player.
#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    pub player_id: PlayerId,
    pub display_name: String,
    pub team: Team,
    /// Last reported position; `None` until the first report.
    pub location: Option<Location>,
    pub connection: ConnectionId,
}

impl Player {
    pub fn roster_entry(&self) -> RosterEntry {
        RosterEntry {
            player_id: self.player_id.clone(),
            display_name: self.display_name.clone(),
            team: self.team,
        }
    }
}

/// A player's entry in the lobby view, keyed by [`PlayerId`].
#[derive(Debug, Clone)]
pub struct LobbyEntry {
    pub player_id: PlayerId,
    pub display_name: String,
    pub team: Team,
    pub connection: ConnectionId,
    pub joined_at: Instant,
}

/// A connected spectator. No team, no location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spectator {
    pub spectator_id: SpectatorId,
    pub display_name: String,
    pub connection: ConnectionId,
}

/// What a successful [`PresenceRegistry::join`] displaced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinOutcome {
    /// The player's previous connection, when they rejoined under a new
    /// handle without the old one leaving first.
    pub superseded: Option<ConnectionId>,
}

/// Whoever was registered under a connection that just left.
#[derive(Debug, Clone, PartialEq)]
pub enum Departed {
    Player(Player),
    Spectator(Spectator),
}

/// Tracks every connected player and spectator.
///
/// Three views are kept in sync:
///
/// ```text
/// players     ConnectionId → Player       (location lives here)
/// lobby       PlayerId     → LobbyEntry   (roster broadcasts)
/// spectators  ConnectionId → Spectator
/// ```
///
/// A connection handle is in at most one of `players` / `spectators`,
/// and a `PlayerId` has at most one live connection.
#[derive(Debug, Default)]
pub struct PresenceRegistry {
    /// Ordered by handle, i.e. by connection order, which gives scans a
    /// stable iteration order.
    players: BTreeMap<ConnectionId, Player>,
    lobby: HashMap<PlayerId, LobbyEntry>,
    spectators: HashMap<ConnectionId, Spectator>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the player registered under `player.connection`
    /// and upserts their lobby entry.
    ///
    /// If the same `PlayerId` is still registered under a different
    /// handle, that stale entry is dropped and reported in
    /// [`JoinOutcome::superseded`].
    pub fn join(&mut self, player: Player) -> JoinOutcome {
        let conn = player.connection;
        let mut outcome = JoinOutcome::default();

        self.spectators.remove(&conn);

        // Re-joining under the same handle with a new identity retires the
        // old identity's lobby entry.
        if let Some(previous) = self.players.get(&conn) {
            if previous.player_id != player.player_id {
                self.lobby.remove(&previous.player_id);
            }
        }

        if let Some(entry) = self.lobby.get(&player.player_id) {
            if entry.connection != conn {
                self.players.remove(&entry.connection);
                outcome.superseded = Some(entry.connection);
            }
        }

        let joined_at = self
            .lobby
            .get(&player.player_id)
            .filter(|entry| entry.connection == conn)
            .map(|entry| entry.joined_at)
            .unwrap_or_else(Instant::now);

        self.lobby.insert(
            player.player_id.clone(),
            LobbyEntry {
                player_id: player.player_id.clone(),
                display_name: player.display_name.clone(),
                team: player.team,
                connection: conn,
                joined_at,
            },
        );

        tracing::info!(
            player_id = %player.player_id,
            team = %player.team,
            %conn,
            "player joined"
        );
        self.players.insert(conn, player);
        outcome
    }

    /// Registers a spectator under its connection handle, replacing any
    /// player previously registered there.
    pub fn join_spectator(&mut self, spectator: Spectator) {
        let conn = spectator.connection;
        if let Some(previous) = self.players.remove(&conn) {
            self.lobby.remove(&previous.player_id);
        }
        tracing::info!(spectator_id = %spectator.spectator_id, %conn, "spectator joined");
        self.spectators.insert(conn, spectator);
    }

    /// Records a new position for the player on `conn` and returns a
    /// snapshot of the updated player.
    ///
    /// # Errors
    /// - [`PresenceError::NotAPlayer`] — `conn` is a spectator
    /// - [`PresenceError::UnknownConnection`] — nothing registered
    pub fn update_location(
        &mut self,
        conn: ConnectionId,
        location: Location,
    ) -> Result<Player, PresenceError> {
        match self.players.get_mut(&conn) {
            Some(player) => {
                player.location = Some(location);
                Ok(player.clone())
            }
            None if self.spectators.contains_key(&conn) => Err(PresenceError::NotAPlayer(conn)),
            None => Err(PresenceError::UnknownConnection(conn)),
        }
    }

    /// Removes whoever is registered under `conn` from every view.
    ///
    /// # Errors
    /// Returns [`PresenceError::UnknownConnection`] if nothing is
    /// registered (already left, or never joined).
    pub fn leave(&mut self, conn: ConnectionId) -> Result<Departed, PresenceError> {
        if let Some(player) = self.players.remove(&conn) {
            if self
                .lobby
                .get(&player.player_id)
                .is_some_and(|entry| entry.connection == conn)
            {
                self.lobby.remove(&player.player_id);
            }
            tracing::info!(player_id = %player.player_id, %conn, "player left");
            return Ok(Departed::Player(player));
        }
        if let Some(spectator) = self.spectators.remove(&conn) {
            tracing::info!(spectator_id = %spectator.spectator_id, %conn, "spectator left");
            return Ok(Departed::Spectator(spectator));
        }
        Err(PresenceError::UnknownConnection(conn))
    }

    /// Snapshot of every present player on the other team, in connection
    /// order.
    pub fn list_opposing_team(&self, team: Team) -> Vec<Player> {
        let opposing = team.opponent();
        self.players
            .values()
            .filter(|p| p.team == opposing)
            .cloned()
            .collect()
    }

    /// The player registered under `conn`, if any.
    pub fn player(&self, conn: ConnectionId) -> Option<&Player> {
        self.players.get(&conn)
    }

    /// The spectator registered under `conn`, if any.
    pub fn spectator(&self, conn: ConnectionId) -> Option<&Spectator> {
        self.spectators.get(&conn)
    }

    /// The current connection of a player.
    pub fn connection_of(&self, player_id: &PlayerId) -> Option<ConnectionId> {
        self.lobby.get(player_id).map(|entry| entry.connection)
    }

    /// Lobby entries, oldest join first.
    pub fn lobby(&self) -> Vec<LobbyEntry> {
        let mut entries: Vec<LobbyEntry> = self.lobby.values().cloned().collect();
        entries.sort_by(|a, b| {
            a.joined_at
                .cmp(&b.joined_at)
                .then_with(|| a.connection.cmp(&b.connection))
        });
        entries
    }

    /// Roster of one team, in connection order.
    pub fn team_members(&self, team: Team) -> Vec<RosterEntry> {
        self.players
            .values()
            .filter(|p| p.team == team)
            .map(Player::roster_entry)
            .collect()
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn spectator_count(&self) -> usize {
        self.spectators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty() && self.spectators.is_empty()
    }
}
