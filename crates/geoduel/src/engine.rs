//! The engine: presence, proximity, battles, and delivery wired together.
//!
//! Every inbound [`ClientEvent`] goes through [`Engine::handle_event`],
//! which routes it to one operation below. The engine never touches a
//! socket; it talks to clients only through the [`Dispatcher`], so tests
//! drive it with plain channels.
//!
//! # Locking
//!
//! Two mutexes, always taken in this order:
//!
//! ```text
//! presence ──→ battles ──→ (dispatcher, internal)
//! ```
//!
//! Session events are dispatched while the battle lock is held, which is
//! what orders a session's start before its end. The question fetch is
//! the one await that happens with no lock held.

use std::sync::Arc;
use std::time::{Duration, Instant};

use geoduel_battle::{
    AnswerVerdict, BattleError, BattleManager, BattleSession, ClosedSession, PairReservation,
    Participant, Participants, QuestionSource,
};
use geoduel_presence::{
    Departed, Player, PresenceError, PresenceRegistry, ProximityScanner, Spectator,
};
use geoduel_protocol::{
    Audience, ClientEvent, Location, PlayerId, Question, RosterEntry, ServerEvent, SessionId,
    SpectatorId, Team, unix_millis,
};
use geoduel_transport::ConnectionId;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::dispatcher::{Dispatcher, Outbox, Role};
use crate::{EngineConfig, GeoduelError};

/// The battle engine shared by every connection task.
pub struct Engine<Q> {
    config: EngineConfig,
    scanner: ProximityScanner,
    presence: Mutex<PresenceRegistry>,
    battles: Mutex<BattleManager>,
    dispatcher: Dispatcher,
    questions: Q,
}

impl<Q: QuestionSource> Engine<Q> {
    /// Builds an engine. The config is validated first.
    pub fn new(config: EngineConfig, questions: Q) -> Arc<Self> {
        let config = config.validated();
        Arc::new(Self {
            scanner: ProximityScanner::new(config.trigger_radius_m),
            presence: Mutex::new(PresenceRegistry::new()),
            battles: Mutex::new(BattleManager::new(config.battle_config())),
            dispatcher: Dispatcher::new(),
            questions,
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn questions(&self) -> &Q {
        &self.questions
    }

    // -----------------------------------------------------------------
    // Connections
    // -----------------------------------------------------------------

    /// Registers a new connection's outbox. Nothing is delivered to it
    /// until it joins, except direct replies.
    pub async fn connect(&self, conn: ConnectionId, outbox: Outbox) {
        self.dispatcher.register(conn, outbox).await;
        debug!(%conn, "connection registered");
    }

    /// Runs `leave` for a closed connection and forgets its outbox.
    pub async fn disconnect(self: &Arc<Self>, conn: ConnectionId) {
        if let Err(e) = self.leave(conn).await {
            debug!(%conn, error = %e, "disconnect without membership");
        }
        self.dispatcher.unregister(conn).await;
        debug!(%conn, "connection unregistered");
    }

    /// Routes one inbound event. Failures are reported to the sender as
    /// an `error` event; nothing here is fatal to the connection.
    pub async fn handle_event(self: &Arc<Self>, conn: ConnectionId, event: ClientEvent) {
        let result = match event {
            ClientEvent::Join {
                player_id,
                display_name,
                team,
                location,
            } => self
                .join(conn, player_id, display_name, team, location)
                .await
                .map(drop),
            ClientEvent::JoinSpectator {
                spectator_id,
                display_name,
            } => {
                self.join_spectator(conn, spectator_id, display_name).await;
                Ok(())
            }
            ClientEvent::Leave => self.leave(conn).await,
            ClientEvent::UpdateLocation { location } => {
                self.update_location(conn, location).await.map(drop)
            }
            ClientEvent::SubmitAnswer {
                session_id,
                label,
                submitted_at,
            } => {
                self.submit_answer(conn, session_id, &label, submitted_at)
                    .await;
                Ok(())
            }
            ClientEvent::GameMasterTriggerBroadcast {
                token,
                category,
                question,
            } => self
                .trigger_broadcast(conn, token.as_deref(), category.as_deref(), question)
                .await
                .map(drop),
            ClientEvent::GameMasterEndBroadcast { token, session_id } => {
                self.end_broadcast(token.as_deref(), session_id).await
            }
            ClientEvent::Heartbeat { client_time } => {
                self.heartbeat(conn, client_time).await;
                Ok(())
            }
        };

        if let Err(e) = result {
            debug!(%conn, error = %e, "client event failed");
            self.dispatcher
                .send_to(
                    conn,
                    ServerEvent::Error {
                        code: e.code(),
                        message: e.to_string(),
                    },
                )
                .await;
        }
    }

    // -----------------------------------------------------------------
    // Presence
    // -----------------------------------------------------------------

    /// Registers `conn` as a player, then applies `location` if given.
    ///
    /// Returns the duels the initial location started.
    pub async fn join(
        self: &Arc<Self>,
        conn: ConnectionId,
        player_id: PlayerId,
        display_name: String,
        team: Team,
        location: Option<Location>,
    ) -> Result<Vec<SessionId>, GeoduelError> {
        {
            let mut presence = self.presence.lock().await;
            let previous = presence.player(conn).cloned();
            let outcome = presence.join(Player {
                player_id: player_id.clone(),
                display_name,
                team,
                location: None,
                connection: conn,
            });

            self.dispatcher.set_role(conn, Role::Player(team)).await;
            if let Some(stale) = outcome.superseded {
                self.dispatcher.set_role(stale, Role::Unjoined).await;
            }

            let mut battles = self.battles.lock().await;
            let mut teams = vec![team];
            if let Some(previous) = previous.filter(|p| p.player_id != player_id) {
                self.cancel_duel_of(&mut battles, &previous.player_id, "participant left")
                    .await;
                teams.push(previous.team);
            }
            if outcome.superseded.is_some() {
                if let Some(closed) = battles.cancel_for_player(&player_id, "participant rejoined")
                {
                    self.notify_closed(&closed).await;
                    // The session still names the stale connection.
                    self.dispatcher.send_to(conn, closed.event()).await;
                }
            }
            teams.dedup();
            self.emit_rosters(&presence, &battles, &teams).await;
        }

        match location {
            Some(location) => self.update_location(conn, location).await,
            None => Ok(Vec::new()),
        }
    }

    /// Registers `conn` as a spectator.
    pub async fn join_spectator(
        self: &Arc<Self>,
        conn: ConnectionId,
        spectator_id: SpectatorId,
        display_name: String,
    ) {
        let mut presence = self.presence.lock().await;
        let previous = presence.player(conn).cloned();
        presence.join_spectator(Spectator {
            spectator_id,
            display_name,
            connection: conn,
        });
        self.dispatcher.set_role(conn, Role::Spectator).await;

        let mut battles = self.battles.lock().await;
        let mut teams = Vec::new();
        if let Some(previous) = previous {
            self.cancel_duel_of(&mut battles, &previous.player_id, "participant left")
                .await;
            teams.push(previous.team);
        }
        self.emit_rosters(&presence, &battles, &teams).await;
    }

    /// Removes whoever is on `conn`. A departing duellist's active duel
    /// is cancelled; broadcasts are unaffected.
    ///
    /// # Errors
    /// [`PresenceError::UnknownConnection`] if nothing was registered.
    pub async fn leave(self: &Arc<Self>, conn: ConnectionId) -> Result<(), GeoduelError> {
        let mut presence = self.presence.lock().await;
        let departed = presence.leave(conn)?;
        self.dispatcher.set_role(conn, Role::Unjoined).await;

        let mut battles = self.battles.lock().await;
        let teams = match &departed {
            Departed::Player(player) => {
                self.cancel_duel_of(&mut battles, &player.player_id, "participant left")
                    .await;
                vec![player.team]
            }
            Departed::Spectator(_) => Vec::new(),
        };
        self.emit_rosters(&presence, &battles, &teams).await;
        Ok(())
    }

    /// Records a location and runs a proximity scan for the reporter.
    ///
    /// Unknown connections and spectators are ignored. Returns the duels
    /// the scan started; a failed duel creation is logged and leaves both
    /// players eligible for the next scan.
    pub async fn update_location(
        self: &Arc<Self>,
        conn: ConnectionId,
        location: Location,
    ) -> Result<Vec<SessionId>, GeoduelError> {
        let reserved = {
            let mut presence = self.presence.lock().await;
            let reporter = match presence.update_location(conn, location) {
                Ok(player) => player,
                Err(e) => {
                    debug!(%conn, error = %e, "location update ignored");
                    return Ok(Vec::new());
                }
            };
            let opponents = presence.list_opposing_team(reporter.team);

            let mut battles = self.battles.lock().await;
            let pairs = self
                .scanner
                .scan(&reporter, &opponents, |id| battles.is_engaged(id));

            let mut reserved = Vec::with_capacity(pairs.len());
            for pair in pairs {
                match battles.reserve_pair(&pair.reporter.player_id, &pair.opponent.player_id) {
                    Ok(reservation) => reserved.push((
                        reservation,
                        [participant(&pair.reporter), participant(&pair.opponent)],
                    )),
                    Err(e) => debug!(error = %e, "pair not reserved"),
                }
            }
            reserved
        };

        let mut created = Vec::with_capacity(reserved.len());
        for (reservation, pair) in reserved {
            match self.start_duel(reservation, pair).await {
                Ok(session_id) => created.push(session_id),
                Err(e) => warn!(error = %e, "duel not created"),
            }
        }
        Ok(created)
    }

    // -----------------------------------------------------------------
    // Battle creation
    // -----------------------------------------------------------------

    /// Starts a duel between two present, opposing, unengaged players.
    ///
    /// # Errors
    /// - a player is not present, or both are on the same team
    /// - a player is already engaged
    /// - the question fetch failed or timed out; nothing is retried
    pub async fn create_duel(
        self: &Arc<Self>,
        a: &PlayerId,
        b: &PlayerId,
    ) -> Result<SessionId, GeoduelError> {
        let (reservation, pair) = {
            let presence = self.presence.lock().await;
            let find = |id: &PlayerId| {
                presence
                    .connection_of(id)
                    .and_then(|conn| presence.player(conn))
                    .map(participant)
                    .ok_or_else(|| PresenceError::UnknownPlayer(id.clone()))
            };
            let pa = find(a)?;
            let pb = find(b)?;
            if pa.team == pb.team {
                return Err(BattleError::InvalidState(format!(
                    "{a} and {b} are on the same team"
                ))
                .into());
            }
            let reservation = self.battles.lock().await.reserve_pair(a, b)?;
            (reservation, [pa, pb])
        };
        self.start_duel(reservation, pair).await
    }

    /// Fetches a question for a reserved pair and opens the duel.
    async fn start_duel(
        self: &Arc<Self>,
        reservation: PairReservation,
        pair: [Participant; 2],
    ) -> Result<SessionId, GeoduelError> {
        let question = match self.fetch_question(None).await {
            Ok(question) => question,
            Err(e) => {
                self.battles.lock().await.release(reservation);
                warn!(
                    a = %pair[0].player_id,
                    b = %pair[1].player_id,
                    error = %e,
                    "question fetch failed, duel aborted"
                );
                return Err(e);
            }
        };

        let presence = self.presence.lock().await;
        let mut battles = self.battles.lock().await;
        let still_present = pair.iter().all(|p| {
            presence
                .player(p.connection)
                .is_some_and(|current| current.player_id == p.player_id)
        });
        if !still_present {
            let err = BattleError::ReservationLost(
                pair[0].player_id.clone(),
                pair[1].player_id.clone(),
            );
            battles.release(reservation);
            return Err(err.into());
        }

        let session = battles.open_duel(reservation, pair, question)?;
        self.announce_started(&session).await;
        self.emit_rosters(&presence, &battles, &[]).await;
        drop(battles);
        drop(presence);

        self.spawn_deadline(session.id, session.time_budget);
        Ok(session.id)
    }

    /// Opens a broadcast of `question` to every connected player.
    ///
    /// # Errors
    /// [`BattleError::BroadcastAlreadyActive`] while another one runs.
    pub async fn create_broadcast(
        self: &Arc<Self>,
        question: Question,
        initiator: Option<String>,
    ) -> Result<SessionId, GeoduelError> {
        let session = {
            let mut battles = self.battles.lock().await;
            let session = battles.open_broadcast(question, initiator)?;
            self.announce_started(&session).await;
            session
        };
        self.spawn_deadline(session.id, session.time_budget);
        Ok(session.id)
    }

    /// Game-master trigger: uses the supplied question or fetches one.
    /// A trigger while a broadcast runs is rejected before any fetch.
    pub async fn trigger_broadcast(
        self: &Arc<Self>,
        conn: ConnectionId,
        token: Option<&str>,
        category: Option<&str>,
        question: Option<Question>,
    ) -> Result<SessionId, GeoduelError> {
        self.authorize(token)?;
        let active = self.battles.lock().await.active_broadcast();
        if let Some(active) = active {
            return Err(BattleError::BroadcastAlreadyActive(active).into());
        }
        let question = match question {
            Some(question) => question,
            None => self.fetch_question(category).await?,
        };
        self.create_broadcast(question, Some(conn.to_string())).await
    }

    /// Game-master end: resolves an active broadcast now.
    pub async fn end_broadcast(
        self: &Arc<Self>,
        token: Option<&str>,
        session_id: SessionId,
    ) -> Result<(), GeoduelError> {
        self.authorize(token)?;
        let mut battles = self.battles.lock().await;
        let closed = battles.end_broadcast(session_id)?;
        self.notify_closed(&closed).await;
        Ok(())
    }

    fn authorize(&self, token: Option<&str>) -> Result<(), GeoduelError> {
        match &self.config.game_master_token {
            Some(expected) if token != Some(expected.as_str()) => Err(GeoduelError::Forbidden(
                "game-master token missing or wrong".to_string(),
            )),
            _ => Ok(()),
        }
    }

    async fn fetch_question(&self, category: Option<&str>) -> Result<Question, GeoduelError> {
        let timeout = self.config.question_fetch_timeout;
        match tokio::time::timeout(timeout, self.questions.fetch_random_question(category)).await
        {
            Ok(result) => Ok(result?),
            Err(_) => Err(BattleError::QuestionTimeout(timeout).into()),
        }
    }

    // -----------------------------------------------------------------
    // Answers
    // -----------------------------------------------------------------

    /// Arbitrates one answer and sends the submitter exactly one reply.
    ///
    /// Admitted answers are mirrored to spectators; a resolving answer
    /// also ends the duel for both participants.
    pub async fn submit_answer(
        self: &Arc<Self>,
        conn: ConnectionId,
        session_id: SessionId,
        label: &str,
        submitted_at: Option<u64>,
    ) -> AnswerVerdict {
        let presence = self.presence.lock().await;
        let answerer = presence.player(conn).map(participant);

        let mut battles = self.battles.lock().await;
        let verdict = match &answerer {
            Some(answerer) => battles.submit_answer(session_id, answerer, label, submitted_at),
            None => AnswerVerdict::RejectedNotParticipant,
        };

        self.dispatcher
            .send_to(conn, verdict.reply(session_id))
            .await;
        if let Some(answer) = verdict.answer() {
            self.dispatcher
                .dispatch(
                    Audience::Spectators,
                    ServerEvent::LiveAnswer {
                        session_id,
                        answer: answer.clone(),
                    },
                )
                .await;
        }
        if let AnswerVerdict::AcceptedResolving { closed, .. } = &verdict {
            self.notify_closed(closed).await;
            self.emit_rosters(&presence, &battles, &[]).await;
        }
        verdict
    }

    // -----------------------------------------------------------------
    // Termination
    // -----------------------------------------------------------------

    /// Cancels a session. Returns `false` if it was already over.
    pub async fn cancel(self: &Arc<Self>, session_id: SessionId, reason: &str) -> bool {
        let presence = self.presence.lock().await;
        let mut battles = self.battles.lock().await;
        let Some(closed) = battles.cancel(session_id, reason) else {
            return false;
        };
        self.notify_closed(&closed).await;
        self.emit_rosters(&presence, &battles, &[]).await;
        true
    }

    /// Expires every session older than its budget × grace multiplier.
    /// Returns how many were expired.
    pub async fn expire_overdue(self: &Arc<Self>, now: Instant) -> usize {
        let presence = self.presence.lock().await;
        let mut battles = self.battles.lock().await;
        let closed = battles.expire_overdue(now);
        for session in &closed {
            info!(session_id = %session.id(), "janitor expired session");
            self.notify_closed(session).await;
        }
        if !closed.is_empty() {
            self.emit_rosters(&presence, &battles, &[]).await;
        }
        closed.len()
    }

    /// Expires one session at its deadline if it is still active.
    pub async fn expire_session(self: &Arc<Self>, session_id: SessionId) -> bool {
        let presence = self.presence.lock().await;
        let mut battles = self.battles.lock().await;
        let Some(closed) = battles.expire(session_id) else {
            return false;
        };
        self.notify_closed(&closed).await;
        self.emit_rosters(&presence, &battles, &[]).await;
        true
    }

    fn spawn_deadline(self: &Arc<Self>, session_id: SessionId, budget: Duration) {
        let engine = Arc::downgrade(self);
        tokio::spawn(async move {
            tokio::time::sleep(budget).await;
            if let Some(engine) = engine.upgrade() {
                if engine.expire_session(session_id).await {
                    debug!(%session_id, "session reached its deadline");
                }
            }
        });
    }

    async fn cancel_duel_of(&self, battles: &mut BattleManager, player_id: &PlayerId, reason: &str) {
        if let Some(closed) = battles.cancel_for_player(player_id, reason) {
            self.notify_closed(&closed).await;
        }
    }

    // -----------------------------------------------------------------
    // Delivery
    // -----------------------------------------------------------------

    async fn heartbeat(&self, conn: ConnectionId, client_time: u64) {
        self.dispatcher
            .send_to(
                conn,
                ServerEvent::HeartbeatAck {
                    client_time,
                    server_time: unix_millis(),
                },
            )
            .await;
    }

    async fn announce_started(&self, session: &BattleSession) {
        let started = session.started_event();
        match &session.participants {
            Participants::Duel([a, b]) => {
                self.dispatcher
                    .dispatch(Audience::Pair(a.connection, b.connection), started)
                    .await;
                self.dispatcher
                    .dispatch(
                        Audience::Spectators,
                        ServerEvent::LiveDuel {
                            session_id: session.id,
                            participants: session.participants.roster(),
                            prompt: session.question.prompt.clone(),
                        },
                    )
                    .await;
            }
            Participants::Broadcast => {
                self.dispatcher
                    .dispatch(Audience::AllPlayers, started.clone())
                    .await;
                self.dispatcher
                    .dispatch(Audience::Spectators, started)
                    .await;
            }
        }
    }

    async fn notify_closed(&self, closed: &ClosedSession) {
        let event = closed.event();
        let audience = match closed.session.participants.connections() {
            Some((a, b)) => Audience::Pair(a, b),
            None => Audience::AllPlayers,
        };
        self.dispatcher.dispatch(audience, event.clone()).await;
        self.dispatcher.dispatch(Audience::Spectators, event).await;
    }

    /// Sends the lobby to everyone, and each team in `teams` its roster.
    async fn emit_rosters(
        &self,
        presence: &PresenceRegistry,
        battles: &BattleManager,
        teams: &[Team],
    ) {
        let roster = ServerEvent::RosterChanged {
            players: lobby(presence, battles),
            spectators: presence.spectator_count(),
        };
        self.dispatcher
            .dispatch(Audience::AllPlayers, roster.clone())
            .await;
        self.dispatcher.dispatch(Audience::Spectators, roster).await;

        for &team in teams {
            self.dispatcher
                .dispatch(
                    Audience::Team(team),
                    ServerEvent::TeamRoster {
                        team,
                        members: presence.team_members(team),
                    },
                )
                .await;
        }
    }

    // -----------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------

    /// Whether the player is in, or reserved for, a duel.
    pub async fn is_engaged(&self, player_id: &PlayerId) -> bool {
        self.battles.lock().await.is_engaged(player_id)
    }

    /// A copy of a live session.
    pub async fn session(&self, session_id: SessionId) -> Option<BattleSession> {
        self.battles.lock().await.session(session_id).cloned()
    }

    pub async fn active_sessions(&self) -> Vec<SessionId> {
        let mut ids = self.battles.lock().await.session_ids();
        ids.sort();
        ids
    }

    /// Present players not currently duelling, oldest join first.
    pub async fn lobby(&self) -> Vec<RosterEntry> {
        let presence = self.presence.lock().await;
        let battles = self.battles.lock().await;
        lobby(&presence, &battles)
    }

    pub async fn player_count(&self) -> usize {
        self.presence.lock().await.player_count()
    }
}

fn participant(player: &Player) -> Participant {
    Participant {
        player_id: player.player_id.clone(),
        display_name: player.display_name.clone(),
        team: player.team,
        connection: player.connection,
    }
}

fn lobby(presence: &PresenceRegistry, battles: &BattleManager) -> Vec<RosterEntry> {
    presence
        .lobby()
        .into_iter()
        .filter(|entry| battles.duel_of(&entry.player_id).is_none())
        .map(|entry| RosterEntry {
            player_id: entry.player_id,
            display_name: entry.display_name,
            team: entry.team,
        })
        .collect()
}
