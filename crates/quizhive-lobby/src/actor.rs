//! Lobby actor: an isolated Tokio task that owns one lobby and its game.
//!
//! Each lobby runs in its own task, communicating with the outside
//! world through an mpsc channel — the actor model. The actor owns the
//! [`Lobby`] aggregate, the optional [`GameSession`], and the single
//! [`DeadlineTimer`] that drives question cutoffs and inter-question
//! pauses, so every mutation for one code is serialized without locks.
//!
//! Timers never call into the game directly. The `select!` loop receives
//! the armed generation when a deadline passes and checks it against the
//! session's current generation; anything stale is dropped. Disconnect
//! sweeps and empty-lobby checks take the other route: a task sleeps and
//! then sends a guarded command back through the actor's own channel.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use quizhive_game::{
    final_outcomes, DeadlineTimer, GameSession, HallOfFame, ProfileService,
    QuestionSource, Services,
};
use quizhive_protocol::{
    FinalStanding, GamePhase, LevelUp, LobbySnapshot, LobbyStatus, PlayerId,
    PlayerView, Recipient, ScoreboardEntry, ServerEvent,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{
    EventSender, Lobby, LobbyCommand, LobbyError, LobbyInfo, NewPlayer,
    RegistryEvent,
};

/// Whether the actor loop should keep running after a command.
#[derive(PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

pub(crate) struct LobbyActor<Q, H, P> {
    lobby: Lobby,
    session: Option<GameSession>,
    timer: DeadlineTimer,
    /// Per-player outbound channels. Only connected players have one.
    senders: HashMap<PlayerId, EventSender>,
    services: Arc<Services<Q, H, P>>,
    receiver: mpsc::Receiver<LobbyCommand>,
    /// Clone of our own command sender, for scheduling delayed commands.
    self_tx: mpsc::Sender<LobbyCommand>,
    events: mpsc::UnboundedSender<RegistryEvent>,
}

impl<Q, H, P> LobbyActor<Q, H, P>
where
    Q: QuestionSource,
    H: HallOfFame,
    P: ProfileService,
{
    pub(crate) async fn run(mut self) {
        info!(code = %self.lobby.code(), "lobby actor started");

        loop {
            tokio::select! {
                cmd = self.receiver.recv() => match cmd {
                    Some(cmd) => {
                        if self.handle_command(cmd).await == Flow::Stop {
                            break;
                        }
                    }
                    None => break,
                },
                generation = self.timer.fired() => {
                    self.handle_deadline(generation).await;
                }
            }
        }

        let _ = self
            .events
            .send(RegistryEvent::LobbyClosed(self.lobby.code().clone()));
        info!(code = %self.lobby.code(), "lobby actor stopped");
    }

    async fn handle_command(&mut self, cmd: LobbyCommand) -> Flow {
        match cmd {
            LobbyCommand::Join {
                player,
                sender,
                reply,
            } => {
                let _ = reply.send(self.handle_join(player, sender));
            }
            LobbyCommand::Reconnect {
                player_id,
                sender,
                reply,
            } => {
                let _ = reply.send(self.handle_reconnect(player_id, sender));
            }
            LobbyCommand::Leave { player_id, reply } => {
                let _ = reply.send(self.remove_seat(player_id));
            }
            LobbyCommand::SetReady { player_id, ready } => {
                self.handle_set_ready(player_id, ready);
            }
            LobbyCommand::StartGame { player_id } => {
                if let Err(err) = self.try_start_game(player_id).await {
                    self.report_error(player_id, &err);
                }
            }
            LobbyCommand::ReturnToLobby { player_id } => {
                self.handle_return_to_lobby(player_id);
            }
            LobbyCommand::Chat { player_id, message } => {
                self.handle_chat(player_id, message);
            }
            LobbyCommand::Answer {
                player_id,
                answer_index,
                received_at,
            } => {
                self.handle_answer(player_id, answer_index, received_at);
            }
            LobbyCommand::Disconnected { player_id } => {
                self.handle_disconnected(player_id);
            }
            LobbyCommand::SweepDisconnected {
                player_id,
                marked_at,
            } => {
                self.handle_sweep(player_id, marked_at);
            }
            LobbyCommand::CheckEmpty => {
                if self.lobby.is_empty() {
                    info!(
                        code = %self.lobby.code(),
                        "empty grace elapsed, shutting lobby down"
                    );
                    return Flow::Stop;
                }
            }
            LobbyCommand::Info { reply } => {
                let _ = reply.send(LobbyInfo {
                    code: self.lobby.code().clone(),
                    status: self.lobby.status(),
                    player_count: self.lobby.players().len(),
                    max_players: self.lobby.config().max_players,
                });
            }
            LobbyCommand::Snapshot { player_id, reply } => {
                let _ = reply.send(self.snapshot_for(player_id));
            }
        }
        Flow::Continue
    }

    // -- membership ---------------------------------------------------------

    fn handle_join(
        &mut self,
        player: NewPlayer,
        sender: EventSender,
    ) -> Result<LobbySnapshot, LobbyError> {
        let player_id = player.id;
        self.lobby.join(player)?;
        self.senders.insert(player_id, sender);

        info!(
            code = %self.lobby.code(),
            %player_id,
            players = self.lobby.players().len(),
            "player joined"
        );

        if let Some(view) = self.player_view(player_id) {
            self.dispatch(
                Recipient::AllExcept(player_id),
                ServerEvent::PlayerJoined { player: view },
            );
        }
        Ok(self.snapshot_for(player_id))
    }

    fn handle_reconnect(
        &mut self,
        player_id: PlayerId,
        sender: EventSender,
    ) -> Result<LobbySnapshot, LobbyError> {
        let seat = self
            .lobby
            .player(player_id)
            .ok_or(LobbyError::NotInLobby(player_id))?;
        if seat.connected {
            return Err(LobbyError::InvalidState(
                "player is already connected".into(),
            ));
        }
        let username = seat.username.clone();

        self.lobby.mark_reconnected(player_id)?;
        self.senders.insert(player_id, sender);
        info!(code = %self.lobby.code(), %player_id, "player reconnected");

        self.dispatch(
            Recipient::AllExcept(player_id),
            ServerEvent::PlayerReconnected { username },
        );
        Ok(self.snapshot_for(player_id))
    }

    /// Releases a seat for good: voluntary leave or an expired grace
    /// period. Handles host failover, mid-question bookkeeping, and the
    /// empty-lobby countdown.
    fn remove_seat(&mut self, player_id: PlayerId) -> Result<(), LobbyError> {
        let removed = self.lobby.remove(player_id)?;
        self.senders.remove(&player_id);
        if let Some(session) = &mut self.session {
            session.remove_player(player_id);
        }

        info!(
            code = %self.lobby.code(),
            %player_id,
            players = self.lobby.players().len(),
            "player left"
        );

        let new_host = removed
            .new_host
            .and_then(|id| self.lobby.username_of(id))
            .map(str::to_string);
        self.dispatch(
            Recipient::All,
            ServerEvent::PlayerLeft {
                username: removed.username,
                new_host,
            },
        );

        self.resolve_if_all_answered();
        self.schedule_empty_check();
        Ok(())
    }

    fn handle_set_ready(&mut self, player_id: PlayerId, ready: bool) {
        match self.lobby.set_ready(player_id, ready) {
            Ok(()) => {
                if let Some(username) = self.lobby.username_of(player_id) {
                    let username = username.to_string();
                    self.dispatch(
                        Recipient::All,
                        ServerEvent::PlayerReady { username, ready },
                    );
                }
            }
            Err(err) => self.report_error(player_id, &err),
        }
    }

    fn handle_chat(&mut self, player_id: PlayerId, message: String) {
        let Some(username) = self.lobby.username_of(player_id) else {
            self.report_error(player_id, &LobbyError::NotInLobby(player_id));
            return;
        };
        let username = username.to_string();
        self.dispatch(
            Recipient::All,
            ServerEvent::Message { username, message },
        );
    }

    // -- connectivity -------------------------------------------------------

    fn handle_disconnected(&mut self, player_id: PlayerId) {
        // Already left (or swept) — nothing to hold.
        if self.lobby.player(player_id).is_none() {
            return;
        }
        let marked_at = match self
            .lobby
            .mark_disconnected(player_id, Instant::now())
        {
            Ok(at) => at,
            Err(_) => return,
        };
        self.senders.remove(&player_id);

        if let Some(username) = self.lobby.username_of(player_id) {
            let username = username.to_string();
            debug!(code = %self.lobby.code(), %player_id, "seat held for grace period");
            self.dispatch(
                Recipient::All,
                ServerEvent::PlayerDisconnected { username },
            );
        }

        // Grace elapsed check comes back through our own channel so the
        // decision is made against current state, not the state at
        // disconnect time.
        let tx = self.self_tx.clone();
        let grace = self.lobby.config().disconnect_grace;
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            let _ = tx
                .send(LobbyCommand::SweepDisconnected {
                    player_id,
                    marked_at,
                })
                .await;
        });

        self.resolve_if_all_answered();
    }

    fn handle_sweep(&mut self, player_id: PlayerId, marked_at: Instant) {
        if !self.lobby.sweep_applies(player_id, marked_at) {
            debug!(%player_id, "sweep no longer applies, ignoring");
            return;
        }
        debug!(%player_id, "grace elapsed, releasing seat");
        match self.remove_seat(player_id) {
            Ok(()) => {
                // A voluntary leave goes through the registry, which
                // maintains its own index; only a sweep needs to report
                // the freed seat back.
                let _ = self
                    .events
                    .send(RegistryEvent::SeatReleased(player_id));
            }
            Err(err) => {
                warn!(%player_id, error = %err, "sweep failed to release seat");
            }
        }
    }

    fn schedule_empty_check(&self) {
        if !self.lobby.is_empty() {
            return;
        }
        let tx = self.self_tx.clone();
        let grace = self.lobby.config().empty_grace;
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            let _ = tx.send(LobbyCommand::CheckEmpty).await;
        });
    }

    // -- game flow ----------------------------------------------------------

    async fn try_start_game(
        &mut self,
        player_id: PlayerId,
    ) -> Result<(), LobbyError> {
        // A second start while a game is underway (host double-submit,
        // or two hosts racing across a failover) is dropped, not an error.
        if self.lobby.status() != LobbyStatus::Waiting {
            debug!(
                code = %self.lobby.code(),
                status = %self.lobby.status(),
                "ignoring start, lobby already left the waiting room"
            );
            return Ok(());
        }
        self.lobby.check_start(player_id)?;
        // Block joins while we fetch questions.
        self.lobby.set_status(LobbyStatus::Starting);

        let settings = self.lobby.settings().clone();
        let result = self
            .services
            .questions
            .fetch(&settings.question_set, settings.question_count)
            .await
            .and_then(|questions| {
                GameSession::new(
                    questions,
                    self.lobby.player_ids(),
                    Duration::from_secs(settings.time_limit_secs),
                    self.lobby.config().scoring,
                    settings.shuffle_questions,
                )
            });

        let mut session = match result {
            Ok(session) => session,
            Err(err) => {
                self.lobby.set_status(LobbyStatus::Waiting);
                return Err(err.into());
            }
        };

        let view = session.begin_question(Instant::now())?;
        let generation = session.generation();
        let total = session.total_questions();
        let limit = session.time_limit();
        self.session = Some(session);
        self.lobby.set_status(LobbyStatus::InProgress);

        info!(
            code = %self.lobby.code(),
            questions = total,
            "game started"
        );
        self.dispatch(
            Recipient::All,
            ServerEvent::GameStarted {
                question: view,
                question_number: 1,
                total_questions: total,
                time_remaining_secs: limit.as_secs(),
            },
        );
        self.timer.arm(generation, limit);
        Ok(())
    }

    fn handle_answer(
        &mut self,
        player_id: PlayerId,
        answer_index: usize,
        received_at: Instant,
    ) {
        let connected: Vec<PlayerId> = self.lobby.connected_ids().collect();
        let result = match self.session.as_mut() {
            None => Err(LobbyError::InvalidState(
                "no game in progress".into(),
            )),
            Some(session) => session
                .record_answer(player_id, answer_index, received_at)
                .map(|count| {
                    (count, session.all_answered(connected.iter().copied()))
                })
                .map_err(LobbyError::from),
        };

        match result {
            Ok((answered_count, all_answered)) => {
                if let Some(username) = self.lobby.username_of(player_id) {
                    let username = username.to_string();
                    self.dispatch(
                        Recipient::All,
                        ServerEvent::AnswerReceived {
                            username,
                            answered_count,
                        },
                    );
                }
                if all_answered {
                    // No point waiting out the clock.
                    self.timer.cancel();
                    self.resolve_current(false);
                }
            }
            Err(err) => self.report_error(player_id, &err),
        }
    }

    /// Early resolution when the connected set shrinks below the number
    /// of pending answers (disconnect or leave mid-question).
    fn resolve_if_all_answered(&mut self) {
        let connected: Vec<PlayerId> = self.lobby.connected_ids().collect();
        if connected.is_empty() {
            return;
        }
        let active = self.session.as_ref().is_some_and(|s| {
            s.phase() == GamePhase::QuestionActive
                && s.all_answered(connected.iter().copied())
        });
        if active {
            self.timer.cancel();
            self.resolve_current(false);
        }
    }

    async fn handle_deadline(&mut self, generation: u64) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        if session.generation() != generation {
            debug!(
                code = %self.lobby.code(),
                armed = generation,
                current = session.generation(),
                "stale deadline ignored"
            );
            return;
        }
        match session.phase() {
            GamePhase::QuestionActive => self.resolve_current(true),
            GamePhase::QuestionResolved => self.advance_question().await,
            _ => {}
        }
    }

    /// Closes the current question: scores everyone, publishes results
    /// and the scoreboard, and arms the pause before the next question.
    fn resolve_current(&mut self, timed_out: bool) {
        let (outcome, ranking, rules, generation) = {
            let Some(session) = self.session.as_mut() else {
                return;
            };
            let outcome = match session.resolve() {
                Ok(outcome) => outcome,
                Err(err) => {
                    warn!(code = %self.lobby.code(), error = %err, "resolve failed");
                    return;
                }
            };
            (
                outcome,
                session.ranking(),
                *session.scoring_rules(),
                session.generation(),
            )
        };

        if timed_out {
            self.dispatch(Recipient::All, ServerEvent::TimeUp);
        }
        for (player, event) in &outcome.results {
            self.dispatch(
                Recipient::Player(*player),
                ServerEvent::AnswerResult {
                    is_correct: event.is_correct,
                    correct_index: outcome.correct_index,
                    points_awarded: event.points_awarded,
                    multiplier: event.multiplier,
                    score: event.score,
                },
            );
        }

        let scoreboard: Vec<ScoreboardEntry> = ranking
            .iter()
            .filter_map(|(player, score)| {
                self.lobby.username_of(*player).map(|username| {
                    ScoreboardEntry {
                        username: username.to_string(),
                        score: score.score,
                        multiplier: score.multiplier(&rules),
                    }
                })
            })
            .collect();
        self.dispatch(
            Recipient::All,
            ServerEvent::ScoreUpdate { scoreboard },
        );

        self.timer
            .arm(generation, self.lobby.config().inter_question_pause);
    }

    async fn advance_question(&mut self) {
        let next = {
            let Some(session) = self.session.as_mut() else {
                return;
            };
            match session.advance() {
                Ok(true) => {
                    let now = Instant::now();
                    match session.begin_question(now) {
                        Ok(view) => Some((
                            view,
                            session.question_number(),
                            session.total_questions(),
                            session.time_limit(),
                            session.generation(),
                        )),
                        Err(err) => {
                            warn!(error = %err, "failed to activate question");
                            return;
                        }
                    }
                }
                Ok(false) => None,
                Err(err) => {
                    warn!(error = %err, "failed to advance question");
                    return;
                }
            }
        };

        match next {
            Some((question, question_number, total_questions, limit, generation)) => {
                self.dispatch(
                    Recipient::All,
                    ServerEvent::Question {
                        question,
                        question_number,
                        total_questions,
                        time_remaining_secs: limit.as_secs(),
                    },
                );
                self.timer.arm(generation, limit);
            }
            None => self.finish_game().await,
        }
    }

    async fn finish_game(&mut self) {
        let outcomes = match self.session.as_ref() {
            Some(session) => final_outcomes(session),
            None => return,
        };
        self.lobby.set_status(LobbyStatus::Ended);
        info!(code = %self.lobby.code(), "game ended");

        let standings: Vec<FinalStanding> = outcomes
            .iter()
            .filter_map(|o| {
                self.lobby.username_of(o.player).map(|username| {
                    FinalStanding {
                        rank: o.rank,
                        username: username.to_string(),
                        score: o.score,
                        correct_answers: o.correct_answers,
                        wrong_answers: o.wrong_answers,
                    }
                })
            })
            .collect();

        // Collaborator failures are logged, never shown to players — a
        // leaderboard outage must not break the game-over screen.
        if let Err(err) =
            self.services.hall_of_fame.record_game(&outcomes).await
        {
            warn!(code = %self.lobby.code(), error = %err, "hall of fame update failed");
        }

        let mut level_ups = Vec::new();
        for outcome in &outcomes {
            match self
                .services
                .profiles
                .award_experience(outcome.player, outcome.score)
                .await
            {
                Ok(Some(level)) => {
                    if let Some(username) =
                        self.lobby.username_of(outcome.player)
                    {
                        level_ups.push(LevelUp {
                            username: username.to_string(),
                            level,
                        });
                    }
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(
                        player = %outcome.player,
                        error = %err,
                        "experience award failed"
                    );
                }
            }
        }

        self.dispatch(
            Recipient::All,
            ServerEvent::GameEnded {
                standings,
                level_ups,
            },
        );
    }

    fn handle_return_to_lobby(&mut self, player_id: PlayerId) {
        if !self.lobby.is_host(player_id) {
            self.report_error(player_id, &LobbyError::NotHost(player_id));
            return;
        }
        if let Err(err) = self.lobby.reset_to_waiting() {
            self.report_error(player_id, &err);
            return;
        }
        self.session = None;
        self.timer.cancel();
        info!(code = %self.lobby.code(), "returned to waiting room");

        let recipients: Vec<PlayerId> = self.senders.keys().copied().collect();
        for recipient in recipients {
            let snapshot = self.snapshot_for(recipient);
            self.dispatch(
                Recipient::Player(recipient),
                ServerEvent::ReturnedToLobby { lobby: snapshot },
            );
        }
    }

    // -- views & delivery ---------------------------------------------------

    fn player_view(&self, player_id: PlayerId) -> Option<PlayerView> {
        let seat = self.lobby.player(player_id)?;
        let session = self.session.as_ref();
        Some(PlayerView {
            username: seat.username.clone(),
            character: seat.character.clone(),
            score: session
                .and_then(|s| s.score(player_id))
                .map_or(0, |s| s.score),
            multiplier: session.map_or(1, |s| s.multiplier(player_id)),
            is_host: self.lobby.is_host(player_id),
            is_ready: seat.is_ready,
            connected: seat.connected,
        })
    }

    /// The full resync payload, personalized for one recipient (only
    /// their own answer is included).
    fn snapshot_for(&self, player_id: PlayerId) -> LobbySnapshot {
        let now = Instant::now();
        let players = self
            .lobby
            .players()
            .iter()
            .filter_map(|p| self.player_view(p.id))
            .collect();
        LobbySnapshot {
            code: self.lobby.code().clone(),
            status: self.lobby.status(),
            players,
            settings: self.lobby.settings().clone(),
            game: self
                .session
                .as_ref()
                .map(|s| s.snapshot_for(player_id, now)),
        }
    }

    fn report_error(&self, player_id: PlayerId, err: &LobbyError) {
        debug!(
            code = %self.lobby.code(),
            %player_id,
            error = %err,
            "rejecting command"
        );
        self.dispatch(
            Recipient::Player(player_id),
            ServerEvent::Error {
                code: err.code(),
                message: err.to_string(),
            },
        );
    }

    /// Delivers an event to the recipients that currently hold an open
    /// channel. Dropped receivers are skipped silently — a disconnected
    /// player catches up from a snapshot, not an event replay.
    fn dispatch(&self, recipient: Recipient, event: ServerEvent) {
        match recipient {
            Recipient::All => {
                for sender in self.senders.values() {
                    let _ = sender.send(event.clone());
                }
            }
            Recipient::Player(player_id) => {
                if let Some(sender) = self.senders.get(&player_id) {
                    let _ = sender.send(event);
                }
            }
            Recipient::AllExcept(excluded) => {
                for (player_id, sender) in &self.senders {
                    if *player_id != excluded {
                        let _ = sender.send(event.clone());
                    }
                }
            }
        }
    }
}

/// Spawns a lobby actor task and returns the pieces the registry keeps.
///
/// The lobby arrives with its host already seated; `host_sender` is the
/// host's event channel.
pub(crate) fn spawn_lobby<Q, H, P>(
    lobby: Lobby,
    host_sender: EventSender,
    services: Arc<Services<Q, H, P>>,
    events: mpsc::UnboundedSender<RegistryEvent>,
    channel_size: usize,
) -> crate::LobbyHandle
where
    Q: QuestionSource,
    H: HallOfFame,
    P: ProfileService,
{
    let (tx, rx) = mpsc::channel(channel_size);
    let code = lobby.code().clone();

    let mut senders = HashMap::new();
    senders.insert(lobby.host(), host_sender);

    let actor = LobbyActor {
        lobby,
        session: None,
        timer: DeadlineTimer::new(),
        senders,
        services,
        receiver: rx,
        self_tx: tx.clone(),
        events,
    };
    tokio::spawn(actor.run());

    crate::LobbyHandle::new(code, tx)
}
