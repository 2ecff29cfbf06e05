//! The lobby aggregate: seats, readiness, host, and status.
//!
//! `Lobby` is plain synchronous state owned by one actor task. All the
//! membership invariants live here — exactly one host, unique display
//! names, join order preserved — so they can be tested without spawning
//! anything.

use std::time::Instant;

use quizhive_protocol::{GameSettings, LobbyCode, LobbyStatus, PlayerId};

use crate::{LobbyConfig, LobbyError};

/// What a joining player brings to the table.
#[derive(Debug, Clone)]
pub struct NewPlayer {
    pub id: PlayerId,
    pub username: String,
    pub character: String,
}

/// One occupied seat.
#[derive(Debug, Clone)]
pub struct Player {
    pub id: PlayerId,
    pub username: String,
    pub character: String,
    pub is_ready: bool,
    pub connected: bool,
    /// Set while the seat is held through a disconnect. Doubles as the
    /// guard for the delayed sweep: a sweep scheduled for an older
    /// disconnect must not release a seat that reconnected in between.
    pub disconnected_at: Option<Instant>,
}

/// The result of removing a seat.
#[derive(Debug, Clone)]
pub struct RemovedSeat {
    pub username: String,
    /// Set when the removal triggered a host promotion.
    pub new_host: Option<PlayerId>,
}

/// A lobby's membership state. Join order is the `players` order.
#[derive(Debug)]
pub struct Lobby {
    code: LobbyCode,
    status: LobbyStatus,
    host: PlayerId,
    players: Vec<Player>,
    settings: GameSettings,
    config: LobbyConfig,
}

impl Lobby {
    /// Creates a lobby with its host seated. The host counts as ready —
    /// they're the one who decides when to start.
    pub fn new(
        code: LobbyCode,
        host: NewPlayer,
        settings: GameSettings,
        config: LobbyConfig,
    ) -> Self {
        let host_id = host.id;
        Self {
            code,
            status: LobbyStatus::Waiting,
            host: host_id,
            players: vec![Player {
                id: host.id,
                username: host.username,
                character: host.character,
                is_ready: true,
                connected: true,
                disconnected_at: None,
            }],
            settings,
            config,
        }
    }

    pub fn code(&self) -> &LobbyCode {
        &self.code
    }

    pub fn status(&self) -> LobbyStatus {
        self.status
    }

    pub fn set_status(&mut self, status: LobbyStatus) {
        self.status = status;
    }

    pub fn host(&self) -> PlayerId {
        self.host
    }

    pub fn is_host(&self, player_id: PlayerId) -> bool {
        self.host == player_id
    }

    pub fn settings(&self) -> &GameSettings {
        &self.settings
    }

    pub fn config(&self) -> &LobbyConfig {
        &self.config
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn player(&self, player_id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == player_id)
    }

    fn player_mut(&mut self, player_id: PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == player_id)
    }

    pub fn username_of(&self, player_id: PlayerId) -> Option<&str> {
        self.player(player_id).map(|p| p.username.as_str())
    }

    /// Ids of currently connected players, in join order.
    pub fn connected_ids(&self) -> impl Iterator<Item = PlayerId> + '_ {
        self.players
            .iter()
            .filter(|p| p.connected)
            .map(|p| p.id)
    }

    /// All seated player ids, in join order.
    pub fn player_ids(&self) -> impl Iterator<Item = PlayerId> + '_ {
        self.players.iter().map(|p| p.id)
    }

    /// Seats a new player.
    ///
    /// # Errors
    /// - [`LobbyError::AlreadyStarted`] unless the lobby is waiting.
    /// - [`LobbyError::Full`] at capacity.
    /// - [`LobbyError::AlreadyInLobby`] for a duplicate id.
    /// - [`LobbyError::UsernameTaken`] for a duplicate display name
    ///   (case-insensitive).
    pub fn join(&mut self, player: NewPlayer) -> Result<(), LobbyError> {
        if !self.status.is_joinable() {
            return Err(LobbyError::AlreadyStarted(self.code.clone()));
        }
        if self.players.len() >= self.config.max_players {
            return Err(LobbyError::Full(self.code.clone()));
        }
        if self.player(player.id).is_some() {
            return Err(LobbyError::AlreadyInLobby(player.id));
        }
        if self
            .players
            .iter()
            .any(|p| p.username.eq_ignore_ascii_case(&player.username))
        {
            return Err(LobbyError::UsernameTaken(player.username));
        }

        self.players.push(Player {
            id: player.id,
            username: player.username,
            character: player.character,
            is_ready: false,
            connected: true,
            disconnected_at: None,
        });
        Ok(())
    }

    /// Removes a seat entirely, promoting a new host if needed.
    ///
    /// # Errors
    /// [`LobbyError::NotInLobby`] if the player has no seat.
    pub fn remove(
        &mut self,
        player_id: PlayerId,
    ) -> Result<RemovedSeat, LobbyError> {
        let idx = self
            .players
            .iter()
            .position(|p| p.id == player_id)
            .ok_or(LobbyError::NotInLobby(player_id))?;
        let removed = self.players.remove(idx);

        let new_host = if self.host == player_id && !self.players.is_empty() {
            // Join order, preferring a connected player; if everyone is
            // in their grace period, the earliest-joined seat gets it so
            // there is always exactly one host.
            let next = self
                .players
                .iter()
                .find(|p| p.connected)
                .unwrap_or(&self.players[0])
                .id;
            self.host = next;
            Some(next)
        } else {
            None
        };

        Ok(RemovedSeat {
            username: removed.username,
            new_host,
        })
    }

    /// Flips a player's ready flag.
    ///
    /// # Errors
    /// - [`LobbyError::NotInLobby`] if the player has no seat.
    /// - [`LobbyError::InvalidState`] outside the waiting room.
    pub fn set_ready(
        &mut self,
        player_id: PlayerId,
        ready: bool,
    ) -> Result<(), LobbyError> {
        if self.status != LobbyStatus::Waiting {
            return Err(LobbyError::InvalidState(
                "ready only applies in the waiting room".into(),
            ));
        }
        let player = self
            .player_mut(player_id)
            .ok_or(LobbyError::NotInLobby(player_id))?;
        player.is_ready = ready;
        Ok(())
    }

    /// Marks a seat as disconnected, recording when.
    ///
    /// Returns the disconnect instant (the guard token for the sweep),
    /// or an error if the player has no seat.
    pub fn mark_disconnected(
        &mut self,
        player_id: PlayerId,
        at: Instant,
    ) -> Result<Instant, LobbyError> {
        let player = self
            .player_mut(player_id)
            .ok_or(LobbyError::NotInLobby(player_id))?;
        player.connected = false;
        player.disconnected_at = Some(at);
        Ok(at)
    }

    /// Reclaims a held seat.
    pub fn mark_reconnected(
        &mut self,
        player_id: PlayerId,
    ) -> Result<(), LobbyError> {
        let player = self
            .player_mut(player_id)
            .ok_or(LobbyError::NotInLobby(player_id))?;
        player.connected = true;
        player.disconnected_at = None;
        Ok(())
    }

    /// Whether the delayed sweep scheduled at `marked_at` still applies:
    /// the seat exists, is still disconnected, and hasn't been through a
    /// reconnect/re-disconnect cycle since.
    pub fn sweep_applies(
        &self,
        player_id: PlayerId,
        marked_at: Instant,
    ) -> bool {
        self.player(player_id)
            .is_some_and(|p| p.disconnected_at == Some(marked_at))
    }

    /// Validates a start request from `player_id`.
    ///
    /// # Errors
    /// - [`LobbyError::NotHost`] for non-hosts.
    /// - [`LobbyError::InvalidState`] outside the waiting room.
    /// - [`LobbyError::NotAllReady`] if required and someone connected
    ///   hasn't readied up.
    pub fn check_start(&self, player_id: PlayerId) -> Result<(), LobbyError> {
        if !self.is_host(player_id) {
            return Err(LobbyError::NotHost(player_id));
        }
        if self.status != LobbyStatus::Waiting {
            return Err(LobbyError::InvalidState(format!(
                "cannot start a game while {}",
                self.status
            )));
        }
        if self.connected_ids().next().is_none() {
            return Err(LobbyError::InvalidState(
                "no connected players".into(),
            ));
        }
        if self.config.require_all_ready {
            let unready = self
                .players
                .iter()
                .any(|p| p.connected && !p.is_ready);
            if unready {
                return Err(LobbyError::NotAllReady);
            }
        }
        Ok(())
    }

    /// Resets an ended lobby back to the waiting room. Ready flags clear
    /// for everyone but the host.
    ///
    /// # Errors
    /// [`LobbyError::InvalidState`] unless the game has ended.
    pub fn reset_to_waiting(&mut self) -> Result<(), LobbyError> {
        if self.status != LobbyStatus::Ended {
            return Err(LobbyError::InvalidState(
                "can only return to lobby after the game ends".into(),
            ));
        }
        self.status = LobbyStatus::Waiting;
        let host = self.host;
        for player in &mut self.players {
            player.is_ready = player.id == host;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code() -> LobbyCode {
        LobbyCode::parse("AB12CD").unwrap()
    }

    fn new_player(id: u64, name: &str) -> NewPlayer {
        NewPlayer {
            id: PlayerId(id),
            username: name.to_string(),
            character: "bee".to_string(),
        }
    }

    fn lobby_with(names: &[&str]) -> Lobby {
        let mut lobby = Lobby::new(
            code(),
            new_player(1, names[0]),
            GameSettings::default(),
            LobbyConfig::default(),
        );
        for (i, name) in names.iter().enumerate().skip(1) {
            lobby.join(new_player(i as u64 + 1, name)).unwrap();
        }
        lobby
    }

    #[test]
    fn test_new_lobby_host_is_seated_and_ready() {
        let lobby = lobby_with(&["alice"]);
        assert_eq!(lobby.status(), LobbyStatus::Waiting);
        assert_eq!(lobby.host(), PlayerId(1));
        let host = lobby.player(PlayerId(1)).unwrap();
        assert!(host.is_ready);
        assert!(host.connected);
    }

    #[test]
    fn test_join_preserves_join_order() {
        let lobby = lobby_with(&["alice", "bob", "carol"]);
        let names: Vec<&str> =
            lobby.players().iter().map(|p| p.username.as_str()).collect();
        assert_eq!(names, vec!["alice", "bob", "carol"]);
    }

    #[test]
    fn test_join_rejects_duplicate_username_case_insensitive() {
        let mut lobby = lobby_with(&["alice"]);
        let err = lobby.join(new_player(2, "ALICE")).unwrap_err();
        assert!(matches!(err, LobbyError::UsernameTaken(_)));
    }

    #[test]
    fn test_join_rejects_when_full() {
        let mut lobby = Lobby::new(
            code(),
            new_player(1, "p1"),
            GameSettings::default(),
            LobbyConfig {
                max_players: 2,
                ..Default::default()
            },
        );
        lobby.join(new_player(2, "p2")).unwrap();
        let err = lobby.join(new_player(3, "p3")).unwrap_err();
        assert!(matches!(err, LobbyError::Full(_)));
    }

    #[test]
    fn test_join_rejected_after_game_started() {
        let mut lobby = lobby_with(&["alice"]);
        lobby.set_status(LobbyStatus::InProgress);
        let err = lobby.join(new_player(2, "bob")).unwrap_err();
        assert!(matches!(err, LobbyError::AlreadyStarted(_)));
    }

    #[test]
    fn test_remove_non_host_keeps_host() {
        let mut lobby = lobby_with(&["alice", "bob"]);
        let removed = lobby.remove(PlayerId(2)).unwrap();
        assert_eq!(removed.username, "bob");
        assert_eq!(removed.new_host, None);
        assert_eq!(lobby.host(), PlayerId(1));
    }

    #[test]
    fn test_remove_host_promotes_next_in_join_order() {
        let mut lobby = lobby_with(&["alice", "bob", "carol"]);
        let removed = lobby.remove(PlayerId(1)).unwrap();
        assert_eq!(removed.new_host, Some(PlayerId(2)));
        assert_eq!(lobby.host(), PlayerId(2));
    }

    #[test]
    fn test_remove_host_skips_disconnected_players() {
        let mut lobby = lobby_with(&["alice", "bob", "carol"]);
        lobby
            .mark_disconnected(PlayerId(2), Instant::now())
            .unwrap();
        let removed = lobby.remove(PlayerId(1)).unwrap();
        assert_eq!(removed.new_host, Some(PlayerId(3)));
    }

    #[test]
    fn test_remove_host_falls_back_to_earliest_when_all_disconnected() {
        let mut lobby = lobby_with(&["alice", "bob", "carol"]);
        let now = Instant::now();
        lobby.mark_disconnected(PlayerId(2), now).unwrap();
        lobby.mark_disconnected(PlayerId(3), now).unwrap();
        let removed = lobby.remove(PlayerId(1)).unwrap();
        // Everyone left is in grace, but the lobby still needs a host.
        assert_eq!(removed.new_host, Some(PlayerId(2)));
    }

    #[test]
    fn test_remove_last_player_leaves_empty_lobby() {
        let mut lobby = lobby_with(&["alice"]);
        lobby.remove(PlayerId(1)).unwrap();
        assert!(lobby.is_empty());
    }

    #[test]
    fn test_remove_unknown_player() {
        let mut lobby = lobby_with(&["alice"]);
        let err = lobby.remove(PlayerId(9)).unwrap_err();
        assert!(matches!(err, LobbyError::NotInLobby(_)));
    }

    #[test]
    fn test_set_ready_flips_flag() {
        let mut lobby = lobby_with(&["alice", "bob"]);
        assert!(!lobby.player(PlayerId(2)).unwrap().is_ready);
        lobby.set_ready(PlayerId(2), true).unwrap();
        assert!(lobby.player(PlayerId(2)).unwrap().is_ready);
        lobby.set_ready(PlayerId(2), false).unwrap();
        assert!(!lobby.player(PlayerId(2)).unwrap().is_ready);
    }

    #[test]
    fn test_set_ready_rejected_mid_game() {
        let mut lobby = lobby_with(&["alice"]);
        lobby.set_status(LobbyStatus::InProgress);
        let err = lobby.set_ready(PlayerId(1), true).unwrap_err();
        assert!(matches!(err, LobbyError::InvalidState(_)));
    }

    #[test]
    fn test_check_start_happy_path() {
        let mut lobby = lobby_with(&["alice", "bob"]);
        lobby.set_ready(PlayerId(2), true).unwrap();
        assert!(lobby.check_start(PlayerId(1)).is_ok());
    }

    #[test]
    fn test_check_start_rejects_non_host() {
        let mut lobby = lobby_with(&["alice", "bob"]);
        lobby.set_ready(PlayerId(2), true).unwrap();
        let err = lobby.check_start(PlayerId(2)).unwrap_err();
        assert!(matches!(err, LobbyError::NotHost(_)));
    }

    #[test]
    fn test_check_start_requires_all_connected_ready() {
        let lobby = lobby_with(&["alice", "bob"]);
        let err = lobby.check_start(PlayerId(1)).unwrap_err();
        assert!(matches!(err, LobbyError::NotAllReady));
    }

    #[test]
    fn test_check_start_ignores_disconnected_unready_player() {
        let mut lobby = lobby_with(&["alice", "bob"]);
        lobby
            .mark_disconnected(PlayerId(2), Instant::now())
            .unwrap();
        // Bob never readied, but he's in grace — he doesn't block.
        assert!(lobby.check_start(PlayerId(1)).is_ok());
    }

    #[test]
    fn test_check_start_without_ready_requirement() {
        let mut lobby = Lobby::new(
            code(),
            new_player(1, "solo"),
            GameSettings::default(),
            LobbyConfig {
                require_all_ready: false,
                ..Default::default()
            },
        );
        lobby.join(new_player(2, "idle")).unwrap();
        assert!(lobby.check_start(PlayerId(1)).is_ok());
    }

    #[test]
    fn test_check_start_rejected_when_already_running() {
        let mut lobby = lobby_with(&["alice"]);
        lobby.set_status(LobbyStatus::InProgress);
        let err = lobby.check_start(PlayerId(1)).unwrap_err();
        assert!(matches!(err, LobbyError::InvalidState(_)));
    }

    #[test]
    fn test_sweep_guard_survives_reconnect_cycle() {
        let mut lobby = lobby_with(&["alice", "bob"]);
        let first = Instant::now();
        lobby.mark_disconnected(PlayerId(2), first).unwrap();
        assert!(lobby.sweep_applies(PlayerId(2), first));

        // Bob reconnects; the old sweep must no longer apply.
        lobby.mark_reconnected(PlayerId(2)).unwrap();
        assert!(!lobby.sweep_applies(PlayerId(2), first));

        // He drops again: only the new sweep token applies.
        let second = first + std::time::Duration::from_secs(5);
        lobby.mark_disconnected(PlayerId(2), second).unwrap();
        assert!(!lobby.sweep_applies(PlayerId(2), first));
        assert!(lobby.sweep_applies(PlayerId(2), second));
    }

    #[test]
    fn test_reset_to_waiting_clears_ready_except_host() {
        let mut lobby = lobby_with(&["alice", "bob"]);
        lobby.set_ready(PlayerId(2), true).unwrap();
        lobby.set_status(LobbyStatus::Ended);

        lobby.reset_to_waiting().unwrap();

        assert_eq!(lobby.status(), LobbyStatus::Waiting);
        assert!(lobby.player(PlayerId(1)).unwrap().is_ready);
        assert!(!lobby.player(PlayerId(2)).unwrap().is_ready);
    }

    #[test]
    fn test_reset_to_waiting_requires_ended() {
        let mut lobby = lobby_with(&["alice"]);
        let err = lobby.reset_to_waiting().unwrap_err();
        assert!(matches!(err, LobbyError::InvalidState(_)));
    }
}
