//! The lobby registry: code allocation, lookup, and lifecycle events.

use std::collections::HashMap;
use std::sync::Arc;

use quizhive_game::{HallOfFame, ProfileService, QuestionSource, Services};
use quizhive_protocol::{GameSettings, LobbyCode, LobbySnapshot, PlayerId};
use rand::Rng;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::actor::spawn_lobby;
use crate::{EventSender, Lobby, LobbyConfig, LobbyError, LobbyHandle, NewPlayer};

/// Commands per lobby that may queue before backpressure kicks in.
const COMMAND_CHANNEL_SIZE: usize = 64;

/// Attempts at drawing an unused invite code before giving up.
const CODE_ATTEMPTS: usize = 64;

const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Lifecycle notifications from lobby actors back to whoever owns the
/// registry. Actors can't touch the registry maps directly (they'd
/// deadlock on the same lock the gateway holds), so index maintenance
/// flows through this channel instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    /// The lobby actor stopped; forget its handle.
    LobbyClosed(LobbyCode),
    /// A seat was released from inside an actor (grace sweep); the
    /// player may join lobbies again.
    SeatReleased(PlayerId),
}

/// Owns the handle for every live lobby and the player-to-lobby index
/// that enforces one lobby per player.
///
/// The registry is plain mutable state; callers wrap it in whatever
/// synchronization the embedding server uses.
pub struct LobbyRegistry<Q, H, P> {
    lobbies: HashMap<LobbyCode, LobbyHandle>,
    player_lobbies: HashMap<PlayerId, LobbyCode>,
    services: Arc<Services<Q, H, P>>,
    config: LobbyConfig,
    events: mpsc::UnboundedSender<RegistryEvent>,
}

impl<Q, H, P> LobbyRegistry<Q, H, P>
where
    Q: QuestionSource,
    H: HallOfFame,
    P: ProfileService,
{
    /// Creates a registry. The returned receiver carries lifecycle
    /// events that the owner must feed back via [`apply_event`]
    /// (typically from a small dedicated task).
    ///
    /// [`apply_event`]: LobbyRegistry::apply_event
    pub fn new(
        services: Arc<Services<Q, H, P>>,
        config: LobbyConfig,
    ) -> (Self, mpsc::UnboundedReceiver<RegistryEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        (
            Self {
                lobbies: HashMap::new(),
                player_lobbies: HashMap::new(),
                services,
                config,
                events,
            },
            events_rx,
        )
    }

    pub fn lobby_count(&self) -> usize {
        self.lobbies.len()
    }

    /// The code of the lobby `player_id` currently occupies, if any.
    pub fn lobby_of(&self, player_id: PlayerId) -> Option<&LobbyCode> {
        self.player_lobbies.get(&player_id)
    }

    pub fn handle(&self, code: &LobbyCode) -> Option<LobbyHandle> {
        self.lobbies.get(code).cloned()
    }

    /// Creates a lobby with `host` seated and returns its handle plus
    /// the snapshot the host should render.
    pub async fn create_lobby(
        &mut self,
        host: NewPlayer,
        settings: Option<GameSettings>,
        sender: EventSender,
    ) -> Result<(LobbyHandle, LobbySnapshot), LobbyError> {
        if let Some(code) = self.player_lobbies.get(&host.id) {
            debug!(player_id = %host.id, %code, "refusing create, already seated");
            return Err(LobbyError::AlreadyInLobby(host.id));
        }

        let code = self.generate_code()?;
        let host_id = host.id;
        let lobby = Lobby::new(
            code.clone(),
            host,
            settings.unwrap_or_default(),
            self.config.clone(),
        );
        let handle = spawn_lobby(
            lobby,
            sender,
            Arc::clone(&self.services),
            self.events.clone(),
            COMMAND_CHANNEL_SIZE,
        );
        let snapshot = handle.snapshot(host_id).await?;

        info!(%code, player_id = %host_id, lobbies = self.lobbies.len() + 1, "lobby created");
        self.lobbies.insert(code.clone(), handle.clone());
        self.player_lobbies.insert(host_id, code);
        Ok((handle, snapshot))
    }

    /// Seats `player` in the lobby under `code`.
    pub async fn join_lobby(
        &mut self,
        code: &LobbyCode,
        player: NewPlayer,
        sender: EventSender,
    ) -> Result<(LobbyHandle, LobbySnapshot), LobbyError> {
        if self.player_lobbies.contains_key(&player.id) {
            return Err(LobbyError::AlreadyInLobby(player.id));
        }
        let handle = self
            .handle(code)
            .ok_or_else(|| LobbyError::NotFound(code.clone()))?;

        let player_id = player.id;
        let snapshot = handle.join(player, sender).await?;
        self.player_lobbies.insert(player_id, code.clone());
        Ok((handle, snapshot))
    }

    /// Reattaches a disconnected player to the seat held for them in
    /// the lobby under `code`.
    pub async fn reconnect(
        &mut self,
        code: &LobbyCode,
        player_id: PlayerId,
        sender: EventSender,
    ) -> Result<(LobbyHandle, LobbySnapshot), LobbyError> {
        let handle = self
            .handle(code)
            .ok_or_else(|| LobbyError::NotFound(code.clone()))?;
        let snapshot = handle.reconnect(player_id, sender).await?;
        // Seat was held, so the index entry normally survives; restore
        // it in case a sweep raced the reconnect and lost.
        self.player_lobbies.insert(player_id, code.clone());
        Ok((handle, snapshot))
    }

    /// Removes `player_id` from whatever lobby they occupy.
    pub async fn leave(&mut self, player_id: PlayerId) -> Result<(), LobbyError> {
        let code = self
            .player_lobbies
            .get(&player_id)
            .cloned()
            .ok_or(LobbyError::NotInLobby(player_id))?;
        let handle = self
            .handle(&code)
            .ok_or_else(|| LobbyError::NotFound(code.clone()))?;
        handle.leave(player_id).await?;
        self.player_lobbies.remove(&player_id);
        Ok(())
    }

    /// Folds one actor lifecycle event into the registry's indexes.
    pub fn apply_event(&mut self, event: RegistryEvent) {
        match event {
            RegistryEvent::LobbyClosed(code) => {
                self.lobbies.remove(&code);
                self.player_lobbies.retain(|_, c| *c != code);
                info!(%code, lobbies = self.lobbies.len(), "lobby closed");
            }
            RegistryEvent::SeatReleased(player_id) => {
                self.player_lobbies.remove(&player_id);
            }
        }
    }

    fn generate_code(&self) -> Result<LobbyCode, LobbyError> {
        let mut rng = rand::rng();
        for _ in 0..CODE_ATTEMPTS {
            let raw: String = (0..LobbyCode::LEN)
                .map(|_| {
                    CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())]
                        as char
                })
                .collect();
            let code = LobbyCode::from_generated(raw);
            if !self.lobbies.contains_key(&code) {
                return Ok(code);
            }
        }
        Err(LobbyError::CodeSpaceExhausted)
    }
}
