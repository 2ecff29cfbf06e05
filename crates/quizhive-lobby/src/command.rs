//! Commands into a lobby actor, and the handle that sends them.
//!
//! Every mutation of a lobby travels through its actor's mpsc channel,
//! so all state changes for one code are serialized while different
//! lobbies run fully concurrently. Commands that need an answer carry a
//! oneshot reply channel; fire-and-forget commands report failures as
//! `error` events on the issuing player's event channel instead.

use std::time::Instant;

use quizhive_protocol::{LobbyCode, LobbySnapshot, LobbyStatus, PlayerId, ServerEvent};
use tokio::sync::{mpsc, oneshot};

use crate::{LobbyError, NewPlayer};

/// Channel sender for delivering server events to one player's
/// connection handler.
pub type EventSender = mpsc::UnboundedSender<ServerEvent>;

/// Commands processed by a lobby actor.
pub(crate) enum LobbyCommand {
    /// Seat a new player.
    Join {
        player: NewPlayer,
        sender: EventSender,
        reply: oneshot::Sender<Result<LobbySnapshot, LobbyError>>,
    },

    /// Reattach a player whose seat is held through a disconnect.
    Reconnect {
        player_id: PlayerId,
        sender: EventSender,
        reply: oneshot::Sender<Result<LobbySnapshot, LobbyError>>,
    },

    /// Voluntarily give up a seat.
    Leave {
        player_id: PlayerId,
        reply: oneshot::Sender<Result<(), LobbyError>>,
    },

    SetReady {
        player_id: PlayerId,
        ready: bool,
    },

    StartGame {
        player_id: PlayerId,
    },

    ReturnToLobby {
        player_id: PlayerId,
    },

    Chat {
        player_id: PlayerId,
        message: String,
    },

    /// An answer, stamped with the server-side receipt instant.
    Answer {
        player_id: PlayerId,
        answer_index: usize,
        received_at: Instant,
    },

    /// The player's socket dropped; hold their seat for the grace
    /// period.
    Disconnected {
        player_id: PlayerId,
    },

    /// Delayed follow-up to `Disconnected`: release the seat if the
    /// player is still gone. `marked_at` guards against a sweep acting
    /// on a newer disconnect than the one that scheduled it.
    SweepDisconnected {
        player_id: PlayerId,
        marked_at: Instant,
    },

    /// Delayed follow-up to the lobby becoming empty: shut down if
    /// nobody arrived in the meantime.
    CheckEmpty,

    /// Request lobby metadata.
    Info {
        reply: oneshot::Sender<LobbyInfo>,
    },

    /// Request the full resync snapshot for one player.
    Snapshot {
        player_id: PlayerId,
        reply: oneshot::Sender<LobbySnapshot>,
    },
}

/// A snapshot of lobby metadata (not the full player list).
#[derive(Debug, Clone)]
pub struct LobbyInfo {
    pub code: LobbyCode,
    pub status: LobbyStatus,
    pub player_count: usize,
    pub max_players: usize,
}

/// Handle to a running lobby actor. Cheap to clone.
#[derive(Debug, Clone)]
pub struct LobbyHandle {
    code: LobbyCode,
    sender: mpsc::Sender<LobbyCommand>,
}

impl LobbyHandle {
    pub(crate) fn new(
        code: LobbyCode,
        sender: mpsc::Sender<LobbyCommand>,
    ) -> Self {
        Self { code, sender }
    }

    pub fn code(&self) -> &LobbyCode {
        &self.code
    }

    pub(crate) fn command_sender(&self) -> mpsc::Sender<LobbyCommand> {
        self.sender.clone()
    }

    fn unavailable(&self) -> LobbyError {
        LobbyError::Unavailable(self.code.clone())
    }

    async fn send(&self, cmd: LobbyCommand) -> Result<(), LobbyError> {
        self.sender
            .send(cmd)
            .await
            .map_err(|_| self.unavailable())
    }

    /// Seats a player and returns the snapshot they should render.
    pub async fn join(
        &self,
        player: NewPlayer,
        sender: EventSender,
    ) -> Result<LobbySnapshot, LobbyError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(LobbyCommand::Join {
            player,
            sender,
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| self.unavailable())?
    }

    /// Reattaches a disconnected player to their held seat.
    pub async fn reconnect(
        &self,
        player_id: PlayerId,
        sender: EventSender,
    ) -> Result<LobbySnapshot, LobbyError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(LobbyCommand::Reconnect {
            player_id,
            sender,
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| self.unavailable())?
    }

    pub async fn leave(&self, player_id: PlayerId) -> Result<(), LobbyError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(LobbyCommand::Leave {
            player_id,
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| self.unavailable())?
    }

    pub async fn set_ready(
        &self,
        player_id: PlayerId,
        ready: bool,
    ) -> Result<(), LobbyError> {
        self.send(LobbyCommand::SetReady { player_id, ready }).await
    }

    pub async fn start_game(
        &self,
        player_id: PlayerId,
    ) -> Result<(), LobbyError> {
        self.send(LobbyCommand::StartGame { player_id }).await
    }

    pub async fn return_to_lobby(
        &self,
        player_id: PlayerId,
    ) -> Result<(), LobbyError> {
        self.send(LobbyCommand::ReturnToLobby { player_id }).await
    }

    pub async fn chat(
        &self,
        player_id: PlayerId,
        message: String,
    ) -> Result<(), LobbyError> {
        self.send(LobbyCommand::Chat { player_id, message }).await
    }

    /// Submits an answer stamped at `received_at` (taken by the gateway
    /// the moment the frame arrived, so channel latency doesn't eat into
    /// the player's time bonus).
    pub async fn answer(
        &self,
        player_id: PlayerId,
        answer_index: usize,
        received_at: Instant,
    ) -> Result<(), LobbyError> {
        self.send(LobbyCommand::Answer {
            player_id,
            answer_index,
            received_at,
        })
        .await
    }

    /// Reports a dropped socket. The seat is held for the grace period.
    pub async fn disconnected(
        &self,
        player_id: PlayerId,
    ) -> Result<(), LobbyError> {
        self.send(LobbyCommand::Disconnected { player_id }).await
    }

    pub async fn info(&self) -> Result<LobbyInfo, LobbyError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(LobbyCommand::Info { reply: reply_tx }).await?;
        reply_rx.await.map_err(|_| self.unavailable())
    }

    /// Fetches the resync snapshot as `player_id` should see it.
    pub async fn snapshot(
        &self,
        player_id: PlayerId,
    ) -> Result<LobbySnapshot, LobbyError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(LobbyCommand::Snapshot {
            player_id,
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| self.unavailable())
    }
}
