//! Error types for the lobby layer.

use quizhive_game::GameError;
use quizhive_protocol::{ErrorCode, LobbyCode, PlayerId};

/// Errors that can occur during lobby operations.
#[derive(Debug, thiserror::Error)]
pub enum LobbyError {
    /// No lobby exists under this code.
    #[error("lobby {0} not found")]
    NotFound(LobbyCode),

    /// Every seat is taken.
    #[error("lobby {0} is full")]
    Full(LobbyCode),

    /// The game already started; the lobby accepts no new players.
    #[error("lobby {0} already started its game")]
    AlreadyStarted(LobbyCode),

    /// The player already occupies a seat in some lobby.
    /// One lobby at a time.
    #[error("player {0} is already in a lobby")]
    AlreadyInLobby(PlayerId),

    /// The player has no seat in this lobby.
    #[error("player {0} is not in this lobby")]
    NotInLobby(PlayerId),

    /// Host-only operation attempted by a non-host.
    #[error("player {0} is not the host")]
    NotHost(PlayerId),

    /// Another seated player already uses this display name.
    #[error("username '{0}' is already taken in this lobby")]
    UsernameTaken(String),

    /// Not every connected player is ready.
    #[error("cannot start: not all players are ready")]
    NotAllReady,

    /// The operation doesn't fit the lobby's current status.
    #[error("invalid lobby state for this operation: {0}")]
    InvalidState(String),

    /// The lobby's command channel is gone (actor stopped).
    #[error("lobby {0} is unavailable")]
    Unavailable(LobbyCode),

    /// Ran out of attempts to generate an unused invite code.
    #[error("could not allocate an unused lobby code")]
    CodeSpaceExhausted,

    /// A game-layer failure surfaced through a lobby operation.
    #[error(transparent)]
    Game(#[from] GameError),
}

impl LobbyError {
    /// The wire error code clients receive for this failure.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound(_) => ErrorCode::LobbyNotFound,
            Self::Full(_) => ErrorCode::LobbyFull,
            Self::AlreadyStarted(_) => ErrorCode::AlreadyStarted,
            Self::NotHost(_) => ErrorCode::NotHost,
            Self::UsernameTaken(_) => ErrorCode::Validation,
            Self::AlreadyInLobby(_)
            | Self::NotInLobby(_)
            | Self::NotAllReady
            | Self::InvalidState(_) => ErrorCode::BadState,
            Self::Unavailable(_) | Self::CodeSpaceExhausted => {
                ErrorCode::Internal
            }
            Self::Game(err) => match err {
                GameError::InvalidAnswer { .. } => ErrorCode::Validation,
                GameError::BadPhase { .. }
                | GameError::AlreadyAnswered(_) => ErrorCode::BadState,
                _ => ErrorCode::Internal,
            },
        }
    }
}
