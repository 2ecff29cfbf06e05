//! Unified error type for the QuizHive server.

use quizhive_lobby::LobbyError;
use quizhive_protocol::ProtocolError;
use quizhive_session::SessionError;
use quizhive_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// When embedding the `quizhive` server crate, you deal with this single
/// error type instead of importing errors from each sub-crate. The
/// `#[from]` attribute on each variant auto-generates `From` impls, so
/// the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum QuizHiveError {
    /// A transport-level error (connection, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid event).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (auth, reconnect, expired).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A lobby- or game-level error (full, not found, bad state).
    #[error(transparent)]
    Lobby(#[from] LobbyError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use quizhive_protocol::PlayerId;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let top: QuizHiveError = err.into();
        assert!(matches!(top, QuizHiveError::Transport(_)));
        assert!(top.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::InvalidMessage("bad".into());
        let top: QuizHiveError = err.into();
        assert!(matches!(top, QuizHiveError::Protocol(_)));
    }

    #[test]
    fn test_from_session_error() {
        let err = SessionError::AuthFailed("nope".into());
        let top: QuizHiveError = err.into();
        assert!(matches!(top, QuizHiveError::Session(_)));
    }

    #[test]
    fn test_from_lobby_error() {
        let err = LobbyError::NotInLobby(PlayerId(1));
        let top: QuizHiveError = err.into();
        assert!(matches!(top, QuizHiveError::Lobby(_)));
    }
}
