//! Error types for the session layer.

use quizhive_protocol::PlayerId;

/// Errors that can occur during authentication and session management.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The credentials were rejected by the
    /// [`Authenticator`](crate::Authenticator) — bad token, invalid
    /// guest name, or the auth backend said no.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// No session exists for the given player.
    #[error("session not found for player {0}")]
    NotFound(PlayerId),

    /// The player already has a live connection. One socket per
    /// identity; a second connection must wait for the first to drop.
    #[error("player {0} already has an active session")]
    AlreadyConnected(PlayerId),
}
