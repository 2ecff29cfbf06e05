//! Session types: the server's record of a player's connection.

use std::time::Instant;

use quizhive_protocol::{LobbyCode, PlayerId};

/// Configuration for session behavior.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long a disconnected player has to reconnect before their
    /// session expires and their lobby seat is released.
    ///
    /// Default: 30 seconds. Set to 0 to disable reconnection.
    pub reconnect_grace_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reconnect_grace_secs: 30,
        }
    }
}

/// Lifecycle state of a session.
///
/// ```text
///   Connected ──(disconnect)──→ Disconnected ──(grace elapses)──→ Expired
///       ↑                            │
///       └────────(reconnect)─────────┘
/// ```
///
/// `Instant` (monotonic) rather than wall-clock time, so a system clock
/// adjustment can't expire everyone at once.
#[derive(Debug, Clone)]
pub enum SessionState {
    /// Player is actively connected.
    Connected,
    /// Player dropped at `since`; their lobby seat is held until the
    /// grace period elapses.
    Disconnected { since: Instant },
    /// Grace elapsed. The session is dead and awaits cleanup.
    Expired,
}

/// One player's session on the server.
#[derive(Debug, Clone)]
pub struct Session {
    pub player_id: PlayerId,
    pub username: String,
    pub state: SessionState,
    /// The lobby this player currently occupies a seat in, if any.
    /// Maintained by the gateway so reconnects can be routed back.
    pub lobby: Option<LobbyCode>,
}
