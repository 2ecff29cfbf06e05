//! The session manager: tracks every player the server knows about.
//!
//! Sessions are keyed by resolved [`PlayerId`], so whether a dropped
//! client resumes its seat depends only on the authenticator handing
//! back the same identity — there is no separate reconnect secret. The
//! manager also remembers which lobby each player occupies, which is
//! how the gateway routes a reconnecting client back to its game.
//!
//! # Concurrency note
//!
//! `SessionManager` is not thread-safe by itself — it's a plain
//! `HashMap` behind whatever lock the server layer chooses. Keeping it
//! single-threaded here avoids hidden locking overhead.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use quizhive_protocol::{LobbyCode, PlayerId};
use tracing::info;

use crate::{Identity, Session, SessionConfig, SessionError, SessionState};

/// Registry of every connected (or recently disconnected) player.
///
/// ```text
/// connect() ──→ [Connected] ──disconnect()──→ [Disconnected]
///                    ↑                             │
///                    ├────── connect() (resume) ───┤
///                    │                             ▼ (grace elapsed)
///                    │                         [Expired] ──→ cleanup_expired()
///                    └── connect() (fresh session, old seat lost)
/// ```
pub struct SessionManager {
    sessions: HashMap<PlayerId, Session>,
    config: SessionConfig,
}

impl SessionManager {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            sessions: HashMap::new(),
            config,
        }
    }

    fn grace(&self) -> Duration {
        Duration::from_secs(self.config.reconnect_grace_secs)
    }

    /// Registers a connection for an authenticated identity.
    ///
    /// Returns `true` if this resumed a session still inside its grace
    /// period — the caller should route the player back into their lobby
    /// and send a snapshot instead of treating them as new. Expired or
    /// absent sessions get a fresh record (and `false`).
    ///
    /// # Errors
    /// [`SessionError::AlreadyConnected`] if the identity already has a
    /// live connection.
    pub fn connect(
        &mut self,
        identity: &Identity,
    ) -> Result<bool, SessionError> {
        let grace = self.grace();
        if let Some(existing) = self.sessions.get_mut(&identity.player_id) {
            match &existing.state {
                SessionState::Connected => {
                    return Err(SessionError::AlreadyConnected(
                        identity.player_id,
                    ));
                }
                SessionState::Disconnected { since }
                    if since.elapsed() <= grace =>
                {
                    existing.state = SessionState::Connected;
                    info!(player_id = %identity.player_id, "session resumed");
                    return Ok(true);
                }
                // Grace elapsed (or already marked Expired): fall through
                // and replace with a fresh session.
                SessionState::Disconnected { .. } | SessionState::Expired => {}
            }
        }

        self.sessions.insert(
            identity.player_id,
            Session {
                player_id: identity.player_id,
                username: identity.username.clone(),
                state: SessionState::Connected,
                lobby: None,
            },
        );
        info!(player_id = %identity.player_id, "session created");
        Ok(false)
    }

    /// Marks a player as disconnected, starting the grace period.
    ///
    /// # Errors
    /// [`SessionError::NotFound`] if no session exists.
    pub fn disconnect(
        &mut self,
        player_id: PlayerId,
    ) -> Result<(), SessionError> {
        let session = self
            .sessions
            .get_mut(&player_id)
            .ok_or(SessionError::NotFound(player_id))?;
        session.state = SessionState::Disconnected {
            since: Instant::now(),
        };
        info!(%player_id, "player disconnected, grace period started");
        Ok(())
    }

    /// Records which lobby the player occupies (or `None` on leave).
    ///
    /// # Errors
    /// [`SessionError::NotFound`] if no session exists.
    pub fn set_lobby(
        &mut self,
        player_id: PlayerId,
        lobby: Option<LobbyCode>,
    ) -> Result<(), SessionError> {
        let session = self
            .sessions
            .get_mut(&player_id)
            .ok_or(SessionError::NotFound(player_id))?;
        session.lobby = lobby;
        Ok(())
    }

    /// The lobby the player currently occupies, if any.
    pub fn lobby_of(&self, player_id: PlayerId) -> Option<LobbyCode> {
        self.sessions
            .get(&player_id)
            .and_then(|s| s.lobby.clone())
    }

    /// Expires every disconnected session whose grace period elapsed.
    ///
    /// Returns the expired players with the lobby they were in, so the
    /// caller can release their seats. Separate from
    /// [`cleanup_expired`](Self::cleanup_expired) so higher layers can
    /// react before the records disappear.
    pub fn expire_stale(&mut self) -> Vec<(PlayerId, Option<LobbyCode>)> {
        let grace = self.grace();
        let mut expired = Vec::new();
        for session in self.sessions.values_mut() {
            if let SessionState::Disconnected { since } = &session.state {
                if since.elapsed() > grace {
                    session.state = SessionState::Expired;
                    expired.push((session.player_id, session.lobby.clone()));
                    info!(
                        player_id = %session.player_id,
                        "session expired (grace period elapsed)"
                    );
                }
            }
        }
        expired
    }

    /// Removes all expired sessions, freeing memory.
    pub fn cleanup_expired(&mut self) {
        self.sessions
            .retain(|_, session| !matches!(session.state, SessionState::Expired));
    }

    pub fn get(&self, player_id: &PlayerId) -> Option<&Session> {
        self.sessions.get(player_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

// =========================================================================
// Tests
// =========================================================================
