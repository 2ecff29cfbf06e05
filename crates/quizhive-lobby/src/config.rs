//! Lobby configuration.

use std::time::Duration;

use quizhive_game::ScoringRules;

/// Server-side policy for every lobby. Shared across the registry;
/// per-game knobs live in
/// [`GameSettings`](quizhive_protocol::GameSettings) instead.
#[derive(Debug, Clone)]
pub struct LobbyConfig {
    /// Maximum seats per lobby.
    pub max_players: usize,

    /// Whether starting a game requires every connected player to have
    /// readied up. Turn off for solo testing.
    pub require_all_ready: bool,

    /// How long a dropped player's seat is held before it's released.
    pub disconnect_grace: Duration,

    /// How long an empty lobby lingers before the actor shuts down.
    pub empty_grace: Duration,

    /// Pause between resolving one question and showing the next.
    pub inter_question_pause: Duration,

    /// Scoring constants applied to every game in this deployment.
    pub scoring: ScoringRules,
}

impl Default for LobbyConfig {
    fn default() -> Self {
        Self {
            max_players: 8,
            require_all_ready: true,
            disconnect_grace: Duration::from_secs(30),
            empty_grace: Duration::from_secs(30),
            inter_question_pause: Duration::from_secs(5),
            scoring: ScoringRules::default(),
        }
    }
}
