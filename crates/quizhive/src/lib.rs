//! # QuizHive
//!
//! A server-authoritative backend for real-time multiplayer quiz games.
//!
//! Players connect over WebSockets, gather in lobbies under
//! six-character invite codes, and play timed question rounds with
//! streak-multiplier scoring. Dropped connections keep their seat for a
//! grace period and resynchronize from a snapshot on reconnect.
//!
//! This meta-crate ties the layers together — transport → protocol →
//! session → lobby → game — behind a single [`QuizHiveServer`].
//! Deployments plug in an [`Authenticator`](quizhive_session::Authenticator)
//! and the game collaborators in [`Services`](quizhive_game::Services).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use quizhive::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), QuizHiveError> {
//!     let services = Services {
//!         questions: StaticQuestionSource::new().with_set("general", vec![]),
//!         hall_of_fame: NullHallOfFame,
//!         profiles: NullProfileService,
//!     };
//!     let server = QuizHiveServerBuilder::new()
//!         .bind("0.0.0.0:8080")
//!         .build(GuestAuthenticator::new(), services)
//!         .await?;
//!     server.run().await
//! }
//! ```

mod error;
mod gateway;
mod server;

pub use error::QuizHiveError;
pub use server::{QuizHiveServer, QuizHiveServerBuilder};

/// Installs a `tracing` subscriber reading the `RUST_LOG` environment
/// variable, falling back to `info`.
///
/// Call once at startup; does nothing if a subscriber is already set.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init();
}

/// Everything needed to stand up a server or write an integration test.
pub mod prelude {
    pub use crate::{
        init_tracing, QuizHiveError, QuizHiveServer, QuizHiveServerBuilder,
    };

    pub use quizhive_game::{
        GameError, GameOutcome, HallOfFame, NullHallOfFame,
        NullProfileService, ProfileService, Question, QuestionSource,
        ScoringRules, Services, StaticQuestionSource,
    };
    pub use quizhive_lobby::{LobbyConfig, LobbyError};
    pub use quizhive_protocol::{
        ClientEvent, ErrorCode, GameSettings, LobbyCode, LobbyStatus,
        PlayerId, ServerEvent,
    };
    pub use quizhive_session::{
        Authenticator, Credentials, GuestAuthenticator, Identity,
        SessionConfig, SessionError,
    };
}
