//! Lobby coordination for quizhive.
//!
//! A lobby is a named gathering place identified by a six-character
//! invite code. Players assemble in a waiting room, ready up, and the
//! host starts a quiz game that the lobby's actor then drives to
//! completion: question deadlines, answer collection, scoring rounds,
//! and the final standings.
//!
//! Every lobby runs as its own Tokio task; the
//! [`LobbyRegistry`] allocates codes, spawns actors, and hands out
//! [`LobbyHandle`]s. All communication happens over channels, so the
//! connection layer never shares locks with game state.

mod actor;
mod command;
mod config;
mod error;
mod lobby;
mod registry;

pub use command::{EventSender, LobbyHandle, LobbyInfo};
pub use config::LobbyConfig;
pub use error::LobbyError;
pub use lobby::{Lobby, NewPlayer, Player, RemovedSeat};
pub use registry::{LobbyRegistry, RegistryEvent};

pub(crate) use command::LobbyCommand;
