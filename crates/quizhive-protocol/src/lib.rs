//! Wire protocol for QuizHive.
//!
//! This crate defines the "language" that quiz clients and the server
//! speak:
//!
//! - **Types** ([`ClientEvent`], [`ServerEvent`], [`LobbySnapshot`], etc.)
//!   — the structures that travel on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how those messages are
//!   converted to/from bytes.
//! - **Errors** ([`ProtocolError`]) — what can go wrong during
//!   encoding/decoding.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw frames) and the lobby
//! engine (player context). It doesn't know about connections or lobbies —
//! it only knows how to describe and serialize events.
//!
//! ```text
//! Transport (frames) → Protocol (ClientEvent/ServerEvent) → Lobby engine
//! ```
//!
//! Every event is internally tagged JSON with a colon-namespaced name,
//! e.g. `{"event": "lobby:join", "code": "AB12CD", ...}`.

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    ClientEvent, ErrorCode, FinalStanding, GamePhase, GameSettings,
    GameSnapshot, LevelUp, LobbyCode, LobbySnapshot, LobbyStatus, PlayerId,
    PlayerView, QuestionView, Recipient, ScoreboardEntry, ServerEvent,
};
