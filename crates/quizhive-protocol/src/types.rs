//! Core wire types for QuizHive.
//!
//! Everything here is serialized to JSON and exchanged with clients.
//! The one hard rule: nothing in this module may ever carry the correct
//! answer of a live question — clients only see [`QuestionView`], which
//! is produced by redacting the server-side question record.

use serde::{Deserialize, Serialize};

use std::fmt;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for an authenticated player.
///
/// Newtype over `u64` so a player id can't be confused with any other
/// counter. `#[serde(transparent)]` keeps the JSON a plain number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

/// A 6-character uppercase alphanumeric lobby invite code.
///
/// Codes are generated server-side; [`LobbyCode::parse`] validates codes
/// arriving from clients (uppercasing on the way in, so `ab12cd` joins
/// `AB12CD`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LobbyCode(String);

impl LobbyCode {
    /// Fixed length of every lobby code.
    pub const LEN: usize = 6;

    /// Validates and normalizes a client-supplied code.
    pub fn parse(raw: &str) -> Option<Self> {
        let code = raw.trim().to_ascii_uppercase();
        if code.len() == Self::LEN
            && code.bytes().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
        {
            Some(Self(code))
        } else {
            None
        }
    }

    /// Wraps an already-valid generated code.
    ///
    /// Callers must guarantee the shape; the lobby registry's generator
    /// only produces valid codes.
    pub fn from_generated(code: String) -> Self {
        debug_assert!(Self::parse(&code).is_some(), "generated code must be valid");
        Self(code)
    }

    /// The raw code string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LobbyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Recipient — who should receive an event?
// ---------------------------------------------------------------------------

/// Specifies who should receive a server event.
///
/// Lobby logic returns `(Recipient, ServerEvent)` pairs; the actor's
/// dispatch step resolves each recipient against the currently connected
/// players of the room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    /// Every connected player in the lobby.
    All,
    /// One specific player.
    Player(PlayerId),
    /// Everyone except the specified player (e.g. "bob answered" goes to
    /// everyone but bob).
    AllExcept(PlayerId),
}

// ---------------------------------------------------------------------------
// Lobby & game wire state
// ---------------------------------------------------------------------------

/// Lifecycle status of a lobby.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LobbyStatus {
    Waiting,
    Starting,
    InProgress,
    Ended,
}

impl LobbyStatus {
    /// Returns `true` if the lobby accepts new players.
    pub fn is_joinable(&self) -> bool {
        matches!(self, Self::Waiting)
    }

    /// Returns `true` if a game session exists for this lobby.
    pub fn has_session(&self) -> bool {
        matches!(self, Self::Starting | Self::InProgress | Self::Ended)
    }
}

impl fmt::Display for LobbyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Waiting => write!(f, "waiting"),
            Self::Starting => write!(f, "starting"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Ended => write!(f, "ended"),
        }
    }
}

/// Phase of the per-question state machine, as exposed to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GamePhase {
    Starting,
    QuestionActive,
    QuestionResolved,
    Ended,
}

/// Per-game settings chosen at lobby creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSettings {
    /// Number of questions to play.
    pub question_count: usize,
    /// Per-question time limit in seconds.
    pub time_limit_secs: u64,
    /// Which question set to draw from.
    pub question_set: String,
    /// Whether to shuffle the fetched questions.
    #[serde(default)]
    pub shuffle_questions: bool,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            question_count: 5,
            time_limit_secs: 60,
            question_set: "general".to_string(),
            shuffle_questions: false,
        }
    }
}

/// A question as clients see it: prompt and options, never the answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionView {
    pub id: u64,
    pub prompt: String,
    pub options: Vec<String>,
    pub time_limit_secs: u64,
}

/// One player's public state inside a lobby.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerView {
    pub username: String,
    pub character: String,
    pub score: u32,
    pub multiplier: u32,
    pub is_host: bool,
    pub is_ready: bool,
    pub connected: bool,
}

/// One row of the live scoreboard, ranked best-first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreboardEntry {
    pub username: String,
    pub score: u32,
    pub multiplier: u32,
}

/// A player's final placement when the game ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalStanding {
    pub rank: usize,
    pub username: String,
    pub score: u32,
    pub correct_answers: u32,
    pub wrong_answers: u32,
}

/// A level-up notification from the profile collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelUp {
    pub username: String,
    pub level: u32,
}

/// Snapshot of the game session, personalized for one recipient.
///
/// `your_answer` is the recipient's own recorded answer for the current
/// question (if any) — other players' answers are never included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub phase: GamePhase,
    /// 1-based index of the current question.
    pub question_number: usize,
    pub total_questions: usize,
    pub time_remaining_ms: u64,
    /// The active question, redacted. `None` outside `QuestionActive`.
    pub question: Option<QuestionView>,
    pub your_answer: Option<usize>,
}

/// A complete, self-sufficient representation of a lobby.
///
/// Sent on create/join and on reconnect so a client can resynchronize
/// without any event history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LobbySnapshot {
    pub code: LobbyCode,
    pub status: LobbyStatus,
    pub players: Vec<PlayerView>,
    pub settings: GameSettings,
    pub game: Option<GameSnapshot>,
}

// ---------------------------------------------------------------------------
// Error payloads
// ---------------------------------------------------------------------------

/// Machine-readable error category carried on every `error` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Malformed inbound payload.
    Validation,
    LobbyNotFound,
    LobbyFull,
    AlreadyStarted,
    NotHost,
    /// Operation not valid in the current lobby/game state.
    BadState,
    Unauthorized,
    Internal,
}

// ---------------------------------------------------------------------------
// ClientEvent — everything a client can send
// ---------------------------------------------------------------------------

/// Inbound events. `hello` must be the first event on every connection;
/// everything else is rejected until the handshake completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum ClientEvent {
    /// Handshake: a bearer token for authenticated play, or a display
    /// name for guest play. Exactly one should be set.
    #[serde(rename = "hello")]
    Hello {
        token: Option<String>,
        guest_name: Option<String>,
    },

    #[serde(rename = "lobby:create")]
    CreateLobby {
        character: String,
        #[serde(default)]
        settings: Option<GameSettings>,
    },

    #[serde(rename = "lobby:join")]
    JoinLobby { code: String, character: String },

    #[serde(rename = "lobby:leave")]
    LeaveLobby,

    #[serde(rename = "lobby:ready")]
    Ready { ready: bool },

    #[serde(rename = "lobby:start_game")]
    StartGame,

    /// Host-only: reset an ended lobby back to the waiting room.
    #[serde(rename = "lobby:return")]
    ReturnToLobby,

    /// Lobby chat.
    #[serde(rename = "lobby:broadcast")]
    Chat { message: String },

    #[serde(rename = "game:answer")]
    Answer { answer_index: usize },
}

// ---------------------------------------------------------------------------
// ServerEvent — everything the server can send
// ---------------------------------------------------------------------------

/// Outbound events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum ServerEvent {
    /// Handshake acknowledgement. `resumed` is `true` when the connection
    /// was reattached to an existing lobby seat.
    #[serde(rename = "welcome")]
    Welcome {
        player_id: PlayerId,
        username: String,
        resumed: bool,
    },

    #[serde(rename = "lobby:created")]
    LobbyCreated { lobby: LobbySnapshot },

    #[serde(rename = "lobby:joined")]
    LobbyJoined { lobby: LobbySnapshot },

    #[serde(rename = "lobby:player_joined")]
    PlayerJoined { player: PlayerView },

    #[serde(rename = "lobby:player_ready")]
    PlayerReady { username: String, ready: bool },

    #[serde(rename = "lobby:player_left")]
    PlayerLeft {
        username: String,
        /// Set when the departure triggered a host promotion.
        new_host: Option<String>,
    },

    /// A player dropped but their seat is held for the grace period.
    #[serde(rename = "lobby:player_disconnected")]
    PlayerDisconnected { username: String },

    /// A player reclaimed their held seat within the grace period.
    #[serde(rename = "lobby:player_reconnected")]
    PlayerReconnected { username: String },

    #[serde(rename = "lobby:game_started")]
    GameStarted {
        question: QuestionView,
        question_number: usize,
        total_questions: usize,
        time_remaining_secs: u64,
    },

    #[serde(rename = "lobby:message")]
    Message { username: String, message: String },

    #[serde(rename = "lobby:returned")]
    ReturnedToLobby { lobby: LobbySnapshot },

    /// A subsequent question (the first travels on `lobby:game_started`).
    #[serde(rename = "game:question")]
    Question {
        question: QuestionView,
        question_number: usize,
        total_questions: usize,
        time_remaining_secs: u64,
    },

    /// Progress ticker while a question is live.
    #[serde(rename = "game:answer_received")]
    AnswerReceived {
        username: String,
        answered_count: usize,
    },

    /// Per-player outcome, sent individually at resolution.
    #[serde(rename = "game:answer_result")]
    AnswerResult {
        is_correct: bool,
        correct_index: usize,
        points_awarded: u32,
        multiplier: u32,
        score: u32,
    },

    #[serde(rename = "game:score_update")]
    ScoreUpdate { scoreboard: Vec<ScoreboardEntry> },

    /// The deadline fired before every connected player answered.
    #[serde(rename = "game:time_up")]
    TimeUp,

    #[serde(rename = "game:ended")]
    GameEnded {
        standings: Vec<FinalStanding>,
        level_ups: Vec<LevelUp>,
    },

    /// Full resync payload for a reconnecting client.
    #[serde(rename = "lobby:snapshot")]
    Snapshot { lobby: LobbySnapshot },

    #[serde(rename = "error")]
    Error { code: ErrorCode, message: String },
}

// =========================================================================
// Tests
// =========================================================================
