//! Error types for the game layer.

use quizhive_protocol::{GamePhase, PlayerId};

/// Errors that can occur while running a game session.
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    /// The requested question set doesn't exist.
    #[error("unknown question set: {0}")]
    UnknownQuestionSet(String),

    /// The question set exists but has no questions.
    #[error("question set '{0}' is empty")]
    EmptyQuestionSet(String),

    /// A session can't be created over an empty question list.
    #[error("cannot start a game with no questions")]
    NoQuestions,

    /// The operation isn't valid in the current phase — e.g. answering
    /// while no question is active.
    #[error("operation not valid in phase {actual:?}")]
    BadPhase { actual: GamePhase },

    /// The player already answered the current question. First answer
    /// wins; later submissions are rejected, not overwritten.
    #[error("player {0} already answered this question")]
    AlreadyAnswered(PlayerId),

    /// The answer index doesn't point at an option of the current question.
    #[error("answer index {index} out of range (question has {options} options)")]
    InvalidAnswer { index: usize, options: usize },

    /// The player isn't part of this game session.
    #[error("player {0} is not in this game")]
    UnknownPlayer(PlayerId),

    /// A collaborator (question source, hall of fame, profile service)
    /// failed.
    #[error("collaborator error: {0}")]
    Collaborator(String),
}
