//! Game-session engine for QuizHive.
//!
//! This crate owns everything about a running quiz that isn't lobby
//! membership or networking:
//!
//! - [`GameSession`] — the phase machine driving question flow.
//! - [`ScoringRules`] / [`PlayerScore`] — streak-multiplier scoring.
//! - [`DeadlineTimer`] — the one-shot, generation-tagged timer a lobby
//!   actor selects on.
//! - [`QuestionSource`], [`HallOfFame`], [`ProfileService`] — seams for
//!   content and persistence collaborators.
//!
//! The session itself does no I/O and reads no clocks: the owning lobby
//! actor stamps every call with an `Instant` and decides when deadlines
//! fire. That split keeps game rules testable without a runtime.

mod error;
mod question;
mod results;
mod score;
mod session;
mod timer;

pub use error::GameError;
pub use question::{Question, QuestionSource, StaticQuestionSource};
pub use results::{
    final_outcomes, GameOutcome, HallOfFame, NullHallOfFame,
    NullProfileService, ProfileService, Services,
};
pub use score::{PlayerScore, ScoreEvent, ScoringRules};
pub use session::{GameSession, ResolveOutcome};
pub use timer::DeadlineTimer;
