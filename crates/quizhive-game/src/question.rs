//! Server-side question records and the question source seam.
//!
//! [`Question`] carries the correct answer and therefore never crosses
//! the wire — clients only ever see the redacted
//! [`QuestionView`](quizhive_protocol::QuestionView) produced by
//! [`Question::view`].

use std::collections::HashMap;

use quizhive_protocol::QuestionView;
use serde::{Deserialize, Serialize};

use crate::GameError;

/// A quiz question as the server knows it, including the answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: u64,
    pub prompt: String,
    pub options: Vec<String>,
    /// Index into `options` of the correct answer.
    pub correct_index: usize,
}

impl Question {
    /// The redacted form safe to send to clients.
    pub fn view(&self, time_limit_secs: u64) -> QuestionView {
        QuestionView {
            id: self.id,
            prompt: self.prompt.clone(),
            options: self.options.clone(),
            time_limit_secs,
        }
    }
}

/// Supplies questions for a game.
///
/// QuizHive doesn't bundle question content — deployments plug in a
/// database, an HTTP service, or [`StaticQuestionSource`] for fixtures
/// and demos. `Send + Sync + 'static` because the source is shared
/// across every lobby actor.
pub trait QuestionSource: Send + Sync + 'static {
    /// Fetches up to `count` questions from the named set.
    ///
    /// Implementations may return fewer than `count` if the set is small;
    /// callers play whatever comes back.
    ///
    /// # Errors
    /// - [`GameError::UnknownQuestionSet`] if `set` doesn't exist.
    /// - [`GameError::EmptyQuestionSet`] if it exists but holds nothing.
    fn fetch(
        &self,
        set: &str,
        count: usize,
    ) -> impl std::future::Future<Output = Result<Vec<Question>, GameError>> + Send;
}

/// An in-memory [`QuestionSource`] backed by fixed question sets.
#[derive(Debug, Clone, Default)]
pub struct StaticQuestionSource {
    sets: HashMap<String, Vec<Question>>,
}

impl StaticQuestionSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) a named question set.
    pub fn with_set(
        mut self,
        name: impl Into<String>,
        questions: Vec<Question>,
    ) -> Self {
        self.sets.insert(name.into(), questions);
        self
    }
}

impl QuestionSource for StaticQuestionSource {
    async fn fetch(
        &self,
        set: &str,
        count: usize,
    ) -> Result<Vec<Question>, GameError> {
        let questions = self
            .sets
            .get(set)
            .ok_or_else(|| GameError::UnknownQuestionSet(set.to_string()))?;
        if questions.is_empty() {
            return Err(GameError::EmptyQuestionSet(set.to_string()));
        }
        Ok(questions.iter().take(count).cloned().collect())
    }
}
