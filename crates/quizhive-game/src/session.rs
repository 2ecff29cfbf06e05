//! The per-lobby game session state machine.
//!
//! A [`GameSession`] owns the fetched questions, every player's score
//! state, and the answers for the question in flight. It is deliberately
//! free of I/O and clocks: callers pass `Instant`s in, and all timing
//! decisions (when to resolve, when to advance) live with the lobby
//! actor that owns the session. That keeps the whole question lifecycle
//! unit-testable with plain synchronous calls.
//!
//! # Phases
//!
//! ```text
//! Starting ──begin_question──▶ QuestionActive ──resolve──▶ QuestionResolved
//!                 ▲                                              │
//!                 └──────────── advance (more left) ◀────────────┤
//!                                                                │
//!                                       advance (none left) ──▶ Ended
//! ```
//!
//! Every transition bumps the generation counter, so deadlines armed
//! against an older phase can be recognized as stale and ignored.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use quizhive_protocol::{GamePhase, GameSnapshot, PlayerId, QuestionView};
use rand::seq::SliceRandom;
use tracing::debug;

use crate::{GameError, PlayerScore, Question, ScoreEvent, ScoringRules};

/// A recorded answer for the current question. First answer wins.
#[derive(Debug, Clone, Copy)]
struct Answer {
    index: usize,
    /// Server-measured time from question start to receipt, clamped to
    /// the question window.
    elapsed: Duration,
}

/// Everything produced by resolving one question.
#[derive(Debug)]
pub struct ResolveOutcome {
    pub correct_index: usize,
    /// Per-player results, including players who never answered.
    pub results: Vec<(PlayerId, ScoreEvent)>,
}

/// State machine for one game, owned by a lobby actor.
#[derive(Debug)]
pub struct GameSession {
    questions: Vec<Question>,
    time_limit: Duration,
    rules: ScoringRules,
    phase: GamePhase,
    current: usize,
    generation: u64,
    question_started: Option<Instant>,
    answers: HashMap<PlayerId, Answer>,
    scores: HashMap<PlayerId, PlayerScore>,
}

impl GameSession {
    /// Creates a session over the given questions and players.
    ///
    /// # Errors
    /// Returns [`GameError::NoQuestions`] for an empty question list.
    pub fn new(
        mut questions: Vec<Question>,
        players: impl IntoIterator<Item = PlayerId>,
        time_limit: Duration,
        rules: ScoringRules,
        shuffle: bool,
    ) -> Result<Self, GameError> {
        if questions.is_empty() {
            return Err(GameError::NoQuestions);
        }
        if shuffle {
            questions.shuffle(&mut rand::rng());
        }
        Ok(Self {
            questions,
            time_limit,
            rules,
            phase: GamePhase::Starting,
            current: 0,
            generation: 0,
            question_started: None,
            answers: HashMap::new(),
            scores: players
                .into_iter()
                .map(|p| (p, PlayerScore::new()))
                .collect(),
        })
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    /// Generation counter; bumped on every phase transition. Deadlines
    /// are tagged with this so stale ones can be detected.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn time_limit(&self) -> Duration {
        self.time_limit
    }

    pub fn scoring_rules(&self) -> &ScoringRules {
        &self.rules
    }

    pub fn total_questions(&self) -> usize {
        self.questions.len()
    }

    /// 1-based number of the current question.
    pub fn question_number(&self) -> usize {
        self.current + 1
    }

    /// How many answers the current question has collected.
    pub fn answered_count(&self) -> usize {
        self.answers.len()
    }

    pub fn score(&self, player: PlayerId) -> Option<&PlayerScore> {
        self.scores.get(&player)
    }

    /// The multiplier `player`'s next correct answer would earn.
    pub fn multiplier(&self, player: PlayerId) -> u32 {
        self.scores
            .get(&player)
            .map_or(1, |s| s.multiplier(&self.rules))
    }

    /// Activates the current question.
    ///
    /// Valid from `Starting` (first question) or `QuestionResolved`
    /// (after [`advance`](Self::advance) reported more questions).
    pub fn begin_question(
        &mut self,
        now: Instant,
    ) -> Result<QuestionView, GameError> {
        match self.phase {
            GamePhase::Starting | GamePhase::QuestionResolved => {}
            actual => return Err(GameError::BadPhase { actual }),
        }
        self.phase = GamePhase::QuestionActive;
        self.generation += 1;
        self.question_started = Some(now);
        self.answers.clear();
        let question = &self.questions[self.current];
        debug!(
            question = self.question_number(),
            total = self.total_questions(),
            generation = self.generation,
            "question activated"
        );
        Ok(question.view(self.time_limit.as_secs()))
    }

    /// Records `player`'s answer, stamped at `now`.
    ///
    /// Returns the total answered count for the current question. The
    /// first answer wins: repeats are rejected, never overwritten.
    pub fn record_answer(
        &mut self,
        player: PlayerId,
        index: usize,
        now: Instant,
    ) -> Result<usize, GameError> {
        if self.phase != GamePhase::QuestionActive {
            return Err(GameError::BadPhase { actual: self.phase });
        }
        if !self.scores.contains_key(&player) {
            return Err(GameError::UnknownPlayer(player));
        }
        let options = self.questions[self.current].options.len();
        if index >= options {
            return Err(GameError::InvalidAnswer { index, options });
        }
        if self.answers.contains_key(&player) {
            return Err(GameError::AlreadyAnswered(player));
        }

        // Monotonic clock: now >= question_started. Clamp to the window
        // so an answer racing the deadline never earns a negative bonus.
        let started = self
            .question_started
            .ok_or(GameError::BadPhase { actual: self.phase })?;
        let elapsed = now.duration_since(started).min(self.time_limit);

        self.answers.insert(player, Answer { index, elapsed });
        Ok(self.answers.len())
    }

    /// `true` once every player in `connected` has answered.
    ///
    /// The caller supplies the connected set because connectivity is
    /// lobby state, not game state — players in their disconnect grace
    /// don't hold up the question.
    pub fn all_answered(
        &self,
        connected: impl IntoIterator<Item = PlayerId>,
    ) -> bool {
        let mut any = false;
        for player in connected {
            any = true;
            if !self.answers.contains_key(&player) {
                return false;
            }
        }
        any
    }

    /// Closes the current question and scores every player.
    ///
    /// Players without a recorded answer are scored as wrong (streak
    /// reset, no points).
    pub fn resolve(&mut self) -> Result<ResolveOutcome, GameError> {
        if self.phase != GamePhase::QuestionActive {
            return Err(GameError::BadPhase { actual: self.phase });
        }
        self.phase = GamePhase::QuestionResolved;
        self.generation += 1;
        self.question_started = None;

        let correct_index = self.questions[self.current].correct_index;
        let question_index = self.current;
        let limit = self.time_limit;
        let rules = self.rules;

        let mut results = Vec::with_capacity(self.scores.len());
        for (&player, score) in &mut self.scores {
            let event = match self.answers.get(&player) {
                Some(answer) if answer.index == correct_index => score
                    .record_correct(
                        &rules,
                        answer.elapsed,
                        limit,
                        question_index,
                    ),
                _ => score.record_wrong(),
            };
            results.push((player, event));
        }

        debug!(
            question = self.question_number(),
            answered = self.answers.len(),
            "question resolved"
        );
        Ok(ResolveOutcome {
            correct_index,
            results,
        })
    }

    /// Moves past a resolved question.
    ///
    /// Returns `Ok(true)` if another question awaits (follow with
    /// [`begin_question`](Self::begin_question)), or `Ok(false)` when the
    /// game just ended.
    pub fn advance(&mut self) -> Result<bool, GameError> {
        if self.phase != GamePhase::QuestionResolved {
            return Err(GameError::BadPhase { actual: self.phase });
        }
        self.generation += 1;
        if self.current + 1 < self.questions.len() {
            self.current += 1;
            Ok(true)
        } else {
            self.phase = GamePhase::Ended;
            self.answers.clear();
            debug!("game ended");
            Ok(false)
        }
    }

    /// Drops a player whose seat was removed mid-game.
    pub fn remove_player(&mut self, player: PlayerId) {
        self.scores.remove(&player);
        self.answers.remove(&player);
    }

    /// Time left in the current question window at `now`.
    pub fn time_remaining(&self, now: Instant) -> Duration {
        match (self.phase, self.question_started) {
            (GamePhase::QuestionActive, Some(started)) => self
                .time_limit
                .saturating_sub(now.duration_since(started)),
            _ => Duration::ZERO,
        }
    }

    /// Players ordered best-first: score desc, then fewer wrong answers,
    /// then earlier last correct answer.
    pub fn ranking(&self) -> Vec<(PlayerId, PlayerScore)> {
        let mut entries: Vec<(PlayerId, PlayerScore)> =
            self.scores.iter().map(|(&p, &s)| (p, s)).collect();
        entries.sort_by(|(a_id, a), (b_id, b)| {
            b.score
                .cmp(&a.score)
                .then(a.wrong_answers.cmp(&b.wrong_answers))
                .then(
                    a.last_correct_at
                        .map_or(usize::MAX, |i| i)
                        .cmp(&b.last_correct_at.map_or(usize::MAX, |i| i)),
                )
                .then(a_id.0.cmp(&b_id.0))
        });
        entries
    }

    /// Builds the resync snapshot for one recipient.
    ///
    /// Only the recipient's own answer is included; nothing in the
    /// payload reveals the correct option.
    pub fn snapshot_for(&self, player: PlayerId, now: Instant) -> GameSnapshot {
        let question = match self.phase {
            GamePhase::QuestionActive => Some(
                self.questions[self.current]
                    .view(self.time_limit.as_secs()),
            ),
            _ => None,
        };
        GameSnapshot {
            phase: self.phase,
            question_number: self.question_number(),
            total_questions: self.total_questions(),
            time_remaining_ms: self.time_remaining(now).as_millis() as u64,
            question,
            your_answer: self.answers.get(&player).map(|a| a.index),
        }
    }
}
