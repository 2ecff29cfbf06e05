//! Streak-multiplier scoring.
//!
//! Scoring is pure arithmetic over [`ScoringRules`] and [`PlayerScore`]
//! so it can be unit-tested (and re-tuned) without a game session, let
//! alone a transport.

use std::time::Duration;

/// Tunable scoring constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoringRules {
    /// Points for a correct answer before the multiplier.
    pub base_points: u32,
    /// The streak multiplier never exceeds this.
    pub multiplier_cap: u32,
    /// Extra points for an instant answer, scaling linearly down to zero
    /// at the deadline.
    pub max_time_bonus: u32,
}

impl Default for ScoringRules {
    fn default() -> Self {
        Self {
            base_points: 100,
            multiplier_cap: 5,
            max_time_bonus: 50,
        }
    }
}

impl ScoringRules {
    /// Time bonus for answering after `elapsed` of a `limit`-long window.
    ///
    /// Linear in the remaining fraction of the window; an answer at (or
    /// past) the deadline earns nothing.
    pub fn time_bonus(&self, elapsed: Duration, limit: Duration) -> u32 {
        if limit.is_zero() || elapsed >= limit {
            return 0;
        }
        let remaining = (limit - elapsed).as_secs_f64() / limit.as_secs_f64();
        (self.max_time_bonus as f64 * remaining).round() as u32
    }
}

/// One player's accumulated score state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerScore {
    pub score: u32,
    /// Consecutive correct answers (0 after a miss).
    pub streak: u32,
    pub correct_answers: u32,
    pub wrong_answers: u32,
    /// Question index of the most recent correct answer. Used as the
    /// final tie-break: whoever reached their score earlier ranks higher.
    pub last_correct_at: Option<usize>,
}

/// The outcome of scoring one player for one question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreEvent {
    pub is_correct: bool,
    pub points_awarded: u32,
    /// The multiplier the award was computed with (1 on a miss).
    pub multiplier: u32,
    /// Total score after the award.
    pub score: u32,
}

impl PlayerScore {
    pub fn new() -> Self {
        Self {
            score: 0,
            streak: 0,
            correct_answers: 0,
            wrong_answers: 0,
            last_correct_at: None,
        }
    }

    /// The multiplier the *next* correct answer would be scored with.
    pub fn multiplier(&self, rules: &ScoringRules) -> u32 {
        (self.streak + 1).min(rules.multiplier_cap).max(1)
    }

    /// Scores a correct answer given `elapsed` of the question window.
    pub fn record_correct(
        &mut self,
        rules: &ScoringRules,
        elapsed: Duration,
        limit: Duration,
        question_index: usize,
    ) -> ScoreEvent {
        let multiplier = self.multiplier(rules);
        let points =
            rules.base_points * multiplier + rules.time_bonus(elapsed, limit);
        self.score += points;
        self.streak += 1;
        self.correct_answers += 1;
        self.last_correct_at = Some(question_index);
        ScoreEvent {
            is_correct: true,
            points_awarded: points,
            multiplier,
            score: self.score,
        }
    }

    /// Scores a wrong or missing answer: no points, streak resets.
    pub fn record_wrong(&mut self) -> ScoreEvent {
        self.streak = 0;
        self.wrong_answers += 1;
        ScoreEvent {
            is_correct: false,
            points_awarded: 0,
            multiplier: 1,
            score: self.score,
        }
    }
}

impl Default for PlayerScore {
    fn default() -> Self {
        Self::new()
    }
}
