//! End-of-game results and the out-of-process collaborator seams.
//!
//! When a game ends the lobby actor reports results to two optional
//! collaborators: a hall of fame (persistent leaderboards) and a profile
//! service (experience and levels). Both are traits so deployments can
//! plug in a database or HTTP client; the `Null*` implementations make
//! both concerns opt-in.

use quizhive_protocol::PlayerId;

use crate::{GameError, GameSession};

/// One player's final result, ready for persistence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameOutcome {
    pub player: PlayerId,
    /// 1-based final placement.
    pub rank: usize,
    pub score: u32,
    pub correct_answers: u32,
    pub wrong_answers: u32,
}

/// Builds the ranked outcomes for a finished session.
pub fn final_outcomes(session: &GameSession) -> Vec<GameOutcome> {
    session
        .ranking()
        .into_iter()
        .enumerate()
        .map(|(i, (player, score))| GameOutcome {
            player,
            rank: i + 1,
            score: score.score,
            correct_answers: score.correct_answers,
            wrong_answers: score.wrong_answers,
        })
        .collect()
}

/// Persists finished games to a leaderboard.
pub trait HallOfFame: Send + Sync + 'static {
    /// Records the final outcomes of one game.
    ///
    /// Failures are logged by the caller, never surfaced to players —
    /// a leaderboard outage must not break the game-over flow.
    fn record_game(
        &self,
        outcomes: &[GameOutcome],
    ) -> impl std::future::Future<Output = Result<(), GameError>> + Send;
}

/// Awards experience to player profiles after a game.
pub trait ProfileService: Send + Sync + 'static {
    /// Credits `score` worth of experience to `player`.
    ///
    /// Returns `Some(new_level)` if the award pushed the player over a
    /// level boundary, `None` otherwise.
    fn award_experience(
        &self,
        player: PlayerId,
        score: u32,
    ) -> impl std::future::Future<Output = Result<Option<u32>, GameError>> + Send;
}

/// A [`HallOfFame`] that records nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullHallOfFame;

impl HallOfFame for NullHallOfFame {
    async fn record_game(
        &self,
        _outcomes: &[GameOutcome],
    ) -> Result<(), GameError> {
        Ok(())
    }
}

/// A [`ProfileService`] that awards nothing and never levels anyone up.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProfileService;

impl ProfileService for NullProfileService {
    async fn award_experience(
        &self,
        _player: PlayerId,
        _score: u32,
    ) -> Result<Option<u32>, GameError> {
        Ok(None)
    }
}

/// The bundle of collaborators every lobby actor shares.
#[derive(Debug)]
pub struct Services<Q, H, P> {
    pub questions: Q,
    pub hall_of_fame: H,
    pub profiles: P,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Question, ScoringRules};
    use std::time::{Duration, Instant};

    #[test]
    fn test_final_outcomes_assigns_sequential_ranks() {
        let questions = vec![Question {
            id: 0,
            prompt: "Q".into(),
            options: vec!["a".into(), "b".into()],
            correct_index: 0,
        }];
        let mut session = GameSession::new(
            questions,
            [PlayerId(1), PlayerId(2)],
            Duration::from_secs(60),
            ScoringRules::default(),
            false,
        )
        .unwrap();
        let t0 = Instant::now();
        session.begin_question(t0).unwrap();
        session.record_answer(PlayerId(2), 0, t0).unwrap();
        session.resolve().unwrap();
        session.advance().unwrap();

        let outcomes = final_outcomes(&session);
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].player, PlayerId(2));
        assert_eq!(outcomes[0].rank, 1);
        assert_eq!(outcomes[1].rank, 2);
        assert_eq!(outcomes[1].score, 0);
    }

    #[tokio::test]
    async fn test_null_collaborators_are_no_ops() {
        NullHallOfFame.record_game(&[]).await.unwrap();
        let level = NullProfileService
            .award_experience(PlayerId(1), 500)
            .await
            .unwrap();
        assert_eq!(level, None);
    }
}
