//! One-shot deadline timer for the lobby actor's `select!` loop.
//!
//! Each game session advances on a single pending deadline at a time:
//! the question cutoff while a question is live, or the inter-question
//! pause between rounds. [`DeadlineTimer`] holds that one deadline,
//! tagged with the session's generation counter so a deadline armed for
//! question N can never act on question N+1 — if the stale timer fires
//! anyway (it was already past due when cancelled), the generation it
//! returns won't match and the actor drops it.

use std::time::Duration;

use tokio::time::{self, Instant as TokioInstant};
use tracing::trace;

/// A cancellable, generation-tagged one-shot timer.
#[derive(Debug, Default)]
pub struct DeadlineTimer {
    armed: Option<(u64, TokioInstant)>,
}

impl DeadlineTimer {
    pub fn new() -> Self {
        Self { armed: None }
    }

    /// Arms the timer to fire `after` from now, tagged with `generation`.
    /// Replaces any previously armed deadline.
    pub fn arm(&mut self, generation: u64, after: Duration) {
        trace!(generation, after_ms = after.as_millis() as u64, "deadline armed");
        self.armed = Some((generation, TokioInstant::now() + after));
    }

    /// Disarms the timer. [`fired`](Self::fired) pends until re-armed.
    pub fn cancel(&mut self) {
        self.armed = None;
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    /// Resolves with the armed generation when the deadline passes.
    ///
    /// When unarmed this pends forever, so it's safe as a permanent
    /// `tokio::select!` branch. The timer disarms itself on firing.
    pub async fn fired(&mut self) -> u64 {
        let (generation, deadline) = match self.armed {
            Some(armed) => armed,
            None => {
                // Never completes — select! keeps serving other branches.
                std::future::pending::<()>().await;
                unreachable!()
            }
        };

        time::sleep_until(deadline).await;
        self.armed = None;
        trace!(generation, "deadline fired");
        generation
    }
}
