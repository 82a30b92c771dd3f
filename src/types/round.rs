//! Round types.

use serde::{Deserialize, Serialize};

use super::price::format_fixed;

/// Identifier of a cross-chain messaging domain.
pub type DomainId = u32;

/// One fully aggregated price observation.
///
/// A round is never mutated after creation; every aggregation produces a new
/// value with the next `round_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Round {
    /// Monotonic round identifier, starting at 1.
    pub round_id: u64,
    /// Aggregated price, 1e8 fixed point.
    pub answer: i128,
    /// Unix seconds when the round was started.
    pub started_at: u64,
    /// Unix seconds when the round was answered.
    pub updated_at: u64,
    /// Round in which the answer was computed. Always equals `round_id`.
    pub answered_in_round: u64,
}

impl Round {
    /// Build the round that follows `previous` (or round 1).
    pub fn next_after(previous: Option<&Round>, answer: i128, now: u64) -> Self {
        let round_id = previous.map_or(1, |r| r.round_id + 1);
        Self { round_id, answer, started_at: now, updated_at: now, answered_in_round: round_id }
    }

    /// Whether the round was answered in a single pass.
    pub fn is_complete(&self) -> bool {
        self.answered_in_round == self.round_id
    }

    /// Answer as a human-readable decimal string.
    pub fn formatted_answer(&self) -> String {
        format_fixed(self.answer)
    }
}

impl std::fmt::Display for Round {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "round {} answer {} at {}", self.round_id, self.formatted_answer(), self.updated_at)
    }
}
