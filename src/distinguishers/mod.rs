use ndarray::ArrayView1;

use crate::{stats, util::rank_guesses};

pub mod cpa;
pub mod dpa;

/// Guess range upper excluded bound, every value of a key byte.
pub const GUESS_RANGE: usize = 256;

/// Scores of every guess of one key byte, the higher the more likely.
pub trait GuessScores {
    /// Score of each guess. Degenerate guesses score NaN.
    fn scores(&self) -> ArrayView1<f64>;

    /// Return the guess with the highest finite score, the lowest guess on ties.
    fn best_guess(&self) -> Option<u8> {
        stats::argmax(self.scores()).map(|guess| guess as u8)
    }

    /// Rank guesses, most likely first.
    fn rank(&self) -> Vec<u8> {
        rank_guesses(self.scores())
    }
}
