//! Convenient utility functions.

use itertools::Itertools;
use ndarray::ArrayView1;

#[cfg(feature = "progress_bar")]
use indicatif::{ProgressBar, ProgressStyle};
#[cfg(feature = "progress_bar")]
use std::time::Duration;

/// Creates a [`ProgressBar`] with a predefined default style.
#[cfg(feature = "progress_bar")]
pub fn progress_bar(len: usize) -> ProgressBar {
    let progress_bar = ProgressBar::new(len as u64).with_style(
        ProgressStyle::with_template("{elapsed_precise} {wide_bar} {pos}/{len} ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    progress_bar.enable_steady_tick(Duration::new(0, 100000000));
    progress_bar
}

/// Return the guesses sorted from the highest score to the lowest.
///
/// Non-finite scores rank last. Equal scores keep ascending guess order.
pub fn rank_guesses(scores: ArrayView1<f64>) -> Vec<u8> {
    debug_assert!(scores.len() <= 256);

    let key = |guess: usize| {
        let score = scores[guess];
        if score.is_finite() {
            score
        } else {
            f64::NEG_INFINITY
        }
    };

    (0..scores.len())
        .sorted_by(|&a, &b| key(b).total_cmp(&key(a)))
        .map(|guess| guess as u8)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::rank_guesses;
    use ndarray::array;

    #[test]
    fn test_rank_guesses() {
        let scores = array![0.1, f64::NAN, 0.9, 0.1, 0.5];
        assert_eq!(rank_guesses(scores.view()), vec![2, 4, 0, 3, 1]);
    }
}
