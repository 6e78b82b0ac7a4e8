use std::ops::Range;

use ndarray::{Array1, ArrayView1, s};
use rayon::prelude::{IntoParallelIterator, ParallelIterator};

use crate::{
    Error,
    config::DpaConfig,
    distinguishers::{GUESS_RANGE, GuessScores},
    leakage_model::{aes::BLOCK_SIZE, intermediate},
    stats,
    trace::{Trace, TraceSet},
};

/// Compute the [`Dpa`] of key byte `byte` over `traces`.
///
/// For each guess, traces are split in two groups by [`DpaConfig::selection`] applied to the
/// guessed S-box output. The guess score is the largest absolute difference between the mean
/// samples of both groups over the leakage window of `byte`, see [`DpaConfig::samples_range`]. If a group is empty, the score is NaN.
///
/// # Errors
/// Fails if the traces are not full waveforms or if a leakage window exceeds them.
///
/// # Panics
/// Panic if `byte >= BLOCK_SIZE`.
pub fn dpa(traces: &TraceSet, byte: usize, config: &DpaConfig) -> Result<Dpa, Error> {
    assert!(byte < BLOCK_SIZE);
    config.check(traces)?;

    Ok(dpa_unchecked(traces, byte, config))
}

/// [`dpa`] for a configuration already checked against `traces`.
pub(crate) fn dpa_unchecked(traces: &TraceSet, byte: usize, config: &DpaConfig) -> Dpa {
    let scores: Vec<f64> = (0..GUESS_RANGE)
        .into_par_iter()
        .map(|guess| {
            let curve = differential_curve_unchecked(traces, byte, guess as u8, config);
            stats::max_abs(curve.view())
        })
        .collect();

    Dpa {
        byte,
        scores: Array1::from_vec(scores),
    }
}

/// Return the absolute difference of the group means over the leakage window of `byte`.
///
/// # Panics
/// Panic if `byte >= BLOCK_SIZE`.
pub fn differential_curve(
    traces: &TraceSet,
    byte: usize,
    guess: u8,
    config: &DpaConfig,
) -> Result<Array1<f64>, Error> {
    assert!(byte < BLOCK_SIZE);
    config.check(traces)?;

    Ok(differential_curve_unchecked(traces, byte, guess, config))
}

fn differential_curve_unchecked(
    traces: &TraceSet,
    byte: usize,
    guess: u8,
    config: &DpaConfig,
) -> Array1<f64> {
    let range = config.samples_range(byte);
    let num_samples = range.len();

    let (group_1, group_2): (Vec<&Trace>, Vec<&Trace>) =
        traces.traces().iter().partition(|trace| {
            config
                .selection
                .select(intermediate(trace.plaintext[byte], guess), config.threshold)
        });

    let mean_1 = stats::mean_columns(
        group_1.iter().map(|&t| window(t, byte, range.clone())),
        num_samples,
    );
    let mean_2 = stats::mean_columns(
        group_2.iter().map(|&t| window(t, byte, range.clone())),
        num_samples,
    );

    let mut curve = Array1::zeros(num_samples);
    stats::sub(mean_1.view(), mean_2.view(), curve.view_mut());
    curve.mapv_inplace(f64::abs);

    curve
}

fn window(trace: &Trace, byte: usize, range: Range<usize>) -> ArrayView1<'_, f64> {
    trace.samples(byte).slice_move(s![range])
}

/// Result of the DPA[^1] on one key byte.
///
/// [^1]: <https://paulkocher.com/doc/DifferentialPowerAnalysis.pdf>
#[derive(Debug, Clone)]
pub struct Dpa {
    byte: usize,
    /// Maximum absolute difference of means of each guess
    scores: Array1<f64>,
}

impl Dpa {
    /// Attacked key byte index.
    pub fn byte(&self) -> usize {
        self.byte
    }
}

impl GuessScores for Dpa {
    fn scores(&self) -> ArrayView1<f64> {
        self.scores.view()
    }
}
