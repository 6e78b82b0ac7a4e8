use ndarray::{Array1, ArrayView1};
use rayon::prelude::{IntoParallelIterator, ParallelIterator};

use crate::{
    distinguishers::{GUESS_RANGE, GuessScores},
    leakage_model::{aes::BLOCK_SIZE, hw_leakage},
    stats,
    trace::TraceSet,
};

/// Compute the [`Cpa`] of key byte `byte` over `traces`.
///
/// Every guess is scored by the largest absolute Pearson correlation, over all the samples in scope
/// for `byte`, between the measured samples and the Hamming weight of the guessed S-box output.
///
/// # Examples
/// ```
/// use keyrec::distinguishers::{cpa::cpa, GuessScores};
/// use keyrec::leakage_model::hw_leakage;
/// use keyrec::trace::TraceSet;
/// use ndarray::Array2;
///
/// let key_byte = 0x2b;
/// let mut plaintexts = Array2::<u8>::zeros((256, 16));
/// let mut samples = Array2::<f64>::zeros((256, 3));
/// for t in 0..256 {
///     plaintexts[[t, 0]] = t as u8;
///     samples[[t, 1]] = 2.0 * hw_leakage(t as u8, key_byte) + 0.5;
///     samples[[t, 2]] = (t % 7) as f64;
/// }
///
/// let traces = TraceSet::full_from_arrays(samples.view(), plaintexts.view()).unwrap();
/// assert_eq!(cpa(&traces, 0).best_guess(), Some(key_byte));
/// ```
///
/// # Panics
/// Panic if `byte >= BLOCK_SIZE`.
pub fn cpa(traces: &TraceSet, byte: usize) -> Cpa {
    assert!(byte < BLOCK_SIZE);

    // Sample means do not depend on the guess
    let means = stats::mean_columns(traces.samples(byte), traces.num_samples(byte));

    let scores: Vec<f64> = (0..GUESS_RANGE)
        .into_par_iter()
        .map(|guess| {
            let corr = correlation_with_means(traces, byte, guess as u8, means.view());
            stats::max_abs(corr.view())
        })
        .collect();

    Cpa {
        byte,
        scores: Array1::from_vec(scores),
    }
}

/// Return the Pearson correlation coefficient of every sample in scope for `byte` under `guess`.
///
/// Samples with zero variance yield NaN.
///
/// # Panics
/// Panic if `byte >= BLOCK_SIZE`.
pub fn correlation(traces: &TraceSet, byte: usize, guess: u8) -> Array1<f64> {
    assert!(byte < BLOCK_SIZE);

    let means = stats::mean_columns(traces.samples(byte), traces.num_samples(byte));
    correlation_with_means(traces, byte, guess, means.view())
}

fn correlation_with_means(
    traces: &TraceSet,
    byte: usize,
    guess: u8,
    means: ArrayView1<f64>,
) -> Array1<f64> {
    let hypothesis: Array1<f64> = traces
        .plaintext_bytes(byte)
        .map(|plaintext_byte| hw_leakage(plaintext_byte, guess))
        .collect();
    let hypothesis_mean = stats::mean(hypothesis.view());

    let mut processor = CpaProcessor::new(means.len());
    for (&h, trace) in hypothesis.iter().zip(traces.samples(byte)) {
        processor.update(h - hypothesis_mean, trace, means);
    }

    processor.finalize()
}

/// Result of the CPA[^1] on one key byte.
///
/// [^1]: <https://www.iacr.org/archive/ches2004/31560016/31560016.pdf>
#[derive(Debug, Clone)]
pub struct Cpa {
    byte: usize,
    /// Maximum absolute correlation of each guess
    scores: Array1<f64>,
}

impl Cpa {
    /// Attacked key byte index.
    pub fn byte(&self) -> usize {
        self.byte
    }
}

impl GuessScores for Cpa {
    fn scores(&self) -> ArrayView1<f64> {
        self.scores.view()
    }
}

/// Accumulates the centered products of a hypothesis and the samples of every trace.
///
/// Both means are known beforehand, see the incremental Pearson of [^1].
///
/// [^1]: <https://eprint.iacr.org/2015/260.pdf>
#[derive(Debug, Clone)]
pub struct CpaProcessor {
    /// Sum of hypothesis deviation times sample deviation
    cov: Array1<f64>,
    /// Sum of squared hypothesis deviations, broadcast to every sample
    var_x: Array1<f64>,
    /// Sum of squared sample deviations
    var_y: Array1<f64>,
    /// Scratch for the deviation of the current trace
    deviation: Array1<f64>,
    /// Number of traces processed
    num_traces: usize,
}

impl CpaProcessor {
    pub fn new(num_samples: usize) -> Self {
        Self {
            cov: Array1::zeros(num_samples),
            var_x: Array1::zeros(num_samples),
            var_y: Array1::zeros(num_samples),
            deviation: Array1::zeros(num_samples),
            num_traces: 0,
        }
    }

    /// # Panics
    /// Panic if `trace` or `means` do not have [`CpaProcessor::num_samples`] samples.
    pub fn update(
        &mut self,
        hypothesis_deviation: f64,
        trace: ArrayView1<f64>,
        means: ArrayView1<f64>,
    ) {
        stats::sub(trace, means, self.deviation.view_mut());

        self.cov.scaled_add(hypothesis_deviation, &self.deviation);
        self.var_x += hypothesis_deviation * hypothesis_deviation;

        self.deviation.mapv_inplace(|d| d * d);
        stats::add_assign(self.var_y.view_mut(), self.deviation.view());

        self.num_traces += 1;
    }

    /// Finalize the calculation after feeding the overall traces.
    pub fn finalize(mut self) -> Array1<f64> {
        stats::mul_assign(self.var_x.view_mut(), self.var_y.view());
        stats::sqrt_assign(self.var_x.view_mut());
        stats::div_assign(self.cov.view_mut(), self.var_x.view());

        self.cov
    }

    pub fn num_samples(&self) -> usize {
        self.cov.len()
    }

    /// Returns the number of traces processed.
    pub fn num_traces(&self) -> usize {
        self.num_traces
    }
}

#[cfg(test)]
mod tests {
    use super::{CpaProcessor, correlation, cpa};
    use crate::{
        distinguishers::{GUESS_RANGE, GuessScores},
        leakage_model::{aes::BLOCK_SIZE, hw_leakage},
        trace::TraceSet,
    };
    use ndarray::{Array2, array};

    /// 256 traces covering every plaintext value of `byte`. Column `leak` is `a * hw + b`, the
    /// others are deterministic fillers.
    fn affine_traces(byte: usize, key_byte: u8, leak: usize, a: f64, b: f64) -> TraceSet {
        let num_samples = 6;
        let mut plaintexts = Array2::<u8>::zeros((256, BLOCK_SIZE));
        let mut samples = Array2::<f64>::zeros((256, num_samples));
        for t in 0..256 {
            for i in 0..BLOCK_SIZE {
                plaintexts[[t, i]] = ((t * 31 + i * 17) % 256) as u8;
            }
            plaintexts[[t, byte]] = t as u8;
            for s in 0..num_samples {
                samples[[t, s]] = ((t * 7919 + s * 104729) % 251) as f64;
            }
            samples[[t, leak]] = a * hw_leakage(t as u8, key_byte) + b;
        }

        TraceSet::full_from_arrays(samples.view(), plaintexts.view()).unwrap()
    }

    #[test]
    fn test_cpa_recovers_affine_leakage() {
        let traces = affine_traces(3, 0xa7, 2, 3.0, 1.0);
        let cpa = cpa(&traces, 3);

        assert_eq!(cpa.byte(), 3);
        assert_eq!(cpa.scores().len(), GUESS_RANGE);
        assert_eq!(cpa.best_guess(), Some(0xa7));
        assert_eq!(cpa.rank()[0], 0xa7);
        assert!((cpa.scores()[0xa7] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_cpa_recovers_anticorrelated_leakage() {
        let traces = affine_traces(0, 0x15, 4, -2.5, 100.0);
        let corr = correlation(&traces, 0, 0x15);

        assert!((corr[4] + 1.0).abs() < 1e-9);
        assert_eq!(cpa(&traces, 0).best_guess(), Some(0x15));
    }

    #[test]
    fn test_cpa_constant_sample_does_not_win() {
        let mut plaintexts = Array2::<u8>::zeros((256, BLOCK_SIZE));
        let mut samples = Array2::<f64>::zeros((256, 2));
        for t in 0..256 {
            plaintexts[[t, 0]] = t as u8;
            samples[[t, 0]] = 7.0;
            samples[[t, 1]] = hw_leakage(t as u8, 0x42);
        }
        let traces = TraceSet::full_from_arrays(samples.view(), plaintexts.view()).unwrap();

        let corr = correlation(&traces, 0, 0x42);
        assert!(corr[0].is_nan());
        assert_eq!(cpa(&traces, 0).best_guess(), Some(0x42));
    }

    #[test]
    fn test_cpa_constant_hypothesis_is_undetermined() {
        // Same plaintext everywhere: every hypothesis has zero variance
        let plaintexts = Array2::<u8>::from_elem((4, BLOCK_SIZE), 0x10);
        let samples = array![[1., 2.], [2., 1.], [3., 5.], [0., 4.]];
        let traces = TraceSet::full_from_arrays(samples.view(), plaintexts.view()).unwrap();

        let cpa = cpa(&traces, 0);
        assert!(cpa.scores().iter().all(|x| x.is_nan()));
        assert_eq!(cpa.best_guess(), None);
    }

    #[test]
    fn test_cpa_sectioned() {
        let key_byte = 0x3c;
        let mut plaintexts = Array2::<u8>::zeros((256, BLOCK_SIZE));
        let mut samples = Array2::<f64>::zeros((256, 64));
        for t in 0..256 {
            plaintexts[[t, 5]] = t as u8;
            for s in 0..64 {
                samples[[t, s]] = ((t * 13 + s * 101) % 97) as f64;
            }
            samples[[t, 22]] = hw_leakage(t as u8, key_byte);
        }
        let ranges = std::array::from_fn(|i| (4 * i)..(4 * i + 4));
        let traces =
            TraceSet::sectioned_from_arrays(samples.view(), plaintexts.view(), &ranges).unwrap();

        // Sample 22 is the third sample of section 5
        let corr = correlation(&traces, 5, key_byte);
        assert_eq!(corr.len(), 4);
        assert!((corr[2] - 1.0).abs() < 1e-9);
        assert_eq!(cpa(&traces, 5).best_guess(), Some(key_byte));
    }

    #[test]
    fn test_cpa_processor() {
        let mut processor = CpaProcessor::new(2);
        let means = array![2., 10.];
        processor.update(-1., array![1., 11.].view(), means.view());
        processor.update(0., array![2., 8.].view(), means.view());
        processor.update(1., array![3., 11.].view(), means.view());

        assert_eq!(processor.num_traces(), 3);
        assert_eq!(processor.num_samples(), 2);
        // First column is x itself, second is uncorrelated
        assert_eq!(processor.finalize(), array![1., 0.]);
    }

    #[test]
    #[should_panic]
    fn test_cpa_byte_out_of_range() {
        let traces = affine_traces(0, 0, 0, 1.0, 0.0);
        cpa(&traces, BLOCK_SIZE);
    }
}
