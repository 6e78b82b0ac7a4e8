//! Full key recovery: one attack per key byte, assembled in byte order.
use std::fmt;

use log::{debug, info, warn};
use ndarray::{Array1, ArrayView1};
use rayon::prelude::{IntoParallelIterator, ParallelIterator};

use crate::{
    Error,
    config::{AttackConfig, Config, DpaConfig},
    distinguishers::{GuessScores, cpa::cpa, dpa::dpa_unchecked},
    leakage_model::aes::BLOCK_SIZE,
    stats,
    trace::TraceSet,
    util::rank_guesses,
};

#[cfg(feature = "progress_bar")]
use crate::util::progress_bar;

/// Key recovered by an attack, along with the score of every guess of every byte.
#[derive(Debug, Clone)]
pub struct RecoveredKey {
    key: [u8; BLOCK_SIZE],
    scores: Vec<Array1<f64>>,
}

impl RecoveredKey {
    /// Recovered key bytes.
    pub fn key(&self) -> &[u8; BLOCK_SIZE] {
        &self.key
    }

    /// Score of every guess of `byte`.
    ///
    /// # Panics
    /// Panic if `byte >= BLOCK_SIZE`.
    pub fn scores(&self, byte: usize) -> ArrayView1<f64> {
        assert!(byte < BLOCK_SIZE);

        self.scores[byte].view()
    }

    /// Guesses of `byte`, most likely first.
    ///
    /// # Panics
    /// Panic if `byte >= BLOCK_SIZE`.
    pub fn rank(&self, byte: usize) -> Vec<u8> {
        rank_guesses(self.scores(byte))
    }

    /// Return `true` if every byte matches `key`.
    pub fn matches(&self, key: &[u8; BLOCK_SIZE]) -> bool {
        &self.key == key
    }

    /// Number of bytes matching `key`.
    pub fn correct_bytes(&self, key: &[u8; BLOCK_SIZE]) -> usize {
        self.key.iter().zip(key).filter(|(a, b)| a == b).count()
    }
}

impl fmt::Display for RecoveredKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.key))
    }
}

/// Parse a key written as 32 hexadecimal digits.
pub fn parse_key(s: &str) -> Result<[u8; BLOCK_SIZE], Error> {
    let bytes = hex::decode(s.trim()).map_err(|e| Error::InvalidKey(e.to_string()))?;

    bytes.try_into().map_err(|bytes: Vec<u8>| {
        Error::InvalidKey(format!("expected {BLOCK_SIZE} bytes, got {}", bytes.len()))
    })
}

/// Recover the key of `traces` with the attack described by `config`.
///
/// # Errors
/// Fails before running any attack if `traces` does not match `config`. Fails with
/// [`Error::Undetermined`] if every guess of a byte is degenerate.
pub fn recover_key(traces: &TraceSet, config: &Config) -> Result<RecoveredKey, Error> {
    config.check(traces)?;

    match &config.attack {
        AttackConfig::Cpa => recover_key_cpa(traces),
        AttackConfig::Dpa(dpa) => recover_key_dpa_unchecked(traces, dpa),
    }
}

/// Recover the key of `traces` with a CPA on every byte.
///
/// # Examples
/// ```
/// use keyrec::key_recovery::recover_key_cpa;
/// use keyrec::leakage_model::hw_leakage;
/// use keyrec::trace::TraceSet;
/// use ndarray::Array2;
///
/// let key: [u8; 16] = *b"YELLOW SUBMARINE";
/// let mut plaintexts = Array2::<u8>::zeros((256, 16));
/// let mut samples = Array2::<f64>::zeros((256, 16));
/// for t in 0..256 {
///     for byte in 0..16 {
///         let p = (t as u8).wrapping_mul(2 * byte as u8 + 1);
///         plaintexts[[t, byte]] = p;
///         samples[[t, byte]] = hw_leakage(p, key[byte]);
///     }
/// }
///
/// let traces = TraceSet::full_from_arrays(samples.view(), plaintexts.view()).unwrap();
/// assert!(recover_key_cpa(&traces).unwrap().matches(&key));
/// ```
pub fn recover_key_cpa(traces: &TraceSet) -> Result<RecoveredKey, Error> {
    info!("CPA key recovery on {} traces", traces.len());

    recover_key_with(|byte| Ok(cpa(traces, byte).scores().to_owned()))
}

/// Recover the key of `traces` with a DPA on every byte.
///
/// # Errors
/// Fails if `traces` are not full waveforms or a leakage window exceeds them.
pub fn recover_key_dpa(traces: &TraceSet, config: &DpaConfig) -> Result<RecoveredKey, Error> {
    config.check(traces)?;

    recover_key_dpa_unchecked(traces, config)
}

fn recover_key_dpa_unchecked(
    traces: &TraceSet,
    config: &DpaConfig,
) -> Result<RecoveredKey, Error> {
    info!(
        "DPA key recovery on {} traces, {:?} selection",
        traces.len(),
        config.selection
    );

    recover_key_with(|byte| Ok(dpa_unchecked(traces, byte, config).scores().to_owned()))
}

fn recover_key_with<F>(attack: F) -> Result<RecoveredKey, Error>
where
    F: Fn(usize) -> Result<Array1<f64>, Error> + Sync,
{
    #[cfg(feature = "progress_bar")]
    let progress = progress_bar(BLOCK_SIZE);

    let scores = (0..BLOCK_SIZE)
        .into_par_iter()
        .map(|byte| {
            let scores = attack(byte);
            #[cfg(feature = "progress_bar")]
            progress.inc(1);
            scores
        })
        .collect::<Result<Vec<_>, _>>()?;

    #[cfg(feature = "progress_bar")]
    progress.finish();

    let mut key = [0; BLOCK_SIZE];
    for (byte, scores) in scores.iter().enumerate() {
        let degenerate = scores.iter().filter(|x| !x.is_finite()).count();
        if degenerate > 0 {
            warn!("Byte {byte}: {degenerate} guesses with a degenerate score");
        }

        let Some(best) = stats::argmax(scores.view()) else {
            return Err(Error::Undetermined { byte });
        };
        debug!("Byte {byte}: {best:02x} (score {:.6})", scores[best]);
        key[byte] = best as u8;
    }

    let recovered = RecoveredKey { key, scores };
    info!("Recovered key {recovered}");

    Ok(recovered)
}
