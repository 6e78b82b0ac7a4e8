use std::ops::Range;

use ndarray::{Array1, ArrayView1, ArrayView2, s};
use num_traits::AsPrimitive;
use serde::{Deserialize, Serialize};

use crate::{Error, leakage_model::aes::BLOCK_SIZE};

/// Sample storage of a trace set, declared once for every trace of the set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Layout {
    /// Every trace holds one waveform of `wave_size` samples.
    Full { wave_size: usize },
    /// Every trace holds one window per key byte, the i-th being `section_lengths[i]` samples long.
    Sectioned {
        section_lengths: [usize; BLOCK_SIZE],
    },
}

impl Layout {
    /// Sectioned layout matching the given leakage ranges.
    pub fn from_ranges(ranges: &[Range<usize>; BLOCK_SIZE]) -> Self {
        Layout::Sectioned {
            section_lengths: std::array::from_fn(|i| ranges[i].len()),
        }
    }

    /// Number of samples an attack on `byte` looks at.
    ///
    /// # Panics
    /// Panic if `byte >= BLOCK_SIZE`.
    pub fn num_samples(&self, byte: usize) -> usize {
        assert!(byte < BLOCK_SIZE);

        match self {
            Layout::Full { wave_size } => *wave_size,
            Layout::Sectioned { section_lengths } => section_lengths[byte],
        }
    }
}

/// Waveform of a trace.
#[derive(Debug, Clone, PartialEq)]
pub enum Wave {
    /// The whole acquisition window.
    Full(Array1<f64>),
    /// The leakage window of each key byte.
    Sectioned([Array1<f64>; BLOCK_SIZE]),
}

/// A side channel measurement associated to the plaintext processed by the device.
#[derive(Debug, Clone, PartialEq)]
pub struct Trace {
    pub wave: Wave,
    /// Known plaintext
    pub plaintext: [u8; BLOCK_SIZE],
    /// Ground truth key, for validation only
    pub key: Option<[u8; BLOCK_SIZE]>,
}

impl Trace {
    pub fn new(wave: Wave, plaintext: [u8; BLOCK_SIZE]) -> Self {
        Self {
            wave,
            plaintext,
            key: None,
        }
    }

    pub fn with_key(mut self, key: [u8; BLOCK_SIZE]) -> Self {
        self.key = Some(key);
        self
    }

    /// Samples in scope for `byte`: the whole wave, or the byte's section.
    ///
    /// # Panics
    /// Panic if `byte >= BLOCK_SIZE`.
    pub fn samples(&self, byte: usize) -> ArrayView1<f64> {
        assert!(byte < BLOCK_SIZE);

        match &self.wave {
            Wave::Full(wave) => wave.view(),
            Wave::Sectioned(sections) => sections[byte].view(),
        }
    }

    /// Returns the total number of points in the waveform.
    pub fn len(&self) -> usize {
        match &self.wave {
            Wave::Full(wave) => wave.len(),
            Wave::Sectioned(sections) => sections.iter().map(Array1::len).sum(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_layout(&self, index: usize, layout: &Layout) -> Result<(), Error> {
        match (&self.wave, layout) {
            (Wave::Full(wave), Layout::Full { wave_size }) => {
                if wave.len() != *wave_size {
                    return Err(Error::ShapeMismatch {
                        what: format!("wave of trace {index}"),
                        expected: *wave_size,
                        actual: wave.len(),
                    });
                }
            }
            (Wave::Sectioned(sections), Layout::Sectioned { section_lengths }) => {
                for (byte, (section, &expected)) in
                    sections.iter().zip(section_lengths.iter()).enumerate()
                {
                    if section.len() != expected {
                        return Err(Error::ShapeMismatch {
                            what: format!("section {byte} of trace {index}"),
                            expected,
                            actual: section.len(),
                        });
                    }
                }
            }
            _ => {
                return Err(Error::LayoutMismatch(format!(
                    "trace {index} does not use the declared layout"
                )));
            }
        }

        Ok(())
    }
}

/// Traces sharing one declared [`Layout`].
#[derive(Debug, Clone)]
pub struct TraceSet {
    layout: Layout,
    traces: Vec<Trace>,
}

impl TraceSet {
    /// Create a trace set, checking every trace against `layout`.
    pub fn new(layout: Layout, traces: Vec<Trace>) -> Result<Self, Error> {
        if traces.is_empty() {
            return Err(Error::EmptyTraceSet);
        }
        for (i, trace) in traces.iter().enumerate() {
            trace.check_layout(i, &layout)?;
        }

        Ok(Self { layout, traces })
    }

    /// Build a [`Layout::Full`] trace set from one trace per row of `samples`.
    ///
    /// # Examples
    /// ```
    /// use keyrec::trace::{Layout, TraceSet};
    /// use ndarray::{array, Array2};
    ///
    /// let samples = array![[1i16, 2, 3], [4, 5, 6]];
    /// let plaintexts = Array2::<u8>::zeros((2, 16));
    /// let traces = TraceSet::full_from_arrays(samples.view(), plaintexts.view()).unwrap();
    /// assert_eq!(traces.layout(), &Layout::Full { wave_size: 3 });
    /// ```
    pub fn full_from_arrays<T>(
        samples: ArrayView2<T>,
        plaintexts: ArrayView2<u8>,
    ) -> Result<Self, Error>
    where
        T: AsPrimitive<f64>,
    {
        check_plaintexts(samples.nrows(), plaintexts)?;

        let traces = samples
            .rows()
            .into_iter()
            .zip(plaintexts.rows())
            .map(|(row, plaintext)| {
                Trace::new(Wave::Full(row.mapv(|x| x.as_())), block(plaintext))
            })
            .collect();

        Self::new(
            Layout::Full {
                wave_size: samples.ncols(),
            },
            traces,
        )
    }

    /// Build a [`Layout::Sectioned`] trace set by cutting every row of `samples` into the leakage
    /// window of each key byte.
    pub fn sectioned_from_arrays<T>(
        samples: ArrayView2<T>,
        plaintexts: ArrayView2<u8>,
        ranges: &[Range<usize>; BLOCK_SIZE],
    ) -> Result<Self, Error>
    where
        T: AsPrimitive<f64>,
    {
        check_plaintexts(samples.nrows(), plaintexts)?;

        let wave_size = samples.ncols();
        for (byte, range) in ranges.iter().enumerate() {
            if range.is_empty() || range.end > wave_size {
                return Err(Error::InvalidRange {
                    byte,
                    start: range.start,
                    end: range.end,
                    wave_size,
                });
            }
        }

        let traces = samples
            .rows()
            .into_iter()
            .zip(plaintexts.rows())
            .map(|(row, plaintext)| {
                let sections = std::array::from_fn(|byte| {
                    row.slice(s![ranges[byte].clone()]).mapv(|x| x.as_())
                });
                Trace::new(Wave::Sectioned(sections), block(plaintext))
            })
            .collect();

        Self::new(Layout::from_ranges(ranges), traces)
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn traces(&self) -> &[Trace] {
        &self.traces
    }

    /// Returns the number of traces.
    pub fn len(&self) -> usize {
        self.traces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.traces.is_empty()
    }

    /// Number of samples per trace in scope for `byte`.
    pub fn num_samples(&self, byte: usize) -> usize {
        self.layout.num_samples(byte)
    }

    /// Waveform length, for [`Layout::Full`] sets only.
    pub fn wave_size(&self) -> Option<usize> {
        match self.layout {
            Layout::Full { wave_size } => Some(wave_size),
            Layout::Sectioned { .. } => None,
        }
    }

    /// Plaintext byte `byte` of every trace.
    pub fn plaintext_bytes(&self, byte: usize) -> impl Iterator<Item = u8> + '_ {
        assert!(byte < BLOCK_SIZE);

        self.traces.iter().map(move |trace| trace.plaintext[byte])
    }

    /// Samples in scope for `byte` of every trace.
    pub fn samples(&self, byte: usize) -> impl Iterator<Item = ArrayView1<'_, f64>> + '_ {
        self.traces.iter().map(move |trace| trace.samples(byte))
    }

    /// Ground truth key of the set, if the first trace carries one.
    pub fn known_key(&self) -> Option<[u8; BLOCK_SIZE]> {
        self.traces.first().and_then(|trace| trace.key)
    }
}

fn check_plaintexts(num_traces: usize, plaintexts: ArrayView2<u8>) -> Result<(), Error> {
    if plaintexts.nrows() != num_traces {
        return Err(Error::ShapeMismatch {
            what: "plaintext rows".to_string(),
            expected: num_traces,
            actual: plaintexts.nrows(),
        });
    }
    if plaintexts.ncols() != BLOCK_SIZE {
        return Err(Error::ShapeMismatch {
            what: "plaintext length".to_string(),
            expected: BLOCK_SIZE,
            actual: plaintexts.ncols(),
        });
    }

    Ok(())
}

fn block(row: ArrayView1<u8>) -> [u8; BLOCK_SIZE] {
    std::array::from_fn(|i| row[i])
}
