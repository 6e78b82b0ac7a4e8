//! Attack configuration.
use std::{fs::File, ops::Range, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    Error,
    leakage_model::{MAX_HW, aes::BLOCK_SIZE, hw},
    trace::{Layout, TraceSet},
};

/// Number of samples acquired per trace by the reference setup.
pub const WAVE_SIZE: usize = 3000;

/// Default DPA partition threshold, half of the maximum Hamming weight.
pub const DEFAULT_THRESHOLD: f64 = MAX_HW as f64 / 2.0;

/// Sample index leaking each S-box output in the reference acquisitions.
pub const REFERENCE_LEAKAGE_POINTS: [usize; BLOCK_SIZE] = [
    1505, 1760, 2010, 2262, 1563, 1814, 2067, 2321, 1618, 1871, 2124, 2376, 1676, 1927, 2180, 2429,
];

/// Sample window leaking each S-box output in the reference acquisitions.
pub const REFERENCE_LEAKAGE_RANGES: [Range<usize>; BLOCK_SIZE] = [
    1505..1510,
    1755..1765,
    2005..2015,
    2254..2278,
    1561..1565,
    1805..1820,
    2060..2075,
    2314..2326,
    1615..1625,
    1865..1878,
    2120..2130,
    2370..2384,
    1670..1680,
    1920..1934,
    2175..2185,
    2425..2435,
];

/// How DPA splits traces in two groups from the predicted intermediate value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selection {
    /// First group: Hamming weight below the threshold.
    #[default]
    HammingWeight,
    /// First group: most significant bit set.
    Msb,
    /// First group: least significant bit set.
    Lsb,
}

impl Selection {
    /// Return `true` if `value` belongs to the first group.
    pub fn select(self, value: u8, threshold: f64) -> bool {
        match self {
            Selection::HammingWeight => f64::from(hw(value)) < threshold,
            Selection::Msb => value & 0x80 != 0,
            Selection::Lsb => value & 0x01 != 0,
        }
    }
}

fn default_threshold() -> f64 {
    DEFAULT_THRESHOLD
}

fn default_window() -> usize {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DpaConfig {
    /// Sample index known to leak each key byte
    pub leakage_points: [usize; BLOCK_SIZE],
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    #[serde(default)]
    pub selection: Selection,
    /// Number of consecutive samples examined from each leakage point
    #[serde(default = "default_window")]
    pub window: usize,
    /// Sample window of each key byte, replacing the leakage point and window when set
    #[serde(default)]
    pub leakage_ranges: Option<[Range<usize>; BLOCK_SIZE]>,
}

impl DpaConfig {
    pub fn new(leakage_points: [usize; BLOCK_SIZE]) -> Self {
        Self {
            leakage_points,
            threshold: DEFAULT_THRESHOLD,
            selection: Selection::default(),
            window: default_window(),
            leakage_ranges: None,
        }
    }

    pub fn with_selection(mut self, selection: Selection) -> Self {
        self.selection = selection;
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window;
        self
    }

    /// Examine `ranges[i]` for byte `i` instead of the window starting at its leakage point.
    pub fn with_leakage_ranges(mut self, ranges: [Range<usize>; BLOCK_SIZE]) -> Self {
        self.leakage_ranges = Some(ranges);
        self
    }

    /// Samples examined for `byte`.
    pub fn samples_range(&self, byte: usize) -> Range<usize> {
        if let Some(ranges) = &self.leakage_ranges {
            return ranges[byte].clone();
        }

        let start = self.leakage_points[byte];
        start..start.saturating_add(self.window)
    }

    /// Check that the traces can be attacked with this configuration.
    pub fn check(&self, traces: &TraceSet) -> Result<(), Error> {
        let Some(wave_size) = traces.wave_size() else {
            return Err(Error::LayoutMismatch(
                "DPA requires full waves".to_string(),
            ));
        };
        if let Some(ranges) = &self.leakage_ranges {
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

            return Ok(());
        }
        if self.window == 0 {
            return Err(Error::ShapeMismatch {
                what: "DPA window".to_string(),
                expected: 1,
                actual: 0,
            });
        }
        for byte in 0..BLOCK_SIZE {
            if self.samples_range(byte).end > wave_size {
                return Err(Error::LeakagePointOutOfRange {
                    byte,
                    point: self.leakage_points[byte],
                    window: self.window,
                    wave_size,
                });
            }
        }

        Ok(())
    }
}

impl Default for DpaConfig {
    fn default() -> Self {
        Self::new(REFERENCE_LEAKAGE_POINTS)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttackConfig {
    Cpa,
    Dpa(DpaConfig),
}

/// Complete key recovery configuration.
///
/// # Examples
/// ```
/// use keyrec::config::{AttackConfig, Config, Selection};
/// use keyrec::trace::Layout;
///
/// let config: Config = serde_json::from_str(
///     r#"{
///         "layout": { "kind": "full", "wave_size": 3000 },
///         "attack": {
///             "kind": "dpa",
///             "leakage_points": [1505, 1760, 2010, 2262, 1563, 1814, 2067, 2321,
///                                1618, 1871, 2124, 2376, 1676, 1927, 2180, 2429]
///         }
///     }"#,
/// )
/// .unwrap();
///
/// assert_eq!(config.layout, Layout::Full { wave_size: 3000 });
/// let AttackConfig::Dpa(dpa) = config.attack else { panic!() };
/// assert_eq!(dpa.threshold, 4.0);
/// assert_eq!(dpa.selection, Selection::HammingWeight);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub layout: Layout,
    pub attack: AttackConfig,
}

impl Config {
    pub fn cpa(layout: Layout) -> Self {
        Self {
            layout,
            attack: AttackConfig::Cpa,
        }
    }

    pub fn dpa(wave_size: usize, dpa: DpaConfig) -> Self {
        Self {
            layout: Layout::Full { wave_size },
            attack: AttackConfig::Dpa(dpa),
        }
    }

    /// Check that `traces` has the declared layout and fits the attack parameters.
    pub fn check(&self, traces: &TraceSet) -> Result<(), Error> {
        if traces.layout() != &self.layout {
            return Err(Error::LayoutMismatch(format!(
                "traces use {:?}, config declares {:?}",
                traces.layout(),
                self.layout
            )));
        }

        match &self.attack {
            AttackConfig::Cpa => Ok(()),
            AttackConfig::Dpa(dpa) => dpa.check(traces),
        }
    }

    /// Save the [`Config`] to a JSON file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;

        Ok(())
    }

    /// Load a [`Config`] from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let file = File::open(path)?;
        let config: Config = serde_json::from_reader(file)?;

        Ok(config)
    }
}
