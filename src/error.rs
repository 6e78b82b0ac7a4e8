use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to save/load keyrec config")]
    SaveLoadError(#[from] serde_json::Error),
    #[error(transparent)]
    IoError(#[from] io::Error),
    #[error("Trace set is empty")]
    EmptyTraceSet,
    #[error("Shape mismatch for {what}: expected {expected}, got {actual}")]
    ShapeMismatch {
        what: String,
        expected: usize,
        actual: usize,
    },
    #[error("Layout mismatch: {0}")]
    LayoutMismatch(String),
    #[error("Leakage point {point} (window {window}) of byte {byte} exceeds wave size {wave_size}")]
    LeakagePointOutOfRange {
        byte: usize,
        point: usize,
        window: usize,
        wave_size: usize,
    },
    #[error("Invalid leakage range {start}..{end} for byte {byte} (wave size {wave_size})")]
    InvalidRange {
        byte: usize,
        start: usize,
        end: usize,
        wave_size: usize,
    },
    #[error("Invalid key: {0}")]
    InvalidKey(String),
    #[error("Every guess of byte {byte} has a degenerate score")]
    Undetermined { byte: usize },
}
