pub mod config;
pub mod distinguishers;
pub mod error;
pub mod key_recovery;
pub mod leakage_model;
pub mod stats;
pub mod trace;
pub mod util;

pub use crate::error::Error;
