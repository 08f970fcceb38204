//! Detector error types

use thiserror::Error;

/// Result type for detector operations
pub type Result<T> = std::result::Result<T, DetectorError>;

/// Errors that can occur while detecting R-peaks in one recording
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DetectorError {
    /// Empty signal, bad sampling rate, or a rate that rounds a window down to nothing
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Filter cutoffs outside (0, fs/2) or otherwise not realizable
    #[error("Filter design failed: {0}")]
    FilterDesign(String),

    /// A truncated search window ended up with no samples in it
    #[error("Empty search window [{start}, {end}] on a signal of {len} samples")]
    EmptyWindow { start: usize, end: usize, len: usize },

    /// Internal state went somewhere it should never go
    #[error("Invariant violated: {0}")]
    Invariant(String),
}
