//! Pan-Tompkins R-peak detection for single-lead ECG.
//!
//! [`detect`] runs the whole chain on one recording: band-limiting, derivative,
//! squaring and moving-window integration, then adaptive dual thresholds with
//! heart-rate tracking, T-wave rejection and missed-beat back-search.

pub mod batch;
pub mod candidates;
pub mod conditioning;
pub mod config;
pub mod data_loading;
pub mod decision;
pub mod detector;
pub mod error;
pub mod filters;
pub mod heart_rate;
pub mod output;
pub mod refine;
pub mod thresholds;

pub use config::DetectorConfig;
pub use detector::{detect, QrsDetector};
pub use error::{DetectorError, Result};
pub use output::{BeatTrack, Detection, NoiseKind, NoiseRecord};
