use crate::error::{DetectorError, Result};
use anyhow::Context;
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Tunable constants of the detector.
///
/// Every duration is in seconds and gets converted to samples once per recording
/// by [`SampleWindows::new`]. Missing fields in a JSON override fall back to the
/// defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Butterworth order for every band-limiting stage
    pub filter_order: usize,
    /// Sampling rate at which the cascade low-pass/high-pass path is used
    pub reference_rate: f32,
    pub band_low_hz: f32,
    pub band_high_hz: f32,
    /// Low-pass cutoff of the cascade at the reference rate
    pub reference_lowpass_hz: f32,
    pub integration_window_s: f32,
    pub refractory_s: f32,
    /// Gap below which a new peak is checked for being a T-wave
    pub t_wave_gap_s: f32,
    pub slope_window_s: f32,
    pub training_s: f32,
    pub rr_low_ratio: f32,
    pub rr_high_ratio: f32,
    pub missed_beat_ratio: f32,
    /// Number of RR intervals averaged for the heart-rate estimate
    pub rr_history: usize,
    pub min_beats_for_t_wave: usize,
    pub t_wave_slope_ratio: f32,
    /// Smoothing weight of a newly accepted peak
    pub signal_weight: f32,
    /// Smoothing weight of a peak recovered by searching back
    pub search_back_weight: f32,
    /// Smoothing weight of a noise peak
    pub noise_weight: f32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            filter_order: 3,
            reference_rate: 200.0,
            band_low_hz: 5.0,
            band_high_hz: 15.0,
            reference_lowpass_hz: 12.0,
            integration_window_s: 0.150,
            refractory_s: 0.200,
            t_wave_gap_s: 0.360,
            slope_window_s: 0.075,
            training_s: 2.0,
            rr_low_ratio: 0.92,
            rr_high_ratio: 1.16,
            missed_beat_ratio: 1.66,
            rr_history: 8,
            min_beats_for_t_wave: 3,
            t_wave_slope_ratio: 0.5,
            signal_weight: 0.125,
            search_back_weight: 0.25,
            noise_weight: 0.125,
        }
    }
}

impl DetectorConfig {
    /// Load a (possibly partial) configuration from a JSON file
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open config file: {}", path.display()))?;
        serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// True when `fs` takes the low-pass then high-pass cascade path
    pub fn uses_reference_cascade(&self, fs: f32) -> bool {
        (fs - self.reference_rate).abs() < f32::EPSILON
    }
}

/// Per-recording window lengths, in samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleWindows {
    pub integration: usize,
    pub refractory: usize,
    pub t_wave_gap: usize,
    pub slope: usize,
    pub training: usize,
}

impl SampleWindows {
    pub fn new(fs: f32, config: &DetectorConfig) -> Result<Self> {
        if !fs.is_finite() || fs <= 0.0 {
            return Err(DetectorError::InvalidInput(format!(
                "sampling rate must be a positive finite number, got {}",
                fs
            )));
        }

        let samples = |name: &str, seconds: f32| -> Result<usize> {
            let n = (seconds * fs).round();
            if !n.is_finite() || n < 1.0 {
                return Err(DetectorError::InvalidInput(format!(
                    "{} window of {}s is empty at {} Hz",
                    name, seconds, fs
                )));
            }
            Ok(n as usize)
        };

        Ok(Self {
            integration: samples("integration", config.integration_window_s)?,
            refractory: samples("refractory", config.refractory_s)?,
            t_wave_gap: samples("t-wave", config.t_wave_gap_s)?,
            slope: samples("slope", config.slope_window_s)?,
            training: samples("training", config.training_s)? + 1,
        })
    }

    /// Group delay of the moving-average stage, in samples
    pub fn integration_delay(&self) -> f32 {
        self.integration as f32 / 2.0
    }
}

/// Which accepted-beat track gets written to the peak files
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Domain {
    /// Band-limited signal peaks (closest to the raw R-peak)
    Band,
    /// Integrated (moving average) signal peaks
    Integrated,
}

/// Detect R-peaks in single-lead ECG recordings
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// CSV file of samples, or a directory searched recursively for .csv files
    #[arg(help = "CSV file of samples, or a directory searched recursively for .csv files")]
    pub input_path: PathBuf,

    /// Sampling rate in Hz
    #[arg(long, default_value = "360.0", env = "QRS_FS")]
    pub fs: f32,

    /// Zero-based column holding the lead to analyse
    #[arg(long, default_value = "0")]
    pub column: usize,

    /// Whether the input CSV files start with a header row
    #[arg(long)]
    pub has_headers: bool,

    /// Channel label used in the output file names
    #[arg(long, default_value = "1")]
    pub channel: String,

    /// Directory receiving one `<record>_<channel>.csv` peak list per recording
    #[arg(long, default_value = "rpeak_output")]
    pub output_dir: PathBuf,

    /// Which detection track to write
    #[arg(long, value_enum, default_value = "band")]
    pub domain: Domain,

    /// Snap each peak to the largest raw deflection within this many samples
    #[arg(long)]
    pub refine_window: Option<usize>,

    /// JSON file overriding detector constants
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Write a JSON summary of every recording to this path
    #[arg(long)]
    pub summary: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn windows_at_mit_bih_rate() {
        let windows = SampleWindows::new(360.0, &DetectorConfig::default()).unwrap();
        assert_eq!(windows.integration, 54);
        assert_eq!(windows.refractory, 72);
        assert_eq!(windows.t_wave_gap, 130);
        assert_eq!(windows.slope, 27);
        assert_eq!(windows.training, 721);
        assert_eq!(windows.integration_delay(), 27.0);
    }

    #[test]
    fn rejects_bad_rates() {
        let config = DetectorConfig::default();
        for fs in [0.0, -200.0, f32::NAN, f32::INFINITY] {
            assert!(matches!(
                SampleWindows::new(fs, &config),
                Err(DetectorError::InvalidInput(_))
            ));
        }
        // 0.075 * 6 rounds to zero samples
        assert!(matches!(
            SampleWindows::new(6.0, &config),
            Err(DetectorError::InvalidInput(_))
        ));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let json = r#"{ "band_high_hz": 20.0, "rr_history": 4 }"#;
        let config: DetectorConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.band_high_hz, 20.0);
        assert_eq!(config.rr_history, 4);
        assert_eq!(config.band_low_hz, 5.0);
        assert_eq!(config.missed_beat_ratio, 1.66);
    }

    #[test]
    fn cascade_only_at_reference_rate() {
        let config = DetectorConfig::default();
        assert!(config.uses_reference_cascade(200.0));
        assert!(!config.uses_reference_cascade(360.0));
    }
}
