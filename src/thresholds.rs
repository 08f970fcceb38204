use crate::error::{DetectorError, Result};
use serde::Serialize;

/// Running signal/noise estimate of one signal domain.
///
/// The integrated and band-limited signals each own one of these and update it with
/// the same arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DomainThresholdState {
    pub signal_level: f32,
    pub noise_level: f32,
    pub sig_threshold: f32,
    pub noise_threshold: f32,
}

impl DomainThresholdState {
    /// Seed the levels from the training segment at the start of the recording
    pub fn from_training(window: &[f32]) -> Result<Self> {
        if window.is_empty() {
            return Err(DetectorError::EmptyWindow {
                start: 0,
                end: 0,
                len: 0,
            });
        }

        let max = window.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let mean = window.iter().map(|&x| x as f64).sum::<f64>() / window.len() as f64;

        let sig_threshold = max / 3.0;
        let noise_threshold = mean as f32 / 2.0;
        Ok(Self {
            signal_level: sig_threshold,
            noise_level: noise_threshold,
            sig_threshold,
            noise_threshold,
        })
    }

    /// Exponential smoothing of the signal level, `weight` on the new peak
    pub fn absorb_signal(&mut self, amplitude: f32, weight: f32) {
        self.signal_level = weight * amplitude + (1.0 - weight) * self.signal_level;
    }

    pub fn absorb_noise(&mut self, amplitude: f32, weight: f32) {
        self.noise_level = weight * amplitude + (1.0 - weight) * self.noise_level;
    }

    /// Halve the signal threshold until the next recompute
    pub fn boost_sensitivity(&mut self) {
        self.sig_threshold *= 0.5;
    }

    pub fn recompute(&mut self) {
        if self.noise_level == 0.0 && self.signal_level == 0.0 {
            return;
        }
        self.sig_threshold =
            self.noise_level + 0.25 * (self.signal_level - self.noise_level).abs();
        self.noise_threshold = 0.5 * self.sig_threshold;
    }
}

/// Threshold state of both domains
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ThresholdTracker {
    pub integrated: DomainThresholdState,
    pub band_limited: DomainThresholdState,
}

impl ThresholdTracker {
    /// Train both domains on their first `training` samples (fewer if the signal is shorter)
    pub fn train(integrated: &[f32], band_limited: &[f32], training: usize) -> Result<Self> {
        let head = |signal: &[f32]| signal[..training.min(signal.len())].to_vec();
        Ok(Self {
            integrated: DomainThresholdState::from_training(&head(integrated))?,
            band_limited: DomainThresholdState::from_training(&head(band_limited))?,
        })
    }

    pub fn boost_sensitivity(&mut self) {
        self.integrated.boost_sensitivity();
        self.band_limited.boost_sensitivity();
    }

    /// A peak that is not a beat moves both noise levels
    pub fn absorb_noise(&mut self, integrated: f32, band_limited: f32, weight: f32) {
        self.integrated.absorb_noise(integrated, weight);
        self.band_limited.absorb_noise(band_limited, weight);
    }

    pub fn recompute(&mut self) {
        self.integrated.recompute();
        self.band_limited.recompute();
    }
}
