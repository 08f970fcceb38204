//! Filter design and zero-phase filtering primitives.
//!
//! Coefficients depend only on the sampling rate and the detector configuration;
//! nothing here keeps state between calls.

use crate::config::DetectorConfig;
use crate::error::{DetectorError, Result};
use log::debug;
use sci_rs::signal::filter::design::{
    butter_dyn, DigitalFilter, FilterBandType, FilterOutputType, Sos, SosFormatFilter,
};
use sci_rs::signal::filter::sosfiltfilt_dyn;

/// Slope kernel `H(z) = (1/8T)(-z^-2 - 2z^-1 + 2z + z^2)` before scaling by fs/8
const DERIVATIVE_KERNEL: [f32; 5] = [1.0, 2.0, 0.0, -2.0, -1.0];

/// Band-limiting stage chosen for a sampling rate
pub enum BandStage {
    /// Low-pass then high-pass, each normalized to unit peak after filtering
    Cascade {
        lowpass: Vec<Sos<f32>>,
        highpass: Vec<Sos<f32>>,
    },
    Bandpass(Vec<Sos<f32>>),
}

/// All coefficients needed to condition one recording
pub struct FilterCoefficients {
    pub band: BandStage,
    pub derivative: Vec<f32>,
}

impl FilterCoefficients {
    pub fn design(fs: f32, config: &DetectorConfig) -> Result<Self> {
        let order = config.filter_order;
        let band = if config.uses_reference_cascade(fs) {
            BandStage::Cascade {
                lowpass: butterworth_sos(
                    order,
                    vec![config.reference_lowpass_hz],
                    FilterBandType::Lowpass,
                    fs,
                )?,
                highpass: butterworth_sos(
                    order,
                    vec![config.band_low_hz],
                    FilterBandType::Highpass,
                    fs,
                )?,
            }
        } else {
            BandStage::Bandpass(butterworth_sos(
                order,
                vec![config.band_low_hz, config.band_high_hz],
                FilterBandType::Bandpass,
                fs,
            )?)
        };

        Ok(Self {
            band,
            derivative: derivative_taps(fs, config.reference_rate),
        })
    }

    /// Shortest signal every stage can pad and filter
    pub fn min_signal_len(&self) -> usize {
        let sos_len = match &self.band {
            BandStage::Cascade { lowpass, highpass } => {
                sosfiltfilt_padlen(lowpass).max(sosfiltfilt_padlen(highpass))
            }
            BandStage::Bandpass(sos) => sosfiltfilt_padlen(sos),
        };
        sos_len + 1
    }
}

/// Design a digital Butterworth filter as second-order sections.
///
/// Cutoffs are in Hz and must lie strictly inside (0, fs/2), ascending.
pub fn butterworth_sos(
    order: usize,
    cutoffs: Vec<f32>,
    band: FilterBandType,
    fs: f32,
) -> Result<Vec<Sos<f32>>> {
    if order == 0 {
        return Err(DetectorError::FilterDesign(
            "filter order must be at least 1".to_string(),
        ));
    }

    let nyquist = fs / 2.0;
    if let Some(bad) = cutoffs
        .iter()
        .find(|&&f| !f.is_finite() || f <= 0.0 || f >= nyquist)
    {
        return Err(DetectorError::FilterDesign(format!(
            "cutoff {} Hz is not strictly inside (0, {}) Hz",
            bad, nyquist
        )));
    }
    if cutoffs.windows(2).any(|w| w[0] >= w[1]) {
        return Err(DetectorError::FilterDesign(format!(
            "band edges must be ascending, got {:?}",
            cutoffs
        )));
    }

    debug!(
        "Designing order {} Butterworth at {:?} Hz (fs = {})",
        order, cutoffs, fs
    );

    let filter = butter_dyn(
        order,
        cutoffs,
        Some(band),
        Some(false),
        Some(FilterOutputType::Sos),
        Some(fs),
    );
    let DigitalFilter::Sos(SosFormatFilter { sos }) = filter else {
        return Err(DetectorError::FilterDesign(
            "Butterworth design did not return second-order sections".to_string(),
        ));
    };

    if sos.is_empty() {
        return Err(DetectorError::FilterDesign(
            "Butterworth design returned no sections".to_string(),
        ));
    }
    Ok(sos)
}

/// Slope kernel scaled by fs/8, resampled when fs differs from the reference rate
/// so the effective frequency response stays the same.
pub fn derivative_taps(fs: f32, reference_rate: f32) -> Vec<f32> {
    let kernel: Vec<f32> = DERIVATIVE_KERNEL.iter().map(|&v| v * fs / 8.0).collect();
    if (fs - reference_rate).abs() < f32::EPSILON {
        return kernel;
    }

    // Linear interpolation every `step` taps, first tap to last tap inclusive
    let step = (reference_rate * 0.8) / fs;
    let last = (kernel.len() - 1) as f32;
    let mut taps = Vec::new();
    let mut k = 0usize;
    loop {
        let position = k as f32 * step;
        if position > last + 1e-4 {
            break;
        }
        let position = position.min(last);
        let lower = position.floor() as usize;
        let upper = (lower + 1).min(kernel.len() - 1);
        let frac = position - lower as f32;
        taps.push(kernel[lower] + (kernel[upper] - kernel[lower]) * frac);
        k += 1;
    }
    taps
}

/// Forward-backward filtering through second-order sections
pub fn zero_phase_sos(signal: &[f32], sos: &[Sos<f32>]) -> Vec<f32> {
    sosfiltfilt_dyn(signal.iter(), sos)
}

/// Forward-backward FIR filtering with odd reflection padding at both ends
pub fn zero_phase_fir(signal: &[f32], taps: &[f32]) -> Vec<f32> {
    if signal.is_empty() || taps.is_empty() {
        return signal.to_vec();
    }

    let pad = (3 * (taps.len() - 1)).min(signal.len() - 1);
    let extended = odd_extend(signal, pad);
    let forward = fir(&extended, taps);
    let reversed: Vec<f32> = forward.into_iter().rev().collect();
    let backward = fir(&reversed, taps);

    backward
        .into_iter()
        .rev()
        .skip(pad)
        .take(signal.len())
        .collect()
}

/// Causal moving average: each output is the sum of the last `window` inputs over `window`
pub fn moving_average(signal: &[f32], window: usize) -> Vec<f32> {
    if window == 0 {
        return signal.to_vec();
    }

    let scale = 1.0 / window as f32;
    let mut result = Vec::with_capacity(signal.len());
    let mut running = 0.0f64;
    for (i, &x) in signal.iter().enumerate() {
        running += x as f64;
        if i >= window {
            running -= signal[i - window] as f64;
        }
        result.push(running as f32 * scale);
    }
    result
}

/// Divide by the largest absolute value. A flat (all-zero) signal is left as is.
pub fn normalize_by_peak(signal: &mut [f32]) {
    let peak = signal.iter().fold(0.0f32, |acc, &x| acc.max(x.abs()));
    if peak > 0.0 && peak.is_finite() {
        for x in signal.iter_mut() {
            *x /= peak;
        }
    }
}

fn fir(signal: &[f32], taps: &[f32]) -> Vec<f32> {
    (0..signal.len())
        .map(|i| {
            taps.iter()
                .enumerate()
                .take(i + 1)
                .map(|(k, &b)| b * signal[i - k])
                .sum::<f32>()
        })
        .collect()
}

fn odd_extend(signal: &[f32], pad: usize) -> Vec<f32> {
    let n = signal.len();
    let first = signal[0];
    let last = signal[n - 1];

    let mut extended = Vec::with_capacity(n + 2 * pad);
    extended.extend((1..=pad).rev().map(|i| 2.0 * first - signal[i]));
    extended.extend_from_slice(signal);
    extended.extend((1..=pad).map(|i| 2.0 * last - signal[n - 1 - i]));
    extended
}

/// Padding sosfiltfilt applies on each side, as in scipy
fn sosfiltfilt_padlen(sos: &[Sos<f32>]) -> usize {
    3 * (2 * sos.len() + 1)
}
