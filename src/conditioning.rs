use crate::config::{DetectorConfig, SampleWindows};
use crate::error::{DetectorError, Result};
use crate::filters::{
    moving_average, normalize_by_peak, zero_phase_fir, zero_phase_sos, BandStage,
    FilterCoefficients,
};
use log::debug;

/// Intermediate signals of one recording, all the same length as the input
#[derive(Debug, Clone)]
pub struct ConditionedSignals {
    /// 5-15 Hz band, unit peak magnitude
    pub band_limited: Vec<f32>,
    pub derivative: Vec<f32>,
    pub squared: Vec<f32>,
    /// Moving-window integration of `squared`, unit peak magnitude
    pub integrated: Vec<f32>,
}

/// Run the filter chain: band-limit, differentiate, square, integrate.
pub fn condition(
    signal: &[f32],
    fs: f32,
    windows: &SampleWindows,
    config: &DetectorConfig,
) -> Result<ConditionedSignals> {
    let coefficients = FilterCoefficients::design(fs, config)?;

    let min_len = coefficients.min_signal_len();
    if signal.len() < min_len {
        return Err(DetectorError::InvalidInput(format!(
            "signal of {} samples is too short to filter (need at least {})",
            signal.len(),
            min_len
        )));
    }

    // Filtering runs in f32; take a large baseline out before it reaches the filter state
    let mean = signal.iter().map(|&x| x as f64).sum::<f64>() / signal.len() as f64;
    let centered: Vec<f32> = signal.iter().map(|&x| x - mean as f32).collect();

    let band_limited = match &coefficients.band {
        BandStage::Cascade { lowpass, highpass } => {
            let mut low = zero_phase_sos(&centered, lowpass);
            normalize_by_peak(&mut low);
            let mut high = zero_phase_sos(&low, highpass);
            normalize_by_peak(&mut high);
            high
        }
        BandStage::Bandpass(sos) => {
            let mut band = zero_phase_sos(&centered, sos);
            normalize_by_peak(&mut band);
            band
        }
    };

    let mut derivative = zero_phase_fir(&band_limited, &coefficients.derivative);
    normalize_by_peak(&mut derivative);

    let squared: Vec<f32> = derivative.iter().map(|&x| x * x).collect();

    let mut integrated = moving_average(&squared, windows.integration);
    normalize_by_peak(&mut integrated);

    debug!(
        "Conditioned {} samples at {} Hz ({} derivative taps, {}-sample integration)",
        signal.len(),
        fs,
        coefficients.derivative.len(),
        windows.integration
    );

    Ok(ConditionedSignals {
        band_limited,
        derivative,
        squared,
        integrated,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pulse_train(fs: f32, period: usize, len: usize) -> Vec<f32> {
        let sigma = 0.01 * fs;
        (0..len)
            .map(|i| {
                let offset = (i % period) as f32 - (period / 2) as f32;
                (-0.5 * (offset / sigma).powi(2)).exp()
            })
            .collect()
    }

    #[test]
    fn outputs_match_input_length_and_scale() {
        let config = DetectorConfig::default();
        for fs in [200.0, 360.0] {
            let windows = SampleWindows::new(fs, &config).unwrap();
            let signal = pulse_train(fs, (0.8 * fs) as usize, (6.0 * fs) as usize);
            let conditioned = condition(&signal, fs, &windows, &config).unwrap();

            for s in [
                &conditioned.band_limited,
                &conditioned.derivative,
                &conditioned.squared,
                &conditioned.integrated,
            ] {
                assert_eq!(s.len(), signal.len());
                assert!(s.iter().all(|x| x.is_finite()));
            }

            let peak = |s: &[f32]| s.iter().fold(0.0f32, |acc, &x| acc.max(x.abs()));
            assert!((peak(conditioned.band_limited.as_slice()) - 1.0).abs() < 1e-5);
            assert!((peak(conditioned.integrated.as_slice()) - 1.0).abs() < 1e-5);
            assert!(conditioned.squared.iter().all(|&x| x >= 0.0));
            assert!(conditioned.integrated.iter().all(|&x| x >= -1e-6));
        }
    }

    #[test]
    fn baseline_offset_does_not_change_output() {
        let config = DetectorConfig::default();
        for fs in [200.0, 360.0] {
            let windows = SampleWindows::new(fs, &config).unwrap();
            let signal = pulse_train(fs, (0.8 * fs) as usize, (6.0 * fs) as usize);
            let shifted: Vec<f32> = signal.iter().map(|&x| x + 100.0).collect();

            let plain = condition(&signal, fs, &windows, &config).unwrap();
            let offset = condition(&shifted, fs, &windows, &config).unwrap();
            for (a, b) in [
                (&plain.band_limited, &offset.band_limited),
                (&plain.integrated, &offset.integrated),
            ] {
                let worst = a.iter().zip(b).fold(0.0f32, |acc, (x, y)| acc.max((x - y).abs()));
                assert!(worst < 1e-3, "max difference {} at {} Hz", worst, fs);
            }
        }
    }

    #[test]
    fn too_short_signal_is_invalid() {
        let config = DetectorConfig::default();
        let windows = SampleWindows::new(360.0, &config).unwrap();
        let result = condition(&[0.0; 8], 360.0, &windows, &config);
        assert!(matches!(result, Err(DetectorError::InvalidInput(_))));
    }

    #[test]
    fn band_edge_above_nyquist_is_a_design_error() {
        let config = DetectorConfig {
            band_high_hz: 80.0,
            ..DetectorConfig::default()
        };
        let windows = SampleWindows::new(100.0, &config).unwrap();
        let signal = pulse_train(100.0, 80, 1000);
        let result = condition(&signal, 100.0, &windows, &config);
        assert!(matches!(result, Err(DetectorError::FilterDesign(_))));
    }
}
