use crate::candidates::find_candidates;
use crate::conditioning::condition;
use crate::config::{DetectorConfig, SampleWindows};
use crate::decision::{DecisionEngine, Verdict};
use crate::error::{DetectorError, Result};
use crate::output::Detection;
use log::{debug, info};

/// Pan-Tompkins R-peak detector.
///
/// Holds only configuration; every call to [`QrsDetector::detect`] starts from fresh
/// threshold and heart-rate state, so one detector can serve many recordings.
#[derive(Debug, Clone, Default)]
pub struct QrsDetector {
    config: DetectorConfig,
}

impl QrsDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn detect(&self, signal: &[f32], fs: f32) -> Result<Detection> {
        if signal.is_empty() {
            return Err(DetectorError::InvalidInput("signal is empty".to_string()));
        }
        if let Some(i) = signal.iter().position(|x| !x.is_finite()) {
            return Err(DetectorError::InvalidInput(format!(
                "sample {} is not finite ({})",
                i, signal[i]
            )));
        }

        let windows = SampleWindows::new(fs, &self.config)?;
        let conditioned = condition(signal, fs, &windows, &self.config)?;
        let candidates = find_candidates(&conditioned.integrated, windows.refractory);

        let mut engine = DecisionEngine::new(&conditioned, windows, &self.config)?;
        let mut t_waves = 0;
        let mut recovered = 0;
        for candidate in candidates.iter().copied() {
            let outcome = engine.process(candidate)?;
            if outcome.verdict == Verdict::TWave {
                t_waves += 1;
            }
            if outcome.recovered.is_some() {
                recovered += 1;
            }
        }
        debug!(
            "{} candidates, {} T-waves rejected, {} beats recovered by search-back",
            candidates.len(),
            t_waves,
            recovered
        );

        let detection = engine.finish();
        info!(
            "Detected {} beats ({} band-limited) in {} samples at {} Hz",
            detection.integrated.len(),
            detection.band_limited.len(),
            signal.len(),
            fs
        );
        Ok(detection)
    }
}

/// Detect with the default configuration
pub fn detect(signal: &[f32], fs: f32) -> Result<Detection> {
    QrsDetector::default().detect(signal, fs)
}
