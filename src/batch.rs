use crate::config::DetectorConfig;
use crate::detector::QrsDetector;
use crate::error::Result;
use crate::output::Detection;
use log::warn;
use rayon::prelude::*;

/// One channel of one recording, ready for detection
#[derive(Debug, Clone, PartialEq)]
pub struct Recording {
    pub name: String,
    pub samples: Vec<f32>,
    pub fs: f32,
}

#[derive(Debug)]
pub struct BatchOutcome {
    pub name: String,
    pub result: Result<Detection>,
}

/// Run detection over many recordings in parallel.
///
/// Each recording gets its own detector state, and a failure only fills its own
/// slot. Outcomes come back in input order.
pub fn detect_batch(recordings: &[Recording], config: &DetectorConfig) -> Vec<BatchOutcome> {
    let detector = QrsDetector::new(config.clone());
    recordings
        .par_iter()
        .map(|recording| {
            let result = detector.detect(&recording.samples, recording.fs);
            if let Err(e) = &result {
                warn!("Detection failed for {}: {}", recording.name, e);
            }
            BatchOutcome {
                name: recording.name.clone(),
                result,
            }
        })
        .collect()
}
