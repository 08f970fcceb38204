use anyhow::{Context, Result};
use log::{debug, info};
use serde::Serialize;
use std::fs::File;
use std::path::{Path, PathBuf};

/// One accepted beat in one domain
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BeatRecord {
    pub index: usize,
    pub amplitude: f32,
}

/// Why a candidate was set aside
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoiseKind {
    /// Below the integrated noise threshold
    BelowThreshold,
    /// Close to the previous beat with a shallow upstroke
    TWave,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NoiseRecord {
    pub index: usize,
    pub amplitude: f32,
    pub kind: NoiseKind,
}

/// Accepted beats of one domain as parallel index/amplitude sequences
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BeatTrack {
    pub indices: Vec<usize>,
    pub amplitudes: Vec<f32>,
}

impl BeatTrack {
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

impl From<Vec<BeatRecord>> for BeatTrack {
    fn from(records: Vec<BeatRecord>) -> Self {
        let (indices, amplitudes) = records.into_iter().map(|r| (r.index, r.amplitude)).unzip();
        Self {
            indices,
            amplitudes,
        }
    }
}

/// Everything one detector pass produces
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
    /// Peaks located on the band-limited signal, the track most consumers want
    pub band_limited: BeatTrack,
    pub integrated: BeatTrack,
    pub noise: Vec<NoiseRecord>,
    /// Group delay of the integration stage in samples. Reported only; no index is shifted by it.
    pub delay: f32,
}

/// Append-only beat and noise lists built up during one pass
#[derive(Debug, Clone, Default)]
pub struct BeatLedger {
    integrated: Vec<BeatRecord>,
    band_limited: Vec<BeatRecord>,
    noise: Vec<NoiseRecord>,
}

impl BeatLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn integrated(&self) -> &[BeatRecord] {
        &self.integrated
    }

    pub fn band_limited(&self) -> &[BeatRecord] {
        &self.band_limited
    }

    pub fn noise(&self) -> &[NoiseRecord] {
        &self.noise
    }

    pub fn last_integrated(&self) -> Option<BeatRecord> {
        self.integrated.last().copied()
    }

    pub fn push_integrated(&mut self, index: usize, amplitude: f32) {
        self.integrated.push(BeatRecord { index, amplitude });
    }

    /// Record a band-limited beat unless it would land within `refractory` samples
    /// of the previous one (or before it). Returns whether it was recorded.
    pub fn push_band_limited(&mut self, index: usize, amplitude: f32, refractory: usize) -> bool {
        if let Some(last) = self.band_limited.last() {
            if index <= last.index || index - last.index < refractory {
                debug!(
                    "Band-limited peak at {} too close to previous at {}, not confirmed",
                    index, last.index
                );
                return false;
            }
        }
        self.band_limited.push(BeatRecord { index, amplitude });
        true
    }

    pub fn push_noise(&mut self, index: usize, amplitude: f32, kind: NoiseKind) {
        self.noise.push(NoiseRecord {
            index,
            amplitude,
            kind,
        });
    }

    pub fn finish(self, delay: f32) -> Detection {
        Detection {
            band_limited: self.band_limited.into(),
            integrated: self.integrated.into(),
            noise: self.noise,
            delay,
        }
    }
}

/// Per-recording line of the JSON summary
#[derive(Debug, Clone, Serialize)]
pub struct RecordSummary {
    pub record: String,
    pub channel: String,
    pub fs: f32,
    pub samples: usize,
    pub delay: Option<f32>,
    pub integrated_beats: usize,
    pub band_limited_beats: usize,
    pub noise_peaks: usize,
    pub peak_file: Option<PathBuf>,
    pub error: Option<String>,
}

/// Write one index per line to `<output_dir>/<record>_<channel>.csv`
pub fn write_peak_list(
    output_dir: &Path,
    record: &str,
    channel: &str,
    indices: &[usize],
) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;

    let full_path = output_dir.join(format!("{}_{}.csv", record, channel));
    info!("Writing {} peaks to {}", indices.len(), full_path.display());

    let file = File::create(&full_path)
        .with_context(|| format!("Failed to create {}", full_path.display()))?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(file);
    for index in indices {
        writer.write_record([index.to_string()])?;
    }
    writer.flush()?;

    Ok(full_path)
}

pub fn write_summary(path: &Path, summaries: &[RecordSummary]) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    let file = File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(file, summaries)?;
    info!("Wrote summary of {} recordings to {}", summaries.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_limited_track_enforces_refractory() {
        let mut ledger = BeatLedger::new();
        assert!(ledger.push_band_limited(100, 1.0, 72));
        assert!(!ledger.push_band_limited(150, 0.9, 72));
        assert!(!ledger.push_band_limited(90, 0.9, 72));
        assert!(ledger.push_band_limited(172, 0.8, 72));
        assert_eq!(ledger.band_limited().len(), 2);
    }

    #[test]
    fn finish_splits_tracks() {
        let mut ledger = BeatLedger::new();
        ledger.push_integrated(130, 0.9);
        ledger.push_integrated(420, 1.0);
        ledger.push_band_limited(110, 0.7, 72);
        ledger.push_noise(300, 0.01, NoiseKind::BelowThreshold);
        assert_eq!(ledger.noise()[0].kind, NoiseKind::BelowThreshold);

        let detection = ledger.finish(27.0);
        assert_eq!(detection.integrated.indices, vec![130, 420]);
        assert_eq!(detection.integrated.amplitudes, vec![0.9, 1.0]);
        assert_eq!(detection.band_limited.indices, vec![110]);
        assert_eq!(detection.noise.len(), 1);
        assert_eq!(detection.delay, 27.0);
    }

    #[test]
    fn peak_list_is_one_index_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_peak_list(dir.path(), "100", "1", &[12, 300, 611]).unwrap();
        assert_eq!(path.file_name().unwrap(), "100_1.csv");
        let content = std::fs::read_to_string(path).unwrap();
        assert_eq!(content, "12\n300\n611\n");
    }

    #[test]
    fn summary_is_json_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports").join("summary.json");
        let summary = RecordSummary {
            record: "100".to_string(),
            channel: "1".to_string(),
            fs: 360.0,
            samples: 3600,
            delay: Some(27.0),
            integrated_beats: 12,
            band_limited_beats: 12,
            noise_peaks: 3,
            peak_file: None,
            error: None,
        };
        write_summary(&path, &[summary]).unwrap();

        let text = std::fs::read_to_string(path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value[0]["record"], "100");
        assert_eq!(value[0]["band_limited_beats"], 12);
    }
}
