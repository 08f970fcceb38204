//! Per-candidate beat decisions.
//!
//! Candidates must be fed in index order: every verdict depends on the beats,
//! levels and RR history left behind by the ones before it.

use crate::candidates::CandidatePeak;
use crate::conditioning::ConditionedSignals;
use crate::config::{DetectorConfig, SampleWindows};
use crate::error::{DetectorError, Result};
use crate::heart_rate::{HeartRateMemory, RateCheck};
use crate::output::{BeatLedger, Detection, NoiseKind};
use crate::thresholds::ThresholdTracker;
use log::{debug, trace};

/// What happened to the candidate itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Beat,
    /// Above the signal threshold but shaped like a T-wave
    TWave,
    /// Between the noise and signal thresholds
    Ambiguous,
    Noise,
}

/// Everything decided while processing one candidate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandidateOutcome {
    pub verdict: Verdict,
    /// The beat was also confirmed on the band-limited signal
    pub band_confirmed: bool,
    /// Index of a missed beat recovered before this candidate
    pub recovered: Option<usize>,
    pub rate: RateCheck,
}

/// Location of the band-limited maximum matching an integrated peak
#[derive(Debug, Clone, Copy, PartialEq)]
struct BandPeak {
    index: usize,
    amplitude: f32,
}

pub struct DecisionEngine<'a> {
    integrated: &'a [f32],
    band_limited: &'a [f32],
    windows: SampleWindows,
    config: &'a DetectorConfig,
    thresholds: ThresholdTracker,
    heart_rate: HeartRateMemory,
    ledger: BeatLedger,
}

impl<'a> DecisionEngine<'a> {
    pub fn new(
        signals: &'a ConditionedSignals,
        windows: SampleWindows,
        config: &'a DetectorConfig,
    ) -> Result<Self> {
        if signals.integrated.len() != signals.band_limited.len() {
            return Err(DetectorError::Invariant(format!(
                "integrated ({}) and band-limited ({}) signals differ in length",
                signals.integrated.len(),
                signals.band_limited.len()
            )));
        }

        let thresholds = ThresholdTracker::train(
            &signals.integrated,
            &signals.band_limited,
            windows.training,
        )?;
        debug!(
            "Trained thresholds over {} samples: integrated {:.4}/{:.4}, band-limited {:.4}/{:.4}",
            windows.training,
            thresholds.integrated.sig_threshold,
            thresholds.integrated.noise_threshold,
            thresholds.band_limited.sig_threshold,
            thresholds.band_limited.noise_threshold
        );

        Ok(Self {
            integrated: &signals.integrated,
            band_limited: &signals.band_limited,
            windows,
            config,
            thresholds,
            heart_rate: HeartRateMemory::new(),
            ledger: BeatLedger::new(),
        })
    }

    pub fn thresholds(&self) -> &ThresholdTracker {
        &self.thresholds
    }

    pub fn heart_rate(&self) -> &HeartRateMemory {
        &self.heart_rate
    }

    pub fn ledger(&self) -> &BeatLedger {
        &self.ledger
    }

    pub fn process(&mut self, candidate: CandidatePeak) -> Result<CandidateOutcome> {
        if candidate.index >= self.integrated.len() {
            return Err(DetectorError::Invariant(format!(
                "candidate at {} is past the end of a {}-sample signal",
                candidate.index,
                self.integrated.len()
            )));
        }

        let band_peak = self.band_lookback(candidate.index)?;

        let rate = self.heart_rate.update(
            self.ledger.integrated(),
            self.config.rr_history,
            self.config.rr_low_ratio,
            self.config.rr_high_ratio,
        )?;
        if rate == RateCheck::Irregular {
            self.thresholds.boost_sensitivity();
        }

        let recovered = self.search_back(candidate.index)?;
        let (verdict, band_confirmed) = self.classify(candidate, band_peak)?;

        self.thresholds.recompute();

        trace!(
            "Candidate {} ({:.4}): {:?}, band confirmed {}, recovered {:?}, thresholds {:.4}/{:.4}",
            candidate.index,
            candidate.amplitude,
            verdict,
            band_confirmed,
            recovered,
            self.thresholds.integrated.sig_threshold,
            self.thresholds.integrated.noise_threshold
        );

        Ok(CandidateOutcome {
            verdict,
            band_confirmed,
            recovered,
            rate,
        })
    }

    pub fn finish(self) -> Detection {
        self.ledger.finish(self.windows.integration_delay())
    }

    /// Band-limited maximum over the integration window ending at `index`,
    /// truncated at both ends of the signal.
    fn band_lookback(&self, index: usize) -> Result<BandPeak> {
        let len = self.band_limited.len();
        let start = index.saturating_sub(self.windows.integration);
        let end = index.min(len.saturating_sub(1));
        if len == 0 || start > end {
            return Err(DetectorError::EmptyWindow { start, end, len });
        }

        let (offset, amplitude) = argmax(&self.band_limited[start..=end]);
        Ok(BandPeak {
            index: start + offset,
            amplitude,
        })
    }

    /// Look for a beat missed between the last accepted beat and `index`
    fn search_back(&mut self, index: usize) -> Result<Option<usize>> {
        let Some(expected_rr) = self.heart_rate.expected_rr() else {
            return Ok(None);
        };
        let Some(last) = self.ledger.last_integrated() else {
            return Ok(None);
        };
        if index <= last.index {
            return Err(DetectorError::Invariant(format!(
                "candidate at {} does not follow the last beat at {}",
                index, last.index
            )));
        }

        let gap = (index - last.index) as f32;
        if gap < (self.config.missed_beat_ratio * expected_rr).round() {
            return Ok(None);
        }

        let refractory = self.windows.refractory;
        let start = last.index + refractory;
        let end = match index.checked_sub(refractory) {
            Some(end) if end >= start => end,
            _ => return Ok(None),
        };

        let (offset, amplitude) = argmax(&self.integrated[start..=end]);
        if amplitude <= self.thresholds.integrated.noise_threshold {
            return Ok(None);
        }

        let recovered = start + offset;
        let weight = self.config.search_back_weight;
        self.ledger.push_integrated(recovered, amplitude);
        self.thresholds.integrated.absorb_signal(amplitude, weight);

        let band_peak = self.band_lookback(recovered)?;
        let band_noise = self.thresholds.band_limited.noise_threshold;
        if band_peak.amplitude > band_noise && self.confirm_band(band_peak) {
            self.thresholds
                .band_limited
                .absorb_signal(band_peak.amplitude, weight);
        }

        debug!(
            "Recovered missed beat at {} ({:.4}) after a {}-sample gap (expected RR {:.1})",
            recovered, amplitude, gap, expected_rr
        );
        Ok(Some(recovered))
    }

    /// Record `peak` on the band-limited track unless it breaks the refractory gap
    fn confirm_band(&mut self, peak: BandPeak) -> bool {
        self.ledger
            .push_band_limited(peak.index, peak.amplitude, self.windows.refractory)
    }

    fn classify(
        &mut self,
        candidate: CandidatePeak,
        band_peak: BandPeak,
    ) -> Result<(Verdict, bool)> {
        let integrated = self.thresholds.integrated;
        let weight = self.config.signal_weight;

        if candidate.amplitude >= integrated.sig_threshold {
            if self.is_t_wave(candidate.index)? {
                self.ledger
                    .push_noise(candidate.index, candidate.amplitude, NoiseKind::TWave);
                return Ok((Verdict::TWave, false));
            }

            self.ledger
                .push_integrated(candidate.index, candidate.amplitude);

            let band_sig = self.thresholds.band_limited.sig_threshold;
            let band_confirmed = band_peak.amplitude >= band_sig && self.confirm_band(band_peak);
            if band_confirmed {
                self.thresholds
                    .band_limited
                    .absorb_signal(band_peak.amplitude, weight);
            }
            self.thresholds
                .integrated
                .absorb_signal(candidate.amplitude, weight);

            Ok((Verdict::Beat, band_confirmed))
        } else if candidate.amplitude >= integrated.noise_threshold {
            self.thresholds.absorb_noise(
                candidate.amplitude,
                band_peak.amplitude,
                self.config.noise_weight,
            );
            Ok((Verdict::Ambiguous, false))
        } else {
            self.ledger.push_noise(
                candidate.index,
                candidate.amplitude,
                NoiseKind::BelowThreshold,
            );
            self.thresholds.absorb_noise(
                candidate.amplitude,
                band_peak.amplitude,
                self.config.noise_weight,
            );
            Ok((Verdict::Noise, false))
        }
    }

    /// A peak soon after the last beat whose upstroke is much shallower than that
    /// beat's is taken for a T-wave.
    fn is_t_wave(&self, index: usize) -> Result<bool> {
        if self.ledger.integrated().len() < self.config.min_beats_for_t_wave {
            return Ok(false);
        }
        let Some(last) = self.ledger.last_integrated() else {
            return Ok(false);
        };
        if index <= last.index {
            return Err(DetectorError::Invariant(format!(
                "candidate at {} does not follow the last beat at {}",
                index, last.index
            )));
        }
        if index - last.index > self.windows.t_wave_gap {
            return Ok(false);
        }

        let slope = self.mean_slope(index);
        let previous_slope = self.mean_slope(last.index);
        let is_t_wave = slope.abs() <= self.config.t_wave_slope_ratio * previous_slope.abs();
        if is_t_wave {
            debug!(
                "T-wave at {}: slope {:.5} against {:.5} at beat {}",
                index, slope, previous_slope, last.index
            );
        }
        Ok(is_t_wave)
    }

    /// Mean first difference of the integrated signal over the slope window ending at `index`
    fn mean_slope(&self, index: usize) -> f32 {
        let start = index.saturating_sub(self.windows.slope);
        let window = &self.integrated[start..=index];
        if window.len() < 2 {
            return 0.0;
        }
        // the differences telescope
        (window[window.len() - 1] - window[0]) / (window.len() - 1) as f32
    }
}

/// First position and value of the maximum of a non-empty slice
fn argmax(values: &[f32]) -> (usize, f32) {
    values
        .iter()
        .copied()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |best, (i, v)| {
            if v > best.1 {
                (i, v)
            } else {
                best
            }
        })
}
