use crate::error::{DetectorError, Result};
use crate::output::BeatRecord;
use log::trace;

/// Result of checking the latest RR interval against the recent average
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateCheck {
    /// Not enough beats yet to average
    Warmup,
    /// Latest interval within the regular band; the average became the selected RR
    Regular,
    /// Latest interval outside the band; thresholds should be lowered for this step
    Irregular,
}

/// RR interval memory over the accepted integrated-domain beats
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HeartRateMemory {
    mean_rr: Option<f32>,
    selected_rr: Option<f32>,
}

impl HeartRateMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Average the last `history` intervals and classify the newest one.
    pub fn update(
        &mut self,
        beats: &[BeatRecord],
        history: usize,
        low_ratio: f32,
        high_ratio: f32,
    ) -> Result<RateCheck> {
        if history == 0 || beats.len() < history + 1 {
            return Ok(RateCheck::Warmup);
        }

        let recent = &beats[beats.len() - history - 1..];
        let mut intervals = Vec::with_capacity(history);
        for pair in recent.windows(2) {
            if pair[1].index <= pair[0].index {
                return Err(DetectorError::Invariant(format!(
                    "non-positive RR interval between beats at {} and {}",
                    pair[0].index, pair[1].index
                )));
            }
            intervals.push((pair[1].index - pair[0].index) as f32);
        }

        let mean = intervals.iter().sum::<f32>() / intervals.len() as f32;
        let latest = intervals[intervals.len() - 1];
        self.mean_rr = Some(mean);

        if latest <= low_ratio * mean || latest >= high_ratio * mean {
            trace!("Irregular RR {} against mean {:.1}", latest, mean);
            Ok(RateCheck::Irregular)
        } else {
            self.selected_rr = Some(mean);
            Ok(RateCheck::Regular)
        }
    }

    /// RR used to spot missed beats: the last regular average, else the last average
    pub fn expected_rr(&self) -> Option<f32> {
        self.selected_rr.or(self.mean_rr)
    }

    pub fn selected_rr(&self) -> Option<f32> {
        self.selected_rr
    }

    pub fn mean_rr(&self) -> Option<f32> {
        self.mean_rr
    }
}
