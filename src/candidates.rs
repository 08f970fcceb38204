use log::debug;
use serde::Serialize;

/// A local maximum of the integrated signal
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CandidatePeak {
    pub index: usize,
    pub amplitude: f32,
}

/// Find local maxima of `signal` that are more than `min_distance` samples apart.
///
/// Peaks are visited from highest to lowest; once a peak is kept every other peak
/// within `min_distance` of it is dropped. The result is sorted by index.
pub fn find_candidates(signal: &[f32], min_distance: usize) -> Vec<CandidatePeak> {
    if signal.len() < 3 {
        return Vec::new();
    }

    let floor = signal.iter().copied().fold(f32::INFINITY, f32::min);
    let mut peaks = local_maxima(signal);
    peaks.retain(|&i| signal[i] > floor);

    // Highest first; ties go to the earlier sample
    let mut by_height = peaks.clone();
    by_height.sort_by(|&a, &b| signal[b].total_cmp(&signal[a]).then(a.cmp(&b)));

    let mut suppressed = vec![false; signal.len()];
    let mut kept = Vec::with_capacity(peaks.len());
    for peak in by_height {
        if suppressed[peak] {
            continue;
        }
        let start = peak.saturating_sub(min_distance);
        let end = (peak + min_distance).min(signal.len() - 1);
        suppressed[start..=end].iter_mut().for_each(|s| *s = true);
        kept.push(peak);
    }
    kept.sort_unstable();

    debug!(
        "{} local maxima, {} candidates after {}-sample suppression",
        peaks.len(),
        kept.len(),
        min_distance
    );

    kept.into_iter()
        .map(|index| CandidatePeak {
            index,
            amplitude: signal[index],
        })
        .collect()
}

/// Rising edge followed by a falling edge. A flat top reports its first sample.
fn local_maxima(signal: &[f32]) -> Vec<usize> {
    let mut maxima = Vec::new();
    let mut i = 1;
    while i < signal.len() - 1 {
        if signal[i] > signal[i - 1] {
            let mut j = i;
            while j + 1 < signal.len() && signal[j + 1] == signal[i] {
                j += 1;
            }
            if j + 1 < signal.len() && signal[j + 1] < signal[i] {
                maxima.push(i);
            }
            i = j + 1;
        } else {
            i += 1;
        }
    }
    maxima
}
