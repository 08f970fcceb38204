//! Snap detected indices onto the raw R-peak.
//!
//! The band-limited track sits on the filtered signal and the integrated track lags
//! the QRS onset, so both can miss the sample of largest raw deflection by a few
//! samples.

/// Index of the largest absolute raw sample within `window / 2` samples of `index`.
///
/// The search range is clamped to the signal. Ties keep `index` itself, then the
/// earliest sample.
pub fn refine_peak(raw: &[f32], index: usize, window: usize) -> usize {
    if raw.is_empty() {
        return index;
    }
    let index = index.min(raw.len() - 1);
    let half = window / 2;
    let start = index.saturating_sub(half);
    let end = (index + half).min(raw.len() - 1);

    let mut best = index;
    let mut best_value = raw[index].abs();
    for (i, value) in raw.iter().enumerate().take(end + 1).skip(start) {
        if value.abs() > best_value {
            best = i;
            best_value = value.abs();
        }
    }
    best
}

/// Refine every index. Peaks that snap onto the same sample are merged, so the result
/// stays strictly increasing.
pub fn refine_peaks(raw: &[f32], indices: &[usize], window: usize) -> Vec<usize> {
    let mut refined: Vec<usize> = indices
        .iter()
        .map(|&index| refine_peak(raw, index, window))
        .collect();
    refined.sort_unstable();
    refined.dedup();
    refined
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn moves_to_largest_magnitude() {
        let raw = [0.0, 0.1, 0.3, 0.9, 0.2, -1.5, 0.0];
        assert_eq!(refine_peak(&raw, 3, 4), 5);
        assert_eq!(refine_peak(&raw, 3, 2), 3);
        assert_eq!(refine_peak(&raw, 2, 2), 3);
    }

    #[test]
    fn window_is_clamped_at_edges() {
        let raw = [2.0, 0.1, 0.0, 0.4, 0.5];
        assert_eq!(refine_peak(&raw, 1, 10), 0);
        assert_eq!(refine_peak(&raw, 3, 10), 0);
        assert_eq!(refine_peak(&raw, 4, 2), 4);
    }

    #[test]
    fn ties_stay_put() {
        let raw = [1.0, 0.0, 1.0, 0.0, 1.0];
        assert_eq!(refine_peak(&raw, 2, 4), 2);
    }

    #[test]
    fn merged_peaks_are_deduplicated() {
        let raw = [0.0, 0.2, 1.0, 0.2, 0.0, 0.0, 0.0, 0.0, 0.8, 0.0];
        assert_eq!(refine_peaks(&raw, &[1, 3, 7], 2), vec![2, 8]);
    }

    #[test]
    fn zero_window_is_identity() {
        let raw = [0.0, 0.5, 1.0];
        assert_eq!(refine_peaks(&raw, &[0, 1], 0), vec![0, 1]);
    }
}
