#![allow(dead_code)]

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

/// Gaussian QRS-like pulse of `amplitude`, width `0.01 * fs`, added at each center
pub fn add_pulses(signal: &mut [f32], fs: f32, centers: &[usize], amplitude: f32) {
    add_gaussians(signal, centers, 0.01 * fs, amplitude);
}

pub fn add_gaussians(signal: &mut [f32], centers: &[usize], sigma: f32, amplitude: f32) {
    for (i, value) in signal.iter_mut().enumerate() {
        for &center in centers {
            let offset = i as f32 - center as f32;
            if offset.abs() < 6.0 * sigma {
                *value += amplitude * (-0.5 * (offset / sigma).powi(2)).exp();
            }
        }
    }
}

/// Evenly spaced centers, the first at `period / 2`, that fit in `len` samples
pub fn centers(period: usize, len: usize) -> Vec<usize> {
    (0..)
        .map(|k| period / 2 + k * period)
        .take_while(|&c| c < len)
        .collect()
}

/// Regular pulse train of `seconds` length
pub fn pulse_train(fs: f32, period: usize, seconds: f32) -> (Vec<f32>, Vec<usize>) {
    let len = (seconds * fs) as usize;
    let centers = centers(period, len);
    let mut signal = vec![0.0; len];
    add_pulses(&mut signal, fs, &centers, 1.0);
    (signal, centers)
}

/// Seeded white Gaussian noise with standard deviation `sigma`
pub fn add_noise(signal: &mut [f32], sigma: f32, seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    let normal = Normal::new(0.0, sigma).unwrap();
    for value in signal.iter_mut() {
        *value += normal.sample(&mut rng);
    }
}

pub fn assert_strictly_increasing(indices: &[usize], min_gap: usize) {
    for pair in indices.windows(2) {
        assert!(
            pair[1] > pair[0] && pair[1] - pair[0] >= min_gap,
            "peaks at {} and {} closer than {}",
            pair[0],
            pair[1],
            min_gap
        );
    }
}

/// Distance from `index` to the closest true center
pub fn nearest_offset(index: usize, centers: &[usize]) -> usize {
    centers
        .iter()
        .map(|&c| c.abs_diff(index))
        .min()
        .unwrap_or(usize::MAX)
}
