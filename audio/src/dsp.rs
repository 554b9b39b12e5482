//! Sample-level helpers used by the conditioner.
//!
//! All functions operate on mono f32 signals in [-1, 1] unless stated
//! otherwise.

use std::ops::Range;

/// Averages interleaved channels into a mono signal.
pub fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    let scale = 1.0 / channels as f32;
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() * scale)
        .collect()
}

/// Extracts the first channel of an interleaved signal.
pub fn first_channel(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved.chunks_exact(channels).map(|frame| frame[0]).collect()
}

/// Root mean square of a signal; 0 for an empty slice.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum / samples.len() as f64).sqrt() as f32
}

/// Converts a linear RMS level to dBFS. Silence maps to -inf.
pub fn to_dbfs(level: f32) -> f32 {
    if level <= 0.0 {
        return f32::NEG_INFINITY;
    }
    20.0 * level.log10()
}

/// Finds the `window`-sample range with the highest short-term energy.
///
/// Candidate windows start every `hop` samples (plus the final, right-aligned
/// window). Energy is the sum of squares, computed with prefix sums so the
/// scan is linear. The first maximum wins, which keeps the choice
/// deterministic for flat signals.
pub fn best_segment(samples: &[f32], window: usize, hop: usize) -> Range<usize> {
    let n = samples.len();
    if window == 0 || n <= window {
        return 0..n;
    }
    let hop = hop.max(1);

    let mut prefix = Vec::with_capacity(n + 1);
    prefix.push(0.0f64);
    let mut acc = 0.0f64;
    for &s in samples {
        acc += (s as f64) * (s as f64);
        prefix.push(acc);
    }
    let energy = |start: usize| prefix[start + window] - prefix[start];

    let last = n - window;
    let mut best_start = 0;
    let mut best_energy = energy(0);
    let mut start = hop;
    while start <= last {
        let e = energy(start);
        if e > best_energy {
            best_energy = e;
            best_start = start;
        }
        start += hop;
    }
    if last % hop != 0 && energy(last) > best_energy {
        best_start = last;
    }
    best_start..best_start + window
}

/// Scales the signal so its absolute peak equals `target`.
/// Silent input is returned unchanged.
pub fn normalize_peak(samples: &mut [f32], target: f32) {
    let peak = samples.iter().fold(0.0f32, |m, &s| m.max(s.abs()));
    if peak <= f32::EPSILON {
        return;
    }
    let gain = target / peak;
    for s in samples.iter_mut() {
        *s *= gain;
    }
}

/// Scales the signal to the RMS level `target_dbfs`, then limits the gain so
/// the peak never exceeds `ceiling`.
pub fn normalize_rms(samples: &mut [f32], target_dbfs: f32, ceiling: f32) {
    let level = rms(samples);
    if level <= f32::EPSILON {
        return;
    }
    let peak = samples.iter().fold(0.0f32, |m, &s| m.max(s.abs()));
    let mut gain = 10f32.powf(target_dbfs / 20.0) / level;
    if peak * gain > ceiling {
        gain = ceiling / peak;
    }
    for s in samples.iter_mut() {
        *s *= gain;
    }
}

/// First-order pre-emphasis filter: `y[n] = x[n] - coeff * x[n-1]`, with
/// `y[0] = x[0]`.
pub fn pre_emphasis(samples: &mut [f32], coeff: f32) {
    if samples.is_empty() || coeff == 0.0 {
        return;
    }
    let mut prev = samples[0];
    for s in samples.iter_mut().skip(1) {
        let cur = *s;
        *s = cur - coeff * prev;
        prev = cur;
    }
}
