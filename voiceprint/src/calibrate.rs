use serde::{Deserialize, Serialize};

/// Score calibration settings.
///
/// Cosine similarities between speaker embeddings tend to bunch together.
/// When the spread of a candidate list falls below `compressed_std`, the gaps
/// below the top score are stretched by up to `max_gain`, anchored at the top
/// score so the accept/reject decision is unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    pub enabled: bool,
    /// Population standard deviation below which scores count as compressed
    /// (default: 0.05).
    pub compressed_std: f32,
    /// Upper bound on the stretch factor (default: 8).
    pub max_gain: f32,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            compressed_std: 0.05,
            max_gain: 8.0,
        }
    }
}

/// Calibrates raw similarities sorted best first.
///
/// Monotone non-decreasing in each raw score, so rank order is preserved.
/// The top score maps to itself clamped to `[0, 1]`. With calibration
/// disabled the input is returned unchanged.
pub fn calibrate(scores: &[f32], cfg: &CalibrationConfig) -> Vec<f32> {
    if !cfg.enabled {
        return scores.to_vec();
    }
    if scores.len() < 2 {
        return scores.iter().map(|s| s.clamp(0.0, 1.0)).collect();
    }

    let n = scores.len() as f64;
    let mean = scores.iter().map(|&s| s as f64).sum::<f64>() / n;
    let var = scores
        .iter()
        .map(|&s| (s as f64 - mean).powi(2))
        .sum::<f64>()
        / n;
    let sigma = var.sqrt();

    let target = cfg.compressed_std as f64;
    let gain = if sigma < target {
        (target / sigma.max(1e-6)).min(cfg.max_gain.max(1.0) as f64)
    } else {
        1.0
    };

    let top = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max) as f64;
    scores
        .iter()
        .map(|&s| (top - (top - s as f64) * gain).clamp(0.0, 1.0) as f32)
        .collect()
}
