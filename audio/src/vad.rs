//! Energy-based voice activity trimming.

use serde::{Deserialize, Serialize};

use crate::dsp::{rms, to_dbfs};

/// Configuration for [`trim_silence`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VadConfig {
    /// Analysis frame length in milliseconds (default: 30).
    pub frame_ms: u32,
    /// Absolute level below which a frame is never speech, in dBFS
    /// (default: -50).
    pub floor_db: f32,
    /// Frames quieter than the loudest frame by more than this many dB are
    /// treated as silence (default: 40).
    pub dynamic_range_db: f32,
    /// Number of frames kept on each side of a speech frame so onsets and
    /// decays survive trimming (default: 3).
    pub padding_frames: usize,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            frame_ms: 30,
            floor_db: -50.0,
            dynamic_range_db: 40.0,
            padding_frames: 3,
        }
    }
}

/// Removes leading, trailing and interior silence.
///
/// The signal is split into fixed frames; a frame is speech when its RMS
/// level exceeds `max(floor_db, loudest - dynamic_range_db)`. Speech frames
/// are dilated by `padding_frames` and the surviving frames are concatenated.
/// Returns an empty vector when no frame qualifies.
pub fn trim_silence(samples: &[f32], sample_rate: u32, cfg: &VadConfig) -> Vec<f32> {
    let frame_len = ((sample_rate as u64 * cfg.frame_ms.max(1) as u64) / 1000).max(1) as usize;
    if samples.is_empty() {
        return Vec::new();
    }

    let levels: Vec<f32> = samples.chunks(frame_len).map(|f| to_dbfs(rms(f))).collect();
    let loudest = levels.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if !loudest.is_finite() {
        return Vec::new();
    }
    let gate = cfg.floor_db.max(loudest - cfg.dynamic_range_db);

    let speech: Vec<bool> = levels.iter().map(|&db| db > gate).collect();
    let n = speech.len();
    let mut keep = vec![false; n];
    for (i, _) in speech.iter().enumerate().filter(|(_, s)| **s) {
        let lo = i.saturating_sub(cfg.padding_frames);
        let hi = (i + cfg.padding_frames).min(n - 1);
        for k in &mut keep[lo..=hi] {
            *k = true;
        }
    }

    samples
        .chunks(frame_len)
        .zip(keep)
        .filter(|(_, k)| *k)
        .flat_map(|(frame, _)| frame.iter().copied())
        .collect()
}
