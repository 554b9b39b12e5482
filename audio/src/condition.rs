use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::decode::decode;
use crate::dsp;
use crate::error::AudioError;
use crate::resample::resample;
use crate::vad::{VadConfig, trim_silence};

/// Hop between candidate windows during best-segment selection.
const SEGMENT_HOP_SECS: f32 = 0.010;

/// How the conditioner levels the waveform.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum NormalizeMode {
    /// Scale so the absolute peak equals `target`.
    Peak { target: f32 },
    /// Scale to an RMS level in dBFS, limited so the peak stays under
    /// `ceiling`.
    Rms { target_dbfs: f32, ceiling: f32 },
}

impl Default for NormalizeMode {
    fn default() -> Self {
        NormalizeMode::Peak { target: 0.95 }
    }
}

/// Configuration for [`AudioConditioner`].
///
/// Deserializes from YAML with every field optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConditionerConfig {
    /// Output sample rate in Hz (default: 16000).
    pub target_sample_rate: u32,
    /// Down-mix multi-channel input by averaging (default: true).
    pub force_mono: bool,
    /// When mono is not forced, average stereo input instead of keeping only
    /// the first channel (default: true).
    pub accept_stereo: bool,
    /// Convert to `target_sample_rate` (default: true).
    pub resample: bool,
    /// Master switch for VAD trimming, segment selection, normalization and
    /// pre-emphasis (default: true).
    pub enhance: bool,
    /// Remove non-speech frames (default: true).
    pub trim_silence: bool,
    pub vad: VadConfig,
    /// Minimum remaining duration in seconds; always enforced (default: 1.0).
    pub min_duration_secs: f32,
    /// Analysis window for best-segment selection; 0 disables (default: 3.0).
    pub segment_window_secs: f32,
    /// Level the waveform (default: true).
    pub normalize: bool,
    pub normalize_mode: NormalizeMode,
    /// Pre-emphasis coefficient; 0 disables (default: 0.97).
    pub pre_emphasis: f32,
}

impl Default for ConditionerConfig {
    fn default() -> Self {
        Self {
            target_sample_rate: 16_000,
            force_mono: true,
            accept_stereo: true,
            resample: true,
            enhance: true,
            trim_silence: true,
            vad: VadConfig::default(),
            min_duration_secs: 1.0,
            segment_window_secs: 3.0,
            normalize: true,
            normalize_mode: NormalizeMode::default(),
            pre_emphasis: 0.97,
        }
    }
}

/// Canonical mono waveform produced by [`AudioConditioner::condition`].
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub duration: Duration,
}

impl ConditionedAudio {
    /// Wraps an already-canonical waveform.
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        let duration = if sample_rate == 0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(samples.len() as f64 / sample_rate as f64)
        };
        Self {
            samples,
            sample_rate,
            duration,
        }
    }

    pub fn duration_secs(&self) -> f32 {
        self.duration.as_secs_f32()
    }
}

/// Normalizes uploaded audio into the waveform the encoders expect.
///
/// Stateless apart from its configuration; share it freely between threads.
#[derive(Debug, Clone, Default)]
pub struct AudioConditioner {
    cfg: ConditionerConfig,
}

impl AudioConditioner {
    pub fn new(cfg: ConditionerConfig) -> Self {
        Self { cfg }
    }

    pub fn config(&self) -> &ConditionerConfig {
        &self.cfg
    }

    /// Decodes `bytes` and runs the conditioning pipeline.
    pub fn condition(&self, bytes: &[u8]) -> Result<ConditionedAudio, AudioError> {
        let decoded = decode(bytes)?;
        let mono = if decoded.channels > 1 && !self.cfg.force_mono && !self.cfg.accept_stereo {
            dsp::first_channel(&decoded.samples, decoded.channels)
        } else {
            dsp::downmix(&decoded.samples, decoded.channels)
        };
        self.condition_pcm(&mono, decoded.sample_rate)
    }

    /// Runs the pipeline from resampling onwards on a mono signal.
    pub fn condition_pcm(
        &self,
        samples: &[f32],
        sample_rate: u32,
    ) -> Result<ConditionedAudio, AudioError> {
        let cfg = &self.cfg;
        let enhance = cfg.enhance;

        let (mut pcm, rate) = if cfg.resample && sample_rate != cfg.target_sample_rate {
            let out = resample(samples, sample_rate, cfg.target_sample_rate)?;
            debug!(
                from = sample_rate,
                to = cfg.target_sample_rate,
                samples = out.len(),
                "audio: resampled"
            );
            (out, cfg.target_sample_rate)
        } else {
            (samples.to_vec(), sample_rate)
        };
        if rate == 0 {
            return Err(AudioError::UnsupportedFormat("sample rate is zero".into()));
        }

        let vad_on = enhance && cfg.trim_silence;
        if vad_on {
            let before = pcm.len();
            pcm = trim_silence(&pcm, rate, &cfg.vad);
            debug!(before, after = pcm.len(), "audio: vad trimmed");
            if pcm.is_empty() {
                return Err(AudioError::NoSpeechDetected);
            }
        }

        let got_secs = pcm.len() as f32 / rate as f32;
        if got_secs < cfg.min_duration_secs {
            return Err(AudioError::AudioTooShort {
                min_secs: cfg.min_duration_secs,
                got_secs,
            });
        }

        if enhance && cfg.segment_window_secs > 0.0 {
            let window = (cfg.segment_window_secs * rate as f32).round() as usize;
            let hop = ((SEGMENT_HOP_SECS * rate as f32).round() as usize).max(1);
            let range = dsp::best_segment(&pcm, window, hop);
            if range.len() < pcm.len() {
                debug!(start = range.start, end = range.end, "audio: selected segment");
                pcm = pcm[range].to_vec();
            }
        }

        if enhance && cfg.normalize {
            match cfg.normalize_mode {
                NormalizeMode::Peak { target } => dsp::normalize_peak(&mut pcm, target),
                NormalizeMode::Rms {
                    target_dbfs,
                    ceiling,
                } => dsp::normalize_rms(&mut pcm, target_dbfs, ceiling),
            }
        }

        if enhance && cfg.pre_emphasis != 0.0 {
            dsp::pre_emphasis(&mut pcm, cfg.pre_emphasis);
        }

        let out = ConditionedAudio::new(pcm, rate);
        debug!(
            samples = out.samples.len(),
            duration_secs = out.duration_secs(),
            "audio: conditioned"
        );
        Ok(out)
    }
}
