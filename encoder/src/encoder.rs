use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::EncoderError;

/// The model family behind an encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncoderKind {
    /// Resemblyzer d-vector, 256 dimensions.
    Resemblyzer,
    /// SpeechBrain ECAPA-TDNN, 192 dimensions.
    Ecapa,
    /// In-process log-mel statistics, `2 * num_mels` dimensions.
    Fbank,
}

impl EncoderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EncoderKind::Resemblyzer => "resemblyzer",
            EncoderKind::Ecapa => "ecapa",
            EncoderKind::Fbank => "fbank",
        }
    }

    /// Embedding dimension. `num_mels` only matters for [`EncoderKind::Fbank`].
    pub fn dimension(&self, num_mels: usize) -> usize {
        match self {
            EncoderKind::Resemblyzer => 256,
            EncoderKind::Ecapa => 192,
            EncoderKind::Fbank => 2 * num_mels,
        }
    }
}

impl fmt::Display for EncoderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity tag stored with every embedding, e.g. `ecapa-192`.
///
/// Two encoders with the same id produce comparable vectors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncoderId(String);

impl EncoderId {
    pub fn new(kind: EncoderKind, dim: usize) -> Self {
        EncoderId(format!("{kind}-{dim}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EncoderId {
    fn from(s: &str) -> Self {
        EncoderId(s.to_string())
    }
}

impl fmt::Display for EncoderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Encoder extracts a speaker embedding from a conditioned waveform.
///
/// Input is mono f32 PCM in [-1, 1] at `sample_rate`. The output has exactly
/// [`Encoder::dimension`] finite components and a non-zero norm.
///
/// Implementations must be safe for concurrent use (Send + Sync).
#[async_trait::async_trait]
pub trait Encoder: Send + Sync {
    async fn embed(&self, waveform: &[f32], sample_rate: u32) -> Result<Vec<f32>, EncoderError>;

    fn dimension(&self) -> usize;

    fn id(&self) -> EncoderId;
}

/// Verifies an embedding has `dim` finite components and is not all zeros.
pub fn check_embedding(v: &[f32], dim: usize) -> Result<(), EncoderError> {
    if v.len() != dim {
        return Err(EncoderError::DimensionMismatch {
            got: v.len(),
            want: dim,
        });
    }
    if v.iter().any(|x| !x.is_finite()) {
        return Err(EncoderError::Failed("embedding has non-finite values".into()));
    }
    if v.iter().all(|&x| x == 0.0) {
        return Err(EncoderError::Failed("embedding is all zeros".into()));
    }
    Ok(())
}
