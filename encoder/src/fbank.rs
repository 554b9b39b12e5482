use async_trait::async_trait;
use tracing::debug;

use crate::encoder::{Encoder, EncoderId, EncoderKind, check_embedding};
use crate::error::EncoderError;
use crate::features::{LogMel, LogMelConfig};

/// In-process encoder built from log-mel statistics.
///
/// The embedding is `[mean; std]` of each mel band over time, each half
/// centred across bands, then L2-normalized. Dimension is `2 * num_mels`.
/// It separates speakers far less well than a trained model but needs no
/// external service.
#[derive(Debug, Clone)]
pub struct FbankEncoder {
    num_mels: usize,
}

impl FbankEncoder {
    pub fn new(num_mels: usize) -> Result<Self, EncoderError> {
        if num_mels < 2 {
            return Err(EncoderError::InvalidConfig(format!(
                "fbank needs at least 2 mel bands, got {num_mels}"
            )));
        }
        Ok(Self { num_mels })
    }

    /// Synchronous core of [`Encoder::embed`].
    pub fn embed_sync(&self, waveform: &[f32], sample_rate: u32) -> Result<Vec<f32>, EncoderError> {
        if sample_rate == 0 {
            return Err(EncoderError::Failed("sample rate is zero".into()));
        }
        let lm = LogMel::new(&LogMelConfig::new(sample_rate, self.num_mels));
        let frames = lm.compute(waveform);
        if frames.is_empty() {
            return Err(EncoderError::Failed(format!(
                "waveform too short: {} samples",
                waveform.len()
            )));
        }

        let t = frames.len() as f64;
        let m = self.num_mels;
        let mut mean = vec![0.0f64; m];
        for row in &frames {
            for (acc, &v) in mean.iter_mut().zip(row) {
                *acc += v as f64;
            }
        }
        mean.iter_mut().for_each(|v| *v /= t);

        let mut std = vec![0.0f64; m];
        for row in &frames {
            for ((acc, &v), mu) in std.iter_mut().zip(row).zip(&mean) {
                let d = v as f64 - mu;
                *acc += d * d;
            }
        }
        std.iter_mut().for_each(|v| *v = (*v / t).sqrt());

        let center = |xs: &mut [f64]| {
            let avg = xs.iter().sum::<f64>() / xs.len() as f64;
            xs.iter_mut().for_each(|x| *x -= avg);
        };
        center(&mut mean);
        center(&mut std);

        let norm = mean.iter().chain(&std).map(|x| x * x).sum::<f64>().sqrt();
        if norm == 0.0 || !norm.is_finite() {
            return Err(EncoderError::Failed("degenerate spectrum".into()));
        }
        let embedding: Vec<f32> = mean
            .iter()
            .chain(&std)
            .map(|x| (x / norm) as f32)
            .collect();
        check_embedding(&embedding, self.dimension())?;
        debug!(frames = frames.len(), dim = embedding.len(), "encoder: fbank embedded");
        Ok(embedding)
    }
}

#[async_trait]
impl Encoder for FbankEncoder {
    async fn embed(&self, waveform: &[f32], sample_rate: u32) -> Result<Vec<f32>, EncoderError> {
        self.embed_sync(waveform, sample_rate)
    }

    fn dimension(&self) -> usize {
        EncoderKind::Fbank.dimension(self.num_mels)
    }

    fn id(&self) -> EncoderId {
        EncoderId::new(EncoderKind::Fbank, self.dimension())
    }
}
