use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::encoder::{Encoder, EncoderKind};
use crate::error::EncoderError;
use crate::fbank::FbankEncoder;
use crate::http::HttpEncoder;

/// Encoder selection, deserialized from the `encoder` config section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// Model family (default: fbank).
    pub kind: EncoderKind,
    /// Sidecar base URL for resemblyzer and ecapa.
    pub url: String,
    pub timeout_secs: u64,
    /// Mel bands for the fbank encoder (default: 40).
    pub num_mels: usize,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            kind: EncoderKind::Fbank,
            url: "http://127.0.0.1:8001".to_string(),
            timeout_secs: 30,
            num_mels: 40,
        }
    }
}

/// Builds the encoder selected by `cfg`.
pub fn build(cfg: &EncoderConfig) -> Result<Arc<dyn Encoder>, EncoderError> {
    let encoder: Arc<dyn Encoder> = match cfg.kind {
        EncoderKind::Fbank => Arc::new(FbankEncoder::new(cfg.num_mels)?),
        kind => Arc::new(HttpEncoder::new(
            &cfg.url,
            kind,
            Duration::from_secs(cfg.timeout_secs.max(1)),
        )?),
    };
    info!(encoder = %encoder.id(), "encoder: ready");
    Ok(encoder)
}
