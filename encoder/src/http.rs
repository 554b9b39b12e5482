use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::encoder::{Encoder, EncoderId, EncoderKind, check_embedding};
use crate::error::EncoderError;

/// Request body for `POST {base_url}/embed`.
#[derive(Serialize)]
struct EmbedRequest<'a> {
    sample_rate: u32,
    encoding: &'a str,
    /// Base64 of little-endian f32 samples.
    audio: String,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f64>,
}

/// Encoder backed by a model sidecar speaking a small JSON protocol.
///
/// The sidecar hosts Resemblyzer or ECAPA-TDNN; `kind` fixes the expected
/// dimension and the catalog tag.
pub struct HttpEncoder {
    client: Client,
    base_url: String,
    kind: EncoderKind,
    dim: usize,
}

impl HttpEncoder {
    pub fn new(base_url: &str, kind: EncoderKind, timeout: Duration) -> Result<Self, EncoderError> {
        if kind == EncoderKind::Fbank {
            return Err(EncoderError::InvalidConfig(
                "fbank runs in process, not over HTTP".into(),
            ));
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EncoderError::InvalidConfig(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            kind,
            dim: kind.dimension(0),
        })
    }

    pub fn kind(&self) -> EncoderKind {
        self.kind
    }
}

fn encode_f32le(samples: &[f32]) -> String {
    let mut bytes = Vec::with_capacity(samples.len() * 4);
    for s in samples {
        bytes.extend_from_slice(&s.to_le_bytes());
    }
    STANDARD.encode(bytes)
}

#[async_trait]
impl Encoder for HttpEncoder {
    async fn embed(&self, waveform: &[f32], sample_rate: u32) -> Result<Vec<f32>, EncoderError> {
        if waveform.is_empty() {
            return Err(EncoderError::Failed("empty waveform".into()));
        }
        let url = format!("{}/embed", self.base_url);
        let body = EmbedRequest {
            sample_rate,
            encoding: "f32le",
            audio: encode_f32le(waveform),
        };

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| EncoderError::Unavailable(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let msg = format!("HTTP {status}: {body}");
            return Err(if status.is_client_error() {
                EncoderError::Failed(msg)
            } else {
                EncoderError::Unavailable(msg)
            });
        }

        let data: EmbedResponse = resp
            .json()
            .await
            .map_err(|e| EncoderError::Failed(format!("malformed response: {e}")))?;
        let embedding: Vec<f32> = data.embedding.iter().map(|&v| v as f32).collect();

        check_embedding(&embedding, self.dim).map_err(|e| match e {
            EncoderError::DimensionMismatch { got, want } => EncoderError::Failed(format!(
                "sidecar returned {got} dimensions, want {want}"
            )),
            other => other,
        })?;
        debug!(kind = %self.kind, samples = waveform.len(), "encoder: sidecar embedded");
        Ok(embedding)
    }

    fn dimension(&self) -> usize {
        self.dim
    }

    fn id(&self) -> EncoderId {
        EncoderId::new(self.kind, self.dim)
    }
}
