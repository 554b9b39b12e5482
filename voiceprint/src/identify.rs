use std::sync::Arc;

use serde::{Deserialize, Serialize, Serializer};
use tracing::info;
use voxid_audio::ConditionedAudio;
use voxid_encoder::Encoder;

use crate::calibrate::{CalibrationConfig, calibrate};
use crate::error::VoiceprintError;
use crate::profile::ProfileStore;

/// Label reported when no speaker clears the threshold.
pub const UNKNOWN_SPEAKER: &str = "unknown";

/// Identification defaults, deserialized from the `identify` config section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentifyConfig {
    /// Minimum calibrated score to accept the best candidate (default: 0.82).
    pub threshold: f32,
    /// Centroids to score per query (default: 5).
    pub top_k: usize,
    pub calibration: CalibrationConfig,
}

impl Default for IdentifyConfig {
    fn default() -> Self {
        Self {
            threshold: 0.82,
            top_k: 5,
            calibration: CalibrationConfig::default(),
        }
    }
}

/// A scored centroid.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    pub name: String,
    pub score: f32,
}

/// Outcome of an identification query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Identification {
    /// Accepted speaker, or `None` for unknown. Serialized as `"unknown"`.
    #[serde(serialize_with = "speaker_or_unknown")]
    pub speaker: Option<String>,
    /// Calibrated score of the best candidate; 0 with an empty catalog.
    pub confidence: f32,
    /// Best first, calibrated.
    pub candidates: Vec<Candidate>,
}

impl Identification {
    pub fn unknown() -> Self {
        Self {
            speaker: None,
            confidence: 0.0,
            candidates: Vec::new(),
        }
    }

    pub fn speaker_label(&self) -> &str {
        self.speaker.as_deref().unwrap_or(UNKNOWN_SPEAKER)
    }
}

fn speaker_or_unknown<S: Serializer>(speaker: &Option<String>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(speaker.as_deref().unwrap_or(UNKNOWN_SPEAKER))
}

pub(crate) fn validate_query(threshold: f32, top_k: usize) -> Result<(), VoiceprintError> {
    if top_k == 0 {
        return Err(VoiceprintError::InvalidTopK(top_k));
    }
    if !threshold.is_finite() || !(0.0..=1.0).contains(&threshold) {
        return Err(VoiceprintError::InvalidThreshold(threshold));
    }
    Ok(())
}

/// Scores a query against every centroid and applies the threshold decision.
pub struct IdentificationEngine {
    store: Arc<ProfileStore>,
    encoder: Arc<dyn Encoder>,
    calibration: CalibrationConfig,
}

impl IdentificationEngine {
    pub fn new(
        store: Arc<ProfileStore>,
        encoder: Arc<dyn Encoder>,
        calibration: CalibrationConfig,
    ) -> Self {
        Self {
            store,
            encoder,
            calibration,
        }
    }

    /// Embeds `audio` and identifies it.
    pub async fn identify(
        &self,
        audio: &ConditionedAudio,
        threshold: f32,
        top_k: usize,
    ) -> Result<Identification, VoiceprintError> {
        validate_query(threshold, top_k)?;
        let embedding = self.encoder.embed(&audio.samples, audio.sample_rate).await?;
        self.identify_embedding(&embedding, threshold, top_k).await
    }

    /// Identifies an already computed embedding.
    pub async fn identify_embedding(
        &self,
        embedding: &[f32],
        threshold: f32,
        top_k: usize,
    ) -> Result<Identification, VoiceprintError> {
        validate_query(threshold, top_k)?;
        let hits = self.store.search_centroids(embedding, top_k).await?;
        if hits.is_empty() {
            info!("voiceprint: identify on empty catalog");
            return Ok(Identification::unknown());
        }

        let raw: Vec<f32> = hits.iter().map(|(_, s)| *s).collect();
        let scores = calibrate(&raw, &self.calibration);
        let candidates: Vec<Candidate> = hits
            .into_iter()
            .zip(scores)
            .map(|((name, _), score)| Candidate { name, score })
            .collect();

        let best = &candidates[0];
        let speaker = (best.score >= threshold).then(|| best.name.clone());
        let confidence = best.score;
        info!(
            speaker = speaker.as_deref().unwrap_or(UNKNOWN_SPEAKER),
            confidence,
            raw_best = raw[0],
            threshold,
            "voiceprint: identified"
        );
        Ok(Identification {
            speaker,
            confidence,
            candidates,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_validation() {
        assert!(validate_query(0.82, 5).is_ok());
        assert!(validate_query(0.0, 1).is_ok());
        assert!(validate_query(1.0, 1).is_ok());
        assert!(matches!(validate_query(0.5, 0), Err(VoiceprintError::InvalidTopK(0))));
        for bad in [-0.01, 1.01, f32::NAN, f32::INFINITY] {
            assert!(matches!(
                validate_query(bad, 3),
                Err(VoiceprintError::InvalidThreshold(_))
            ));
        }
    }

    #[test]
    fn unknown_serializes_as_label() {
        let json = serde_json::to_value(Identification::unknown()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"speaker": "unknown", "confidence": 0.0, "candidates": []})
        );

        let hit = Identification {
            speaker: Some("alice".into()),
            confidence: 0.9,
            candidates: vec![Candidate {
                name: "alice".into(),
                score: 0.9,
            }],
        };
        assert_eq!(hit.speaker_label(), "alice");
        assert_eq!(serde_json::to_value(&hit).unwrap()["speaker"], "alice");
    }
}
