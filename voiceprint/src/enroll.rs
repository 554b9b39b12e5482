use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};
use voxid_audio::ConditionedAudio;
use voxid_encoder::Encoder;

use crate::centroid::recompute;
use crate::error::VoiceprintError;
use crate::ids::validate_name;
use crate::profile::ProfileStore;

/// Centroid refresh attempts per enrollment before the last write is left
/// for the next enrollment or rebuild to correct.
const DEFAULT_MAX_ATTEMPTS: usize = 8;

/// Result of a successful enrollment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Enrollment {
    /// Stored (trimmed) speaker name.
    pub name: String,
    pub sample_id: String,
    /// Samples folded into the centroid written last.
    pub sample_count: usize,
}

/// Appends samples and keeps each speaker's centroid equal to the mean of
/// their samples.
///
/// No lock is held across index calls. After writing a centroid the manager
/// re-counts the speaker's samples; if a concurrent enrollment added one in
/// between, the centroid is recomputed from a fresh read.
pub struct EnrollmentManager {
    store: Arc<ProfileStore>,
    encoder: Arc<dyn Encoder>,
    max_attempts: usize,
}

impl EnrollmentManager {
    pub fn new(store: Arc<ProfileStore>, encoder: Arc<dyn Encoder>) -> Self {
        Self {
            store,
            encoder,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, n: usize) -> Self {
        self.max_attempts = n.max(1);
        self
    }

    /// Embeds `audio` and enrolls it under `name`.
    pub async fn enroll(
        &self,
        name: &str,
        audio: &ConditionedAudio,
    ) -> Result<Enrollment, VoiceprintError> {
        let name = validate_name(name)?;
        let embedding = self.encoder.embed(&audio.samples, audio.sample_rate).await?;
        self.enroll_validated(name, &embedding).await
    }

    /// Enrolls an already computed embedding under `name`.
    pub async fn enroll_embedding(
        &self,
        name: &str,
        embedding: &[f32],
    ) -> Result<Enrollment, VoiceprintError> {
        let name = validate_name(name)?;
        self.enroll_validated(name, embedding).await
    }

    async fn enroll_validated(
        &self,
        name: String,
        embedding: &[f32],
    ) -> Result<Enrollment, VoiceprintError> {
        let sample_id = self.store.add_sample(&name, embedding).await?;
        let sample_count = self.refresh(&name).await?;
        info!(name = %name, sample_count, "voiceprint: enrolled");
        Ok(Enrollment {
            name,
            sample_id,
            sample_count,
        })
    }

    /// Rewrites the centroid of `name` until it reflects every sample that
    /// existed when it was written.
    async fn refresh(&self, name: &str) -> Result<usize, VoiceprintError> {
        let mut written = 0;
        for attempt in 1..=self.max_attempts {
            let Some(used) = recompute(&self.store, name).await? else {
                return self.vanished(name).await;
            };
            written = used;

            let now = self.store.count_samples(name).await?;
            if now == used {
                return Ok(used);
            }
            if now == 0 {
                return self.vanished(name).await;
            }
            warn!(
                name,
                attempt,
                used,
                now,
                "voiceprint: samples changed during refresh, retrying"
            );
        }
        warn!(
            name,
            written,
            "voiceprint: centroid refresh gave up; next write or rebuild corrects it"
        );
        Ok(written)
    }

    /// The speaker was deleted while enrolling. Drop any centroid this call
    /// may have written.
    async fn vanished(&self, name: &str) -> Result<usize, VoiceprintError> {
        self.store.delete_centroid(name).await?;
        Err(VoiceprintError::SpeakerNotFound(name.to_string()))
    }
}
