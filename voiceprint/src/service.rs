use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;
use voxid_audio::{AudioConditioner, ConditionedAudio};
use voxid_encoder::{Encoder, EncoderId};

use crate::enroll::{Enrollment, EnrollmentManager};
use crate::error::VoiceprintError;
use crate::identify::{Identification, IdentificationEngine, IdentifyConfig, validate_query};
use crate::ids::validate_name;
use crate::profile::ProfileStore;
use crate::rebuild::{RebuildConfig, RebuildReport, RebuildService};

/// Settings that can change while the service runs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuntimeSettings {
    pub threshold: f32,
    pub top_k: usize,
}

/// Audio-in facade over conditioning, enrollment, identification and rebuild.
///
/// Conditioning runs on the blocking pool. Shareable behind an `Arc`.
pub struct VoiceprintService {
    conditioner: Arc<AudioConditioner>,
    encoder: Arc<dyn Encoder>,
    store: Arc<ProfileStore>,
    enrollment: EnrollmentManager,
    identification: IdentificationEngine,
    rebuild: RebuildService,
    runtime: RwLock<RuntimeSettings>,
    calibration_enabled: bool,
}

impl VoiceprintService {
    /// Wires the components. The store must be tagged with the encoder's
    /// identity and dimension.
    pub fn new(
        conditioner: AudioConditioner,
        encoder: Arc<dyn Encoder>,
        store: Arc<ProfileStore>,
        identify: &IdentifyConfig,
        rebuild: &RebuildConfig,
    ) -> Result<Self, VoiceprintError> {
        if store.dimension() != encoder.dimension() {
            return Err(VoiceprintError::DimensionMismatch {
                expected: encoder.dimension(),
                got: store.dimension(),
            });
        }
        if store.encoder_id() != &encoder.id() {
            return Err(VoiceprintError::EncoderMismatch {
                record: "<store>".into(),
                expected: encoder.id().to_string(),
                found: store.encoder_id().to_string(),
            });
        }
        validate_query(identify.threshold, identify.top_k)?;

        Ok(Self {
            conditioner: Arc::new(conditioner),
            enrollment: EnrollmentManager::new(store.clone(), encoder.clone()),
            identification: IdentificationEngine::new(
                store.clone(),
                encoder.clone(),
                identify.calibration.clone(),
            ),
            rebuild: RebuildService::new(store.clone(), rebuild),
            runtime: RwLock::new(RuntimeSettings {
                threshold: identify.threshold,
                top_k: identify.top_k,
            }),
            calibration_enabled: identify.calibration.enabled,
            encoder,
            store,
        })
    }

    pub fn store(&self) -> &Arc<ProfileStore> {
        &self.store
    }

    pub fn encoder_id(&self) -> EncoderId {
        self.encoder.id()
    }

    pub fn calibration_enabled(&self) -> bool {
        self.calibration_enabled
    }

    pub fn runtime(&self) -> RuntimeSettings {
        *self.runtime.read()
    }

    pub fn threshold(&self) -> f32 {
        self.runtime.read().threshold
    }

    /// Sets the default threshold, clamped to `[0, 1]`. Returns the stored
    /// value. Not persisted.
    pub fn set_threshold(&self, threshold: f32) -> Result<f32, VoiceprintError> {
        if !threshold.is_finite() {
            return Err(VoiceprintError::InvalidThreshold(threshold));
        }
        let clamped = threshold.clamp(0.0, 1.0);
        self.runtime.write().threshold = clamped;
        Ok(clamped)
    }

    /// Decodes and conditions `bytes` on the blocking pool.
    pub async fn condition(&self, bytes: Vec<u8>) -> Result<ConditionedAudio, VoiceprintError> {
        let conditioner = self.conditioner.clone();
        let audio = tokio::task::spawn_blocking(move || conditioner.condition(&bytes))
            .await
            .map_err(|e| VoiceprintError::Internal(format!("conditioning task: {e}")))??;
        debug!(duration_secs = audio.duration_secs(), "voiceprint: audio conditioned");
        Ok(audio)
    }

    pub async fn enroll_audio(
        &self,
        name: &str,
        bytes: Vec<u8>,
    ) -> Result<Enrollment, VoiceprintError> {
        let name = validate_name(name)?;
        let audio = self.condition(bytes).await?;
        self.enrollment.enroll(&name, &audio).await
    }

    /// Identifies `bytes`, using the runtime defaults for any parameter not
    /// given.
    pub async fn identify_audio(
        &self,
        bytes: Vec<u8>,
        threshold: Option<f32>,
        top_k: Option<usize>,
    ) -> Result<Identification, VoiceprintError> {
        let defaults = self.runtime();
        let threshold = threshold.unwrap_or(defaults.threshold);
        let top_k = top_k.unwrap_or(defaults.top_k);
        validate_query(threshold, top_k)?;
        let audio = self.condition(bytes).await?;
        self.identification.identify(&audio, threshold, top_k).await
    }

    pub fn enrollment(&self) -> &EnrollmentManager {
        &self.enrollment
    }

    pub fn identification(&self) -> &IdentificationEngine {
        &self.identification
    }

    /// Enrolled speaker names, sorted.
    pub async fn profiles(&self) -> Result<Vec<String>, VoiceprintError> {
        Ok(self.store.list_speaker_names().await?.into_iter().collect())
    }

    /// Deletes one speaker. Returns the number of samples removed.
    pub async fn reset(&self, name: &str) -> Result<usize, VoiceprintError> {
        let name = validate_name(name)?;
        self.store.delete_speaker(&name).await
    }

    pub async fn reset_all(&self) -> Result<(), VoiceprintError> {
        self.store.delete_all().await
    }

    pub async fn rebuild(&self) -> Result<RebuildReport, VoiceprintError> {
        self.rebuild.rebuild().await
    }

    pub async fn verify_catalog(&self) -> Result<(), VoiceprintError> {
        self.store.verify_catalog().await
    }
}
