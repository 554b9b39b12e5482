use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info};
use voxid_encoder::EncoderId;
use voxid_vecstore::{Filter, Payload, Point, VecIndex, l2_normalize};

use crate::centroid::recompute;
use crate::error::VoiceprintError;
use crate::ids::{centroid_id, new_sample_id, now_millis};

/// Payload key holding the speaker name.
pub const KEY_NAME: &str = "name";
/// Payload key holding the encoder identity tag.
pub const KEY_ENCODER: &str = "encoder";
/// Payload key holding the write time in unix milliseconds.
pub const KEY_TS: &str = "ts";
/// Payload key holding a centroid's sample count.
pub const KEY_COUNT: &str = "n";

/// One raw enrollment embedding.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample {
    pub id: String,
    pub name: String,
    pub embedding: Vec<f32>,
    pub created_at: DateTime<Utc>,
}

/// A speaker's master profile: the mean of their samples.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Centroid {
    pub id: String,
    pub name: String,
    pub embedding: Vec<f32>,
    pub sample_count: usize,
    pub updated_at: DateTime<Utc>,
}

/// Owns the two-tier catalog: append-only raw samples and one derived
/// centroid per speaker.
///
/// Every record is tagged with the active encoder's identity; records with a
/// different tag are reported as [`VoiceprintError::EncoderMismatch`] instead
/// of being compared.
pub struct ProfileStore {
    raw: Arc<dyn VecIndex>,
    master: Arc<dyn VecIndex>,
    encoder: EncoderId,
    dim: usize,
}

fn name_filter(name: &str) -> Filter {
    Filter::eq(KEY_NAME, name)
}

fn millis_to_time(ms: u64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms as i64).unwrap_or_default()
}

impl ProfileStore {
    /// Both indexes must have dimension `dim`.
    pub fn new(
        raw: Arc<dyn VecIndex>,
        master: Arc<dyn VecIndex>,
        encoder: EncoderId,
        dim: usize,
    ) -> Result<Self, VoiceprintError> {
        for index in [&raw, &master] {
            if index.dimension() != dim {
                return Err(VoiceprintError::DimensionMismatch {
                    expected: dim,
                    got: index.dimension(),
                });
            }
        }
        Ok(Self {
            raw,
            master,
            encoder,
            dim,
        })
    }

    pub fn encoder_id(&self) -> &EncoderId {
        &self.encoder
    }

    pub fn dimension(&self) -> usize {
        self.dim
    }

    fn payload(&self, name: &str) -> Payload {
        let mut p = Payload::new();
        p.insert(KEY_NAME.into(), json!(name));
        p.insert(KEY_ENCODER.into(), json!(self.encoder.as_str()));
        p.insert(KEY_TS.into(), json!(now_millis()));
        p
    }

    fn check_finite(&self, v: &[f32]) -> Result<(), VoiceprintError> {
        if v.len() != self.dim {
            return Err(VoiceprintError::DimensionMismatch {
                expected: self.dim,
                got: v.len(),
            });
        }
        if v.iter().any(|x| !x.is_finite()) {
            return Err(VoiceprintError::EmbeddingFailed(
                "embedding is not finite".into(),
            ));
        }
        Ok(())
    }

    fn check_vector(&self, v: &[f32]) -> Result<(), VoiceprintError> {
        self.check_finite(v)?;
        if v.iter().all(|&x| x == 0.0) {
            return Err(VoiceprintError::EmbeddingFailed("embedding is zero".into()));
        }
        Ok(())
    }

    fn check_tag(&self, id: &str, payload: &Payload) -> Result<(), VoiceprintError> {
        let found = payload.get(KEY_ENCODER).and_then(|v| v.as_str());
        if found == Some(self.encoder.as_str()) {
            return Ok(());
        }
        Err(VoiceprintError::EncoderMismatch {
            record: id.to_string(),
            expected: self.encoder.to_string(),
            found: found.unwrap_or("<untagged>").to_string(),
        })
    }

    fn record_name(id: &str, payload: &Payload) -> Result<String, VoiceprintError> {
        payload
            .get(KEY_NAME)
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| VoiceprintError::Index(format!("record {id} has no name")))
    }

    fn to_sample(&self, p: Point) -> Result<Sample, VoiceprintError> {
        self.check_tag(&p.id, &p.payload)?;
        let name = Self::record_name(&p.id, &p.payload)?;
        let ts = p.payload.get(KEY_TS).and_then(|v| v.as_u64()).unwrap_or(0);
        Ok(Sample {
            id: p.id,
            name,
            embedding: p.vector,
            created_at: millis_to_time(ts),
        })
    }

    fn to_centroid(&self, p: Point) -> Result<Centroid, VoiceprintError> {
        self.check_tag(&p.id, &p.payload)?;
        let name = Self::record_name(&p.id, &p.payload)?;
        let ts = p.payload.get(KEY_TS).and_then(|v| v.as_u64()).unwrap_or(0);
        let n = p.payload.get(KEY_COUNT).and_then(|v| v.as_u64()).unwrap_or(0);
        Ok(Centroid {
            id: p.id,
            name,
            embedding: p.vector,
            sample_count: n as usize,
            updated_at: millis_to_time(ts),
        })
    }

    /// Appends a raw sample for `name` under a fresh id. The embedding is
    /// stored L2-normalized.
    pub async fn add_sample(
        &self,
        name: &str,
        embedding: &[f32],
    ) -> Result<String, VoiceprintError> {
        self.check_vector(embedding)?;
        let mut vector = embedding.to_vec();
        if !l2_normalize(&mut vector) {
            return Err(VoiceprintError::EmbeddingFailed(
                "embedding cannot be normalized".into(),
            ));
        }
        let id = new_sample_id();
        self.raw
            .upsert(&[Point::new(id.clone(), vector, self.payload(name))])
            .await?;
        debug!(name, sample_id = %id, "voiceprint: sample added");
        Ok(id)
    }

    /// Writes the master record for `name`. Idempotent.
    ///
    /// A zero mean (samples that cancel out) is stored as is; it ranks
    /// below every other centroid.
    pub async fn upsert_centroid(
        &self,
        name: &str,
        embedding: &[f32],
        sample_count: usize,
    ) -> Result<(), VoiceprintError> {
        self.check_finite(embedding)?;
        let mut payload = self.payload(name);
        payload.insert(KEY_COUNT.into(), json!(sample_count));
        self.master
            .upsert(&[Point::new(centroid_id(name), embedding.to_vec(), payload)])
            .await?;
        debug!(name, sample_count, "voiceprint: centroid written");
        Ok(())
    }

    /// All raw samples of `name`, ordered by `(created_at, id)`.
    pub async fn samples(&self, name: &str) -> Result<Vec<Sample>, VoiceprintError> {
        self.collect_samples(&name_filter(name)).await
    }

    /// Every raw sample in the catalog, ordered by `(name, created_at, id)`.
    pub async fn all_samples(&self) -> Result<Vec<Sample>, VoiceprintError> {
        let mut samples = self.collect_samples(&Filter::All).await?;
        samples.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(samples)
    }

    async fn collect_samples(&self, filter: &Filter) -> Result<Vec<Sample>, VoiceprintError> {
        let mut samples = self
            .raw
            .scroll(filter)
            .await?
            .into_iter()
            .map(|p| self.to_sample(p))
            .collect::<Result<Vec<_>, _>>()?;
        samples.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
        Ok(samples)
    }

    /// Raw embeddings of `name` in the order of [`ProfileStore::samples`].
    pub async fn fetch_samples(&self, name: &str) -> Result<Vec<Vec<f32>>, VoiceprintError> {
        Ok(self
            .samples(name)
            .await?
            .into_iter()
            .map(|s| s.embedding)
            .collect())
    }

    pub async fn count_samples(&self, name: &str) -> Result<usize, VoiceprintError> {
        Ok(self.raw.count(&name_filter(name)).await?)
    }

    /// Names with a centroid.
    pub async fn list_speaker_names(&self) -> Result<BTreeSet<String>, VoiceprintError> {
        Self::names(self.master.as_ref()).await
    }

    /// Names with at least one raw sample.
    pub async fn raw_speaker_names(&self) -> Result<BTreeSet<String>, VoiceprintError> {
        Self::names(self.raw.as_ref()).await
    }

    async fn names(index: &dyn VecIndex) -> Result<BTreeSet<String>, VoiceprintError> {
        index
            .scroll(&Filter::All)
            .await?
            .iter()
            .map(|p| Self::record_name(&p.id, &p.payload))
            .collect()
    }

    pub async fn centroid(&self, name: &str) -> Result<Option<Centroid>, VoiceprintError> {
        let id = centroid_id(name);
        let point = self
            .master
            .scroll(&name_filter(name))
            .await?
            .into_iter()
            .find(|p| p.id == id);
        point.map(|p| self.to_centroid(p)).transpose()
    }

    /// Every centroid, ordered by name.
    pub async fn centroids(&self) -> Result<Vec<Centroid>, VoiceprintError> {
        let mut out = self
            .master
            .scroll(&Filter::All)
            .await?
            .into_iter()
            .map(|p| self.to_centroid(p))
            .collect::<Result<Vec<_>, _>>()?;
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    /// Removes the centroid of `name`. Returns whether one existed.
    pub async fn delete_centroid(&self, name: &str) -> Result<bool, VoiceprintError> {
        let existed = self.master.count(&name_filter(name)).await? > 0;
        if existed {
            self.master.delete(&[centroid_id(name)]).await?;
        }
        Ok(existed)
    }

    /// Removes the centroid and every raw sample of `name`. Returns the
    /// number of samples removed.
    ///
    /// The centroid is deleted before and after the samples. An enrollment
    /// that writes a centroid after the second delete sees no samples on its
    /// recount and drops it; samples added after the id sweep survive and get
    /// a centroid recomputed from them.
    pub async fn delete_speaker(&self, name: &str) -> Result<usize, VoiceprintError> {
        let had_centroid = self.delete_centroid(name).await?;
        let ids = self.raw.list_ids(&name_filter(name)).await?;
        if ids.is_empty() && !had_centroid {
            return Err(VoiceprintError::SpeakerNotFound(name.to_string()));
        }
        self.raw.delete(&ids).await?;
        self.delete_centroid(name).await?;
        if recompute(self, name).await?.is_some() {
            debug!(name, "voiceprint: samples enrolled during delete kept");
        }
        info!(name, samples = ids.len(), "voiceprint: speaker deleted");
        Ok(ids.len())
    }

    /// Clears both tiers, master before and after raw.
    pub async fn delete_all(&self) -> Result<(), VoiceprintError> {
        self.master.clear().await?;
        self.raw.clear().await?;
        self.master.clear().await?;
        for name in self.raw_speaker_names().await? {
            recompute(self, &name).await?;
        }
        info!("voiceprint: catalog cleared");
        Ok(())
    }

    /// Top-k centroids by cosine similarity to `query`, best first.
    pub async fn search_centroids(
        &self,
        query: &[f32],
        top_k: usize,
    ) -> Result<Vec<(String, f32)>, VoiceprintError> {
        self.check_vector(query)?;
        self.master
            .search(query, top_k)
            .await?
            .into_iter()
            .map(|m| {
                self.check_tag(&m.id, &m.payload)?;
                let name = Self::record_name(&m.id, &m.payload)?;
                Ok((name, m.similarity()))
            })
            .collect()
    }

    /// Checks that every record in both tiers carries the active encoder tag.
    pub async fn verify_catalog(&self) -> Result<(), VoiceprintError> {
        for index in [&self.master, &self.raw] {
            for p in index.scroll(&Filter::All).await? {
                self.check_tag(&p.id, &p.payload)?;
            }
        }
        Ok(())
    }
}
