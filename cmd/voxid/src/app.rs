//! Builds the service from settings.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use voxid_audio::AudioConditioner;
use voxid_encoder::Encoder;
use voxid_vecstore::{MemoryIndex, QdrantConfig, QdrantIndex, RedbIndex, VecIndex};
use voxid_voiceprint::{ProfileStore, VoiceprintService};

use crate::config::{IndexBackend, IndexConfig, Settings};

/// Opens the raw and master collections.
pub async fn open_indexes(
    cfg: &IndexConfig,
    dim: usize,
) -> Result<(Arc<dyn VecIndex>, Arc<dyn VecIndex>)> {
    match cfg.backend {
        IndexBackend::Memory => Ok((
            Arc::new(MemoryIndex::new(dim)),
            Arc::new(MemoryIndex::new(dim)),
        )),
        IndexBackend::Redb => {
            let path = cfg.redb_path()?;
            if let Some(dir) = path.parent() {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("failed to create {}", dir.display()))?;
            }
            let raw = RedbIndex::open(&path, &cfg.raw_collection, dim)
                .with_context(|| format!("failed to open {}", path.display()))?;
            let master = raw.sibling(&cfg.master_collection)?;
            info!(path = %path.display(), "voxid: using redb index");
            Ok((Arc::new(raw), Arc::new(master)))
        }
        IndexBackend::Qdrant => {
            let collection = |name: &str| QdrantConfig {
                url: cfg.url.clone(),
                collection: name.to_string(),
                api_key: cfg.api_key.clone(),
                timeout_secs: cfg.timeout_secs,
            };
            let raw = QdrantIndex::connect(collection(&cfg.raw_collection), dim)
                .await
                .with_context(|| format!("failed to connect to qdrant at {}", cfg.url))?;
            let master = QdrantIndex::connect(collection(&cfg.master_collection), dim).await?;
            info!(url = %cfg.url, "voxid: using qdrant index");
            Ok((Arc::new(raw), Arc::new(master)))
        }
    }
}

/// Wires encoder, index and core components, and checks that the catalog
/// was written by the configured encoder.
pub async fn build_service(settings: &Settings) -> Result<Arc<VoiceprintService>> {
    let encoder: Arc<dyn Encoder> = voxid_encoder::build(&settings.encoder)?;
    let dim = encoder.dimension();
    let (raw, master) = open_indexes(&settings.index, dim).await?;
    let store = Arc::new(ProfileStore::new(raw, master, encoder.id(), dim)?);

    let service = VoiceprintService::new(
        AudioConditioner::new(settings.audio.clone()),
        encoder,
        store,
        &settings.identify,
        &settings.rebuild,
    )?;
    service
        .verify_catalog()
        .await
        .context(
            "stored profiles do not match the configured encoder; re-enroll or switch encoder",
        )?;
    Ok(Arc::new(service))
}
