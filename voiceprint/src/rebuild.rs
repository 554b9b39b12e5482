use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::centroid::recompute;
use crate::error::VoiceprintError;
use crate::profile::ProfileStore;

/// Rebuild settings, deserialized from the `rebuild` config section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RebuildConfig {
    /// Speakers recomputed at once (default: 4).
    pub concurrency: usize,
}

impl Default for RebuildConfig {
    fn default() -> Self {
        Self { concurrency: 4 }
    }
}

/// A speaker whose centroid could not be rebuilt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RebuildFailure {
    pub name: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RebuildReport {
    /// Speakers whose centroid was recomputed and written.
    pub updated: usize,
    /// Centroids deleted because their speaker has no samples left.
    pub removed_orphans: usize,
    /// Per-speaker failures, ordered by name.
    pub failures: Vec<RebuildFailure>,
}

/// Recomputes every centroid from the full raw history.
pub struct RebuildService {
    store: Arc<ProfileStore>,
    concurrency: usize,
}

impl RebuildService {
    pub fn new(store: Arc<ProfileStore>, cfg: &RebuildConfig) -> Self {
        Self {
            store,
            concurrency: cfg.concurrency.max(1),
        }
    }

    /// Rebuilds all centroids. Only listing the catalog can fail the whole
    /// call; per-speaker errors land in [`RebuildReport::failures`].
    pub async fn rebuild(&self) -> Result<RebuildReport, VoiceprintError> {
        let raw_names = self.store.raw_speaker_names().await?;
        let master_names = self.store.list_speaker_names().await?;

        let store = &self.store;
        let results: Vec<(String, Result<Option<usize>, VoiceprintError>)> =
            stream::iter(raw_names.iter().cloned())
                .map(|name| async move {
                    let r = recompute(store, &name).await;
                    (name, r)
                })
                .buffer_unordered(self.concurrency)
                .collect()
                .await;

        let mut report = RebuildReport::default();
        for (name, result) in results {
            match result {
                Ok(Some(_)) => report.updated += 1,
                Ok(None) => {}
                Err(e) => {
                    warn!(name = %name, error = %e, "voiceprint: rebuild failed for speaker");
                    report.failures.push(RebuildFailure {
                        name,
                        error: e.to_string(),
                    });
                }
            }
        }

        for name in master_names.difference(&raw_names) {
            match self.remove_orphan(name).await {
                Ok(true) => report.removed_orphans += 1,
                Ok(false) => {}
                Err(e) => report.failures.push(RebuildFailure {
                    name: name.clone(),
                    error: e.to_string(),
                }),
            }
        }
        report.failures.sort_by(|a, b| a.name.cmp(&b.name));

        info!(
            updated = report.updated,
            removed_orphans = report.removed_orphans,
            failed = report.failures.len(),
            "voiceprint: rebuild finished"
        );
        Ok(report)
    }

    /// Deletes the centroid of `name` unless samples appeared since the
    /// catalog was listed.
    async fn remove_orphan(&self, name: &str) -> Result<bool, VoiceprintError> {
        if self.store.count_samples(name).await? > 0 {
            return Ok(false);
        }
        warn!(name, "voiceprint: removing orphaned centroid");
        self.store.delete_centroid(name).await
    }
}
