//! Catalog export to JSON or YAML.

use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::Serialize;
use voxid_voiceprint::{Centroid, ProfileStore, Sample};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Tier {
    /// One centroid per speaker.
    Master,
    /// Every enrollment sample.
    Raw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Json,
    Yaml,
}

impl Format {
    /// Picks the format from the file extension, defaulting to JSON.
    pub fn for_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|e| e.to_str()).map(str::to_lowercase) {
            Some(ext) if ext == "yaml" || ext == "yml" => Ok(Format::Yaml),
            Some(ext) if ext == "json" => Ok(Format::Json),
            None => Ok(Format::Json),
            Some(ext) => bail!("cannot infer export format from .{ext}; pass --format"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Row {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<usize>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector: Option<Vec<f32>>,
}

impl Row {
    fn from_centroid(c: Centroid, vectors: bool) -> Self {
        Row {
            id: c.id,
            name: c.name,
            n: Some(c.sample_count),
            updated_at: c.updated_at,
            vector: vectors.then_some(c.embedding),
        }
    }

    fn from_sample(s: Sample, vectors: bool) -> Self {
        Row {
            id: s.id,
            name: s.name,
            n: None,
            updated_at: s.created_at,
            vector: vectors.then_some(s.embedding),
        }
    }
}

/// Reads up to `limit` records of `tier`, ordered by name.
pub async fn rows(
    store: &ProfileStore,
    tier: Tier,
    vectors: bool,
    limit: Option<usize>,
) -> Result<Vec<Row>> {
    let mut rows: Vec<Row> = match tier {
        Tier::Master => store
            .centroids()
            .await?
            .into_iter()
            .map(|c| Row::from_centroid(c, vectors))
            .collect(),
        Tier::Raw => store
            .all_samples()
            .await?
            .into_iter()
            .map(|s| Row::from_sample(s, vectors))
            .collect(),
    };
    if let Some(limit) = limit {
        rows.truncate(limit);
    }
    Ok(rows)
}

pub fn render(rows: &[Row], format: Format) -> Result<String> {
    Ok(match format {
        Format::Json => serde_json::to_string_pretty(rows)?,
        Format::Yaml => serde_yaml::to_string(rows)?,
    })
}

/// Writes `rows` to `path`, creating parent directories.
pub fn write(rows: &[Row], path: &Path, format: Format) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }
    std::fs::write(path, render(rows, format)?)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}
