//! Service settings.
//!
//! Loaded from `~/.voxid/config.yaml` (or `--config`), then overridden by
//! environment variables. Every section is optional.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use voxid_audio::ConditionerConfig;
use voxid_encoder::{EncoderConfig, EncoderKind};
use voxid_voiceprint::{IdentifyConfig, RebuildConfig};

/// Default base configuration directory name.
pub const DEFAULT_BASE_DIR: &str = ".voxid";
/// Default configuration filename.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerConfig,
    pub audio: ConditionerConfig,
    pub encoder: EncoderConfig,
    pub index: IndexConfig,
    pub identify: IdentifyConfig,
    pub rebuild: RebuildConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Largest accepted upload body.
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            max_upload_bytes: 25 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexBackend {
    /// Process memory; lost on exit.
    Memory,
    /// Local redb file.
    Redb,
    /// Qdrant over REST.
    Qdrant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub backend: IndexBackend,
    /// Redb file; defaults to `~/.voxid/voxid.redb`.
    pub path: Option<PathBuf>,
    /// Qdrant base URL.
    pub url: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub raw_collection: String,
    pub master_collection: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            backend: IndexBackend::Redb,
            path: None,
            url: "http://localhost:6333".to_string(),
            api_key: None,
            timeout_secs: 10,
            raw_collection: "speakers_raw".to_string(),
            master_collection: "speakers_master".to_string(),
        }
    }
}

impl IndexConfig {
    pub fn redb_path(&self) -> Result<PathBuf> {
        match &self.path {
            Some(p) => Ok(p.clone()),
            None => default_dir()
                .map(|d| d.join("voxid.redb"))
                .context("cannot determine home directory; set index.path"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Filter used when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

pub fn default_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(DEFAULT_BASE_DIR))
}

pub fn default_path() -> Option<PathBuf> {
    default_dir().map(|dir| dir.join(DEFAULT_CONFIG_FILE))
}

impl Settings {
    /// Loads settings from `path`, or from the default path if it exists,
    /// then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(p) => Self::from_file(p)?,
            None => match default_path() {
                Some(p) if p.exists() => Self::from_file(&p)?,
                _ => Self::default(),
            },
        };
        settings.apply_env(|key| std::env::var(key).ok())?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_yaml(&data).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn from_yaml(data: &str) -> Result<Self> {
        if data.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(data)?)
    }

    /// Applies the deployment environment variables found through `var`.
    pub fn apply_env<F>(&mut self, var: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = var("APP_HOST") {
            self.server.host = v;
        }
        if let Some(v) = var("APP_PORT") {
            self.server.port = parse("APP_PORT", &v)?;
        }
        if let Some(v) = var("QDRANT_URL") {
            self.index.backend = IndexBackend::Qdrant;
            self.index.url = v;
        }
        if let Some(v) = var("SAMPLE_RATE") {
            self.audio.target_sample_rate = parse("SAMPLE_RATE", &v)?;
        }
        if let Some(v) = var("FORCE_MONO") {
            self.audio.force_mono = parse_bool("FORCE_MONO", &v)?;
        }
        if let Some(v) = var("ACCEPT_STEREO") {
            self.audio.accept_stereo = parse_bool("ACCEPT_STEREO", &v)?;
        }
        if let Some(v) = var("AUDIO_ENHANCEMENT") {
            self.audio.enhance = parse_bool("AUDIO_ENHANCEMENT", &v)?;
        }
        if let Some(v) = var("MIN_AUDIO_DURATION") {
            self.audio.min_duration_secs = parse("MIN_AUDIO_DURATION", &v)?;
        }
        if let Some(v) = var("DEFAULT_THRESHOLD") {
            self.identify.threshold = parse("DEFAULT_THRESHOLD", &v)?;
        }
        if let Some(v) = var("TOPK") {
            self.identify.top_k = parse("TOPK", &v)?;
        }
        if let Some(v) = var("SCORE_CALIBRATION") {
            self.identify.calibration.enabled = parse_bool("SCORE_CALIBRATION", &v)?;
        }
        if let Some(v) = var("USE_ECAPA") {
            self.encoder.kind = if parse_bool("USE_ECAPA", &v)? {
                EncoderKind::Ecapa
            } else {
                EncoderKind::Resemblyzer
            };
        }
        if let Some(v) = var("LOG_LEVEL") {
            self.log.level = v.to_lowercase();
        }
        Ok(())
    }
}

fn parse<T>(key: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| anyhow::anyhow!("{key}={value:?}: {e}"))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => bail!("{key}={value:?}: expected a boolean"),
    }
}
