//! HTTP API.
//!
//! Endpoints:
//! - POST /api/enroll?name=          - enroll one utterance (raw audio body)
//! - POST /api/identify?threshold=&topk= - identify one utterance
//! - GET  /api/profiles              - enrolled names
//! - POST /api/reset?name=&all=      - delete one speaker or everything
//! - POST /api/rebuild_centroids     - recompute every centroid
//! - GET  /api/config                - runtime settings
//! - POST /api/config?threshold=     - change the default threshold
//! - GET  /health                    - liveness

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, warn};
use voxid_voiceprint::{ErrorKind, Identification, VoiceprintError, VoiceprintService};

use crate::config::ServerConfig;

#[derive(Clone)]
struct AppState {
    service: Arc<VoiceprintService>,
}

pub fn router(service: Arc<VoiceprintService>, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/api/enroll", post(enroll))
        .route("/api/identify", post(identify))
        .route("/api/profiles", get(profiles))
        .route("/api/reset", post(reset))
        .route("/api/rebuild_centroids", post(rebuild))
        .route("/api/config", get(get_config).post(set_config))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(AppState { service })
}

/// Serves until Ctrl-C.
pub async fn serve(cfg: &ServerConfig, service: Arc<VoiceprintService>) -> Result<()> {
    let addr = format!("{}:{}", cfg.host, cfg.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(addr = %addr, encoder = %service.encoder_id(), "voxid: listening");

    axum::serve(listener, router(service, cfg.max_upload_bytes))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("voxid: stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "voxid: cannot listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("voxid: shutting down");
}

/// A [`VoiceprintError`] rendered as a JSON error response.
struct ApiError(VoiceprintError);

impl From<VoiceprintError> for ApiError {
    fn from(e: VoiceprintError) -> Self {
        ApiError(e)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self.0.kind() {
            ErrorKind::Input => match self.0 {
                VoiceprintError::Audio(_) | VoiceprintError::EmbeddingFailed(_) => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                _ => StatusCode::BAD_REQUEST,
            },
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self.0, "voxid: request failed");
        } else {
            warn!(error = %self.0, "voxid: request rejected");
        }
        let body = json!({
            "ok": false,
            "error": self.0.to_string(),
            "transient": self.0.is_transient(),
        });
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Deserialize)]
struct EnrollParams {
    name: Option<String>,
}

async fn enroll(
    State(state): State<AppState>,
    Query(params): Query<EnrollParams>,
    body: Bytes,
) -> ApiResult<Json<serde_json::Value>> {
    let name = params
        .name
        .ok_or_else(|| VoiceprintError::InvalidName("missing name".into()))?;
    let e = state.service.enroll_audio(&name, body.to_vec()).await?;
    Ok(Json(json!({
        "ok": true,
        "name": e.name,
        "sample_count": e.sample_count,
    })))
}

#[derive(Deserialize)]
struct IdentifyParams {
    threshold: Option<f32>,
    topk: Option<usize>,
}

async fn identify(
    State(state): State<AppState>,
    Query(params): Query<IdentifyParams>,
    body: Bytes,
) -> ApiResult<Json<Identification>> {
    let id = state
        .service
        .identify_audio(body.to_vec(), params.threshold, params.topk)
        .await?;
    Ok(Json(id))
}

async fn profiles(State(state): State<AppState>) -> ApiResult<Json<serde_json::Value>> {
    let names = state.service.profiles().await?;
    Ok(Json(json!({ "profiles": names })))
}

#[derive(Deserialize)]
struct ResetParams {
    name: Option<String>,
    #[serde(default)]
    all: bool,
}

async fn reset(
    State(state): State<AppState>,
    Query(params): Query<ResetParams>,
) -> ApiResult<Json<serde_json::Value>> {
    if params.all {
        state.service.reset_all().await?;
        return Ok(Json(json!({ "ok": true })));
    }
    match params.name {
        Some(name) => {
            let removed = state.service.reset(&name).await?;
            Ok(Json(json!({ "ok": true, "removed_samples": removed })))
        }
        None => Ok(Json(json!({ "ok": true }))),
    }
}

async fn rebuild(State(state): State<AppState>) -> ApiResult<Json<serde_json::Value>> {
    let report = state.service.rebuild().await?;
    Ok(Json(json!({
        "ok": report.failures.is_empty(),
        "updated": report.updated,
        "removed_orphans": report.removed_orphans,
        "failures": report.failures,
    })))
}

async fn get_config(State(state): State<AppState>) -> Json<serde_json::Value> {
    let runtime = state.service.runtime();
    Json(json!({
        "threshold": runtime.threshold,
        "topk": runtime.top_k,
        "encoder": state.service.encoder_id(),
        "calibration": state.service.calibration_enabled(),
    }))
}

#[derive(Deserialize)]
struct ConfigParams {
    threshold: f32,
}

async fn set_config(
    State(state): State<AppState>,
    Query(params): Query<ConfigParams>,
) -> ApiResult<Json<serde_json::Value>> {
    let threshold = state.service.set_threshold(params.threshold)?;
    info!(threshold, "voxid: default threshold updated");
    Ok(Json(json!({ "ok": true, "threshold": threshold })))
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use serde_json::Value;
    use voxid_audio::AudioConditioner;
    use voxid_encoder::{Encoder, FbankEncoder};
    use voxid_vecstore::MemoryIndex;
    use voxid_voiceprint::{IdentifyConfig, ProfileStore, RebuildConfig};

    use super::*;

    fn voice(f0: f32, secs: f32) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut buf = Cursor::new(Vec::new());
        {
            let mut w = hound::WavWriter::new(&mut buf, spec).unwrap();
            for i in 0..(secs * 16_000.0) as usize {
                let t = i as f32 / 16_000.0;
                let x: f32 = (1..=6)
                    .map(|h| (2.0 * std::f32::consts::PI * f0 * h as f32 * t).sin() / h as f32)
                    .sum();
                w.write_sample((x * 0.3 * i16::MAX as f32) as i16).unwrap();
            }
            w.finalize().unwrap();
        }
        buf.into_inner()
    }

    async fn spawn() -> String {
        let encoder: Arc<dyn Encoder> = Arc::new(FbankEncoder::new(40).unwrap());
        let dim = encoder.dimension();
        let store = ProfileStore::new(
            Arc::new(MemoryIndex::new(dim)),
            Arc::new(MemoryIndex::new(dim)),
            encoder.id(),
            dim,
        )
        .unwrap();
        let service = VoiceprintService::new(
            AudioConditioner::default(),
            encoder,
            Arc::new(store),
            &IdentifyConfig::default(),
            &RebuildConfig::default(),
        )
        .unwrap();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(Arc::new(service), 1024 * 1024))
                .await
                .unwrap();
        });
        format!("http://{addr}")
    }

    async fn get_json(http: &reqwest::Client, url: String) -> Value {
        http.get(url).send().await.unwrap().json().await.unwrap()
    }

    #[tokio::test]
    async fn enroll_identify_reset() {
        let base = spawn().await;
        let http = reqwest::Client::new();

        let health = get_json(&http, format!("{base}/health")).await;
        assert_eq!(health, json!({"status": "ok"}));

        let r = http
            .post(format!("{base}/api/identify?threshold=0.8"))
            .body(voice(130.0, 2.0))
            .send()
            .await
            .unwrap();
        assert_eq!(r.status(), 200);
        let body: Value = r.json().await.unwrap();
        assert_eq!(body["speaker"], "unknown");
        assert_eq!(body["confidence"], 0.0);

        let r = http
            .post(format!("{base}/api/enroll?name=Henrik"))
            .body(voice(130.0, 2.0))
            .send()
            .await
            .unwrap();
        assert_eq!(r.status(), 200);
        let body: Value = r.json().await.unwrap();
        assert_eq!(body, json!({"ok": true, "name": "Henrik", "sample_count": 1}));

        let r = http
            .post(format!("{base}/api/identify?threshold=0.5&topk=3"))
            .body(voice(130.0, 2.0))
            .send()
            .await
            .unwrap();
        let body: Value = r.json().await.unwrap();
        assert_eq!(body["speaker"], "Henrik");
        assert_eq!(body["candidates"][0]["name"], "Henrik");

        let body = get_json(&http, format!("{base}/api/profiles")).await;
        assert_eq!(body, json!({"profiles": ["Henrik"]}));

        let r = http.post(format!("{base}/api/reset?name=Henrik")).send().await.unwrap();
        assert_eq!(r.status(), 200);
        let r = http.post(format!("{base}/api/reset?name=Henrik")).send().await.unwrap();
        assert_eq!(r.status(), 404);
        let body = get_json(&http, format!("{base}/api/profiles")).await;
        assert_eq!(body, json!({"profiles": []}));
    }

    #[tokio::test]
    async fn input_errors_map_to_status() {
        let base = spawn().await;
        let http = reqwest::Client::new();

        let r = http
            .post(format!("{base}/api/enroll?name=x"))
            .body(voice(130.0, 0.3))
            .send()
            .await
            .unwrap();
        assert_eq!(r.status(), 422);
        let body: Value = r.json().await.unwrap();
        assert_eq!(body["ok"], false);
        assert!(body["error"].as_str().unwrap().contains("too short"));

        let r = http
            .post(format!("{base}/api/enroll"))
            .body(voice(130.0, 2.0))
            .send()
            .await
            .unwrap();
        assert_eq!(r.status(), 400);

        let r = http
            .post(format!("{base}/api/identify?topk=0"))
            .body(voice(130.0, 2.0))
            .send()
            .await
            .unwrap();
        assert_eq!(r.status(), 400);
    }

    #[tokio::test]
    async fn runtime_config() {
        let base = spawn().await;
        let http = reqwest::Client::new();

        let body = get_json(&http, format!("{base}/api/config")).await;
        assert_eq!(body["topk"], 5);
        assert_eq!(body["encoder"], "fbank-80");
        assert_eq!(body["calibration"], true);

        let body: Value = http
            .post(format!("{base}/api/config?threshold=1.4"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body, json!({"ok": true, "threshold": 1.0}));

        let body: Value = http
            .post(format!("{base}/api/rebuild_centroids"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["ok"], true);
        assert_eq!(body["updated"], 0);
    }
}
