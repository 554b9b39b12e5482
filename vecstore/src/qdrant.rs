//! Qdrant REST backend.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::error::VecError;
use crate::vecstore::{Filter, Match, Payload, Point, VecIndex, check_dimension};

const SCROLL_PAGE: usize = 256;

/// Connection settings for one Qdrant collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QdrantConfig {
    /// Base URL, e.g. `http://localhost:6333`.
    pub url: String,
    pub collection: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    10
}

impl QdrantConfig {
    pub fn new(url: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            collection: collection.into(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// A Qdrant collection using cosine distance.
///
/// The collection is created on [`QdrantIndex::connect`] if it does not exist.
/// Qdrant normalizes vectors stored in cosine collections, so callers that
/// need stored vectors back verbatim should write unit vectors.
pub struct QdrantIndex {
    client: Client,
    base: String,
    collection: String,
    api_key: Option<String>,
    dim: usize,
}

#[derive(Deserialize)]
struct Envelope<T> {
    result: T,
}

#[derive(Deserialize)]
struct ScoredPoint {
    id: Value,
    score: f32,
    #[serde(default)]
    payload: Option<Payload>,
}

#[derive(Deserialize)]
struct RecordPoint {
    id: Value,
    #[serde(default)]
    vector: Option<Vec<f32>>,
    #[serde(default)]
    payload: Option<Payload>,
}

#[derive(Deserialize)]
struct ScrollPage {
    points: Vec<RecordPoint>,
    #[serde(default)]
    next_page_offset: Option<Value>,
}

#[derive(Deserialize)]
struct CountResult {
    count: usize,
}

impl QdrantIndex {
    /// Connect to the collection, creating it with `dim`-sized cosine vectors
    /// when missing.
    pub async fn connect(cfg: QdrantConfig, dim: usize) -> Result<Self, VecError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs.max(1)))
            .build()
            .map_err(|e| VecError::Unavailable(e.to_string()))?;
        let index = Self {
            client,
            base: cfg.url.trim_end_matches('/').to_string(),
            collection: cfg.collection,
            api_key: cfg.api_key,
            dim,
        };
        index.ensure_collection().await?;
        Ok(index)
    }

    fn collection_url(&self) -> String {
        format!("{}/collections/{}", self.base, self.collection)
    }

    fn with_auth(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => req.header("api-key", key),
            None => req,
        }
    }

    async fn send(&self, req: RequestBuilder) -> Result<Response, VecError> {
        self.with_auth(req)
            .send()
            .await
            .map_err(|e| VecError::Unavailable(e.to_string()))
    }

    async fn expect_ok(resp: Response) -> Result<Response, VecError> {
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(VecError::Backend { status, body });
        }
        Ok(resp)
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        req: RequestBuilder,
    ) -> Result<T, VecError> {
        let resp = Self::expect_ok(self.send(req).await?).await?;
        let env: Envelope<T> = resp
            .json()
            .await
            .map_err(|e| VecError::Serialization(e.to_string()))?;
        Ok(env.result)
    }

    async fn ensure_collection(&self) -> Result<(), VecError> {
        let resp = self.send(self.client.get(self.collection_url())).await?;
        if resp.status() == StatusCode::NOT_FOUND {
            self.create_collection().await
        } else {
            Self::expect_ok(resp).await.map(|_| ())
        }
    }

    async fn create_collection(&self) -> Result<(), VecError> {
        let body = json!({ "vectors": { "size": self.dim, "distance": "Cosine" } });
        let resp = self
            .send(self.client.put(self.collection_url()).json(&body))
            .await?;
        Self::expect_ok(resp).await?;
        info!(collection = %self.collection, dim = self.dim, "vecstore: created qdrant collection");
        Ok(())
    }
}

fn filter_json(filter: &Filter) -> Option<Value> {
    match filter {
        Filter::All => None,
        Filter::Eq { key, value } => Some(json!({
            "must": [{ "key": key, "match": { "value": value } }]
        })),
    }
}

fn id_string(id: Value) -> String {
    match id {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

#[async_trait]
impl VecIndex for QdrantIndex {
    fn dimension(&self) -> usize {
        self.dim
    }

    async fn upsert(&self, points: &[Point]) -> Result<(), VecError> {
        if points.is_empty() {
            return Ok(());
        }
        let mut body = Vec::with_capacity(points.len());
        for p in points {
            check_dimension(self.dim, p.vector.len())?;
            body.push(json!({ "id": p.id, "vector": p.vector, "payload": p.payload }));
        }
        let url = format!("{}/points?wait=true", self.collection_url());
        let _: Value = self
            .call(self.client.put(url).json(&json!({ "points": body })))
            .await?;
        debug!(collection = %self.collection, count = points.len(), "vecstore: qdrant upsert");
        Ok(())
    }

    async fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<Match>, VecError> {
        check_dimension(self.dim, query.len())?;
        if top_k == 0 {
            return Ok(Vec::new());
        }
        let url = format!("{}/points/search", self.collection_url());
        let body = json!({ "vector": query, "limit": top_k, "with_payload": true });
        let hits: Vec<ScoredPoint> = self.call(self.client.post(url).json(&body)).await?;
        Ok(hits
            .into_iter()
            .map(|h| Match {
                id: id_string(h.id),
                distance: 1.0 - h.score,
                payload: h.payload.unwrap_or_default(),
            })
            .collect())
    }

    async fn delete(&self, ids: &[String]) -> Result<(), VecError> {
        if ids.is_empty() {
            return Ok(());
        }
        let url = format!("{}/points/delete?wait=true", self.collection_url());
        let _: Value = self
            .call(self.client.post(url).json(&json!({ "points": ids })))
            .await?;
        Ok(())
    }

    async fn scroll(&self, filter: &Filter) -> Result<Vec<Point>, VecError> {
        let url = format!("{}/points/scroll", self.collection_url());
        let mut out = Vec::new();
        let mut offset: Option<Value> = None;
        loop {
            let mut body = json!({
                "limit": SCROLL_PAGE,
                "with_payload": true,
                "with_vector": true,
            });
            if let Some(f) = filter_json(filter) {
                body["filter"] = f;
            }
            if let Some(o) = offset.take() {
                body["offset"] = o;
            }
            let page: ScrollPage = self.call(self.client.post(&url).json(&body)).await?;
            out.extend(page.points.into_iter().map(|r| Point {
                id: id_string(r.id),
                vector: r.vector.unwrap_or_default(),
                payload: r.payload.unwrap_or_default(),
            }));
            match page.next_page_offset {
                Some(next) if !next.is_null() => offset = Some(next),
                _ => break,
            }
        }
        Ok(out)
    }

    async fn count(&self, filter: &Filter) -> Result<usize, VecError> {
        let url = format!("{}/points/count", self.collection_url());
        let mut body = json!({ "exact": true });
        if let Some(f) = filter_json(filter) {
            body["filter"] = f;
        }
        let res: CountResult = self.call(self.client.post(url).json(&body)).await?;
        Ok(res.count)
    }

    async fn clear(&self) -> Result<(), VecError> {
        let resp = self.send(self.client.delete(self.collection_url())).await?;
        if resp.status() != StatusCode::NOT_FOUND {
            Self::expect_ok(resp).await?;
        }
        self.create_collection().await
    }
}
