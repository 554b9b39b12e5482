use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::VecError;

/// Free-form metadata stored alongside a vector.
pub type Payload = serde_json::Map<String, Value>;

/// A stored vector with its identifier and payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub id: String,
    pub vector: Vec<f32>,
    #[serde(default)]
    pub payload: Payload,
}

impl Point {
    pub fn new(id: impl Into<String>, vector: Vec<f32>, payload: Payload) -> Self {
        Self {
            id: id.into(),
            vector,
            payload,
        }
    }
}

/// Match is a single result from a vector similarity search.
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    /// Identifier of the matched vector.
    pub id: String,

    /// Cosine distance between the query and matched vector.
    /// Lower values indicate higher similarity.
    pub distance: f32,

    pub payload: Payload,
}

impl Match {
    /// Cosine similarity, `1 - distance`.
    pub fn similarity(&self) -> f32 {
        1.0 - self.distance
    }
}

/// Payload predicate used by [`VecIndex::scroll`].
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    All,
    /// Payload field `key` equals `value`.
    Eq { key: String, value: Value },
}

impl Filter {
    pub fn eq(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Eq {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn matches(&self, payload: &Payload) -> bool {
        match self {
            Filter::All => true,
            Filter::Eq { key, value } => payload.get(key) == Some(value),
        }
    }
}

/// VecIndex is one collection of dense float32 vectors with cosine search.
///
/// All implementations must be safe for concurrent use (Send + Sync). Every
/// vector written or queried must have exactly [`VecIndex::dimension`]
/// components.
#[async_trait]
pub trait VecIndex: Send + Sync {
    /// Vector dimension of this collection.
    fn dimension(&self) -> usize;

    /// Add or replace points by id.
    async fn upsert(&self, points: &[Point]) -> Result<(), VecError>;

    /// Return the top-k nearest points to the query, ordered by ascending
    /// distance (closest first). Equal distances keep the index's own order.
    async fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<Match>, VecError>;

    /// Remove points by id. Missing ids are ignored.
    async fn delete(&self, ids: &[String]) -> Result<(), VecError>;

    /// Return every point whose payload matches `filter`.
    async fn scroll(&self, filter: &Filter) -> Result<Vec<Point>, VecError>;

    /// Return the ids of every point whose payload matches `filter`.
    async fn list_ids(&self, filter: &Filter) -> Result<Vec<String>, VecError> {
        Ok(self.scroll(filter).await?.into_iter().map(|p| p.id).collect())
    }

    /// Count the points whose payload matches `filter`.
    async fn count(&self, filter: &Filter) -> Result<usize, VecError> {
        Ok(self.scroll(filter).await?.len())
    }

    /// Remove every point in the collection.
    async fn clear(&self) -> Result<(), VecError>;
}

pub(crate) fn check_dimension(want: usize, got: usize) -> Result<(), VecError> {
    if want != got {
        return Err(VecError::DimensionMismatch { got, want });
    }
    Ok(())
}
