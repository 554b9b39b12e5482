use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::cosine::cosine_distance;
use crate::error::VecError;
use crate::vecstore::{Filter, Match, Point, VecIndex, check_dimension};

/// MemoryIndex is an in-memory VecIndex using brute-force cosine distance.
///
/// Points are kept ordered by id, so scroll order and tie order in search
/// results are stable. Intended for testing and small-scale use.
pub struct MemoryIndex {
    dim: usize,
    points: RwLock<BTreeMap<String, Point>>,
}

impl MemoryIndex {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            points: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.points.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Ranks `points` by cosine distance to `query`. The sort is stable, so equal
/// distances keep iteration order.
pub(crate) fn rank<'a>(
    points: impl Iterator<Item = &'a Point>,
    query: &[f32],
    top_k: usize,
) -> Vec<Match> {
    if top_k == 0 {
        return Vec::new();
    }
    let mut scored: Vec<(f32, &Point)> = points
        .map(|p| (cosine_distance(query, &p.vector), p))
        .collect();
    scored.sort_by(|a, b| a.0.total_cmp(&b.0));
    scored.truncate(top_k);
    scored
        .into_iter()
        .map(|(distance, p)| Match {
            id: p.id.clone(),
            distance,
            payload: p.payload.clone(),
        })
        .collect()
}

#[async_trait]
impl VecIndex for MemoryIndex {
    fn dimension(&self) -> usize {
        self.dim
    }

    async fn upsert(&self, points: &[Point]) -> Result<(), VecError> {
        for p in points {
            check_dimension(self.dim, p.vector.len())?;
        }
        let mut map = self.points.write();
        for p in points {
            map.insert(p.id.clone(), p.clone());
        }
        Ok(())
    }

    async fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<Match>, VecError> {
        check_dimension(self.dim, query.len())?;
        let map = self.points.read();
        Ok(rank(map.values(), query, top_k))
    }

    async fn delete(&self, ids: &[String]) -> Result<(), VecError> {
        let mut map = self.points.write();
        for id in ids {
            map.remove(id);
        }
        Ok(())
    }

    async fn scroll(&self, filter: &Filter) -> Result<Vec<Point>, VecError> {
        let map = self.points.read();
        Ok(map
            .values()
            .filter(|p| filter.matches(&p.payload))
            .cloned()
            .collect())
    }

    async fn count(&self, filter: &Filter) -> Result<usize, VecError> {
        let map = self.points.read();
        Ok(map.values().filter(|p| filter.matches(&p.payload)).count())
    }

    async fn clear(&self) -> Result<(), VecError> {
        self.points.write().clear();
        Ok(())
    }
}
