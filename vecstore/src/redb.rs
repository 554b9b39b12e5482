//! Redb-backed persistent vector index.

use std::path::Path;
use std::sync::Arc;

use ::redb::{Database, ReadableTable, ReadableTableMetadata, TableDefinition};
use async_trait::async_trait;
use tracing::debug;

use crate::error::VecError;
use crate::memory::rank;
use crate::vecstore::{Filter, Match, Point, VecIndex, check_dimension};

/// A persistent collection stored as one redb table.
///
/// Points are msgpack-encoded under their id. Several collections can share
/// one database file through [`RedbIndex::with_database`]. Search is
/// brute force over the whole table.
pub struct RedbIndex {
    db: Arc<Database>,
    table: String,
    dim: usize,
}

impl RedbIndex {
    /// Open or create a database at `path` holding the collection `table`.
    pub fn open<P: AsRef<Path>>(path: P, table: &str, dim: usize) -> Result<Self, VecError> {
        let db = Database::create(path).map_err(VecError::storage)?;
        Self::with_database(Arc::new(db), table, dim)
    }

    /// Use an already opened database for the collection `table`.
    pub fn with_database(db: Arc<Database>, table: &str, dim: usize) -> Result<Self, VecError> {
        let index = Self {
            db,
            table: table.to_string(),
            dim,
        };
        index.create_table()?;
        Ok(index)
    }

    /// Another collection of the same dimension in this database file.
    pub fn sibling(&self, table: &str) -> Result<Self, VecError> {
        Self::with_database(self.db.clone(), table, self.dim)
    }

    fn def(&self) -> TableDefinition<'_, &'static str, &'static [u8]> {
        TableDefinition::new(&self.table)
    }

    fn create_table(&self) -> Result<(), VecError> {
        let tx = self.db.begin_write().map_err(VecError::storage)?;
        {
            let _ = tx.open_table(self.def()).map_err(VecError::storage)?;
        }
        tx.commit().map_err(VecError::storage)?;
        Ok(())
    }

    fn read_all(&self) -> Result<Vec<Point>, VecError> {
        let tx = self.db.begin_read().map_err(VecError::storage)?;
        let table = tx.open_table(self.def()).map_err(VecError::storage)?;

        let mut points = Vec::with_capacity(table.len().map_err(VecError::storage)? as usize);
        for item in table.iter().map_err(VecError::storage)? {
            let (_, value) = item.map_err(VecError::storage)?;
            let point: Point = rmp_serde::from_slice(value.value())
                .map_err(|e| VecError::Serialization(e.to_string()))?;
            points.push(point);
        }
        Ok(points)
    }
}

#[async_trait]
impl VecIndex for RedbIndex {
    fn dimension(&self) -> usize {
        self.dim
    }

    async fn upsert(&self, points: &[Point]) -> Result<(), VecError> {
        let mut encoded = Vec::with_capacity(points.len());
        for p in points {
            check_dimension(self.dim, p.vector.len())?;
            let bytes =
                rmp_serde::to_vec_named(p).map_err(|e| VecError::Serialization(e.to_string()))?;
            encoded.push((p.id.as_str(), bytes));
        }

        let tx = self.db.begin_write().map_err(VecError::storage)?;
        {
            let mut table = tx.open_table(self.def()).map_err(VecError::storage)?;
            for (id, bytes) in &encoded {
                table
                    .insert(*id, bytes.as_slice())
                    .map_err(VecError::storage)?;
            }
        }
        tx.commit().map_err(VecError::storage)?;
        debug!(table = %self.table, count = points.len(), "vecstore: redb upsert");
        Ok(())
    }

    async fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<Match>, VecError> {
        check_dimension(self.dim, query.len())?;
        let points = self.read_all()?;
        Ok(rank(points.iter(), query, top_k))
    }

    async fn delete(&self, ids: &[String]) -> Result<(), VecError> {
        let tx = self.db.begin_write().map_err(VecError::storage)?;
        {
            let mut table = tx.open_table(self.def()).map_err(VecError::storage)?;
            for id in ids {
                table.remove(id.as_str()).map_err(VecError::storage)?;
            }
        }
        tx.commit().map_err(VecError::storage)?;
        Ok(())
    }

    async fn scroll(&self, filter: &Filter) -> Result<Vec<Point>, VecError> {
        let mut points = self.read_all()?;
        points.retain(|p| filter.matches(&p.payload));
        Ok(points)
    }

    async fn clear(&self) -> Result<(), VecError> {
        let tx = self.db.begin_write().map_err(VecError::storage)?;
        tx.delete_table(self.def()).map_err(VecError::storage)?;
        {
            let _ = tx.open_table(self.def()).map_err(VecError::storage)?;
        }
        tx.commit().map_err(VecError::storage)?;
        debug!(table = %self.table, "vecstore: redb cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vecstore::Payload;
    use serde_json::json;

    fn point(id: &str, v: &[f32], name: &str) -> Point {
        let mut payload = Payload::new();
        payload.insert("name".into(), json!(name));
        payload.insert("ts".into(), json!(1_700_000_000_000u64));
        Point::new(id, v.to_vec(), payload)
    }

    #[tokio::test]
    async fn test_roundtrip_and_search() {
        let dir = tempfile::tempdir().unwrap();
        let idx = RedbIndex::open(dir.path().join("v.redb"), "raw", 3).unwrap();
        idx.upsert(&[
            point("a", &[1.0, 0.0, 0.0], "alice"),
            point("b", &[0.0, 1.0, 0.0], "bob"),
        ])
        .await
        .unwrap();

        let m = idx.search(&[0.9, 0.1, 0.0], 1).await.unwrap();
        assert_eq!(m[0].id, "a");
        assert_eq!(m[0].payload["ts"], json!(1_700_000_000_000u64));

        let bob = idx.scroll(&Filter::eq("name", "bob")).await.unwrap();
        assert_eq!(bob, vec![point("b", &[0.0, 1.0, 0.0], "bob")]);
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("v.redb");
        {
            let idx = RedbIndex::open(&path, "master", 2).unwrap();
            idx.upsert(&[point("c1", &[1.0, 0.0], "alice")]).await.unwrap();
        }
        let idx = RedbIndex::open(&path, "master", 2).unwrap();
        assert_eq!(idx.list_ids(&Filter::All).await.unwrap(), ["c1"]);
    }

    #[tokio::test]
    async fn test_collections_are_separate() {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(Database::create(dir.path().join("v.redb")).unwrap());
        let raw = RedbIndex::with_database(db.clone(), "raw", 2).unwrap();
        let master = RedbIndex::with_database(db, "master", 2).unwrap();

        raw.upsert(&[point("s1", &[1.0, 0.0], "alice")]).await.unwrap();
        assert_eq!(raw.count(&Filter::All).await.unwrap(), 1);
        assert_eq!(master.count(&Filter::All).await.unwrap(), 0);

        raw.clear().await.unwrap();
        assert_eq!(raw.count(&Filter::All).await.unwrap(), 0);
        raw.upsert(&[point("s2", &[0.0, 1.0], "bob")]).await.unwrap();
        raw.delete(&["s2".to_string()]).await.unwrap();
        assert!(raw.scroll(&Filter::All).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dimension_checked() {
        let dir = tempfile::tempdir().unwrap();
        let idx = RedbIndex::open(dir.path().join("v.redb"), "raw", 2).unwrap();
        assert!(matches!(
            idx.upsert(&[point("a", &[1.0], "x")]).await,
            Err(VecError::DimensionMismatch { got: 1, want: 2 })
        ));
    }
}
