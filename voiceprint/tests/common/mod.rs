#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use voxid_encoder::{Encoder, EncoderError, EncoderId};
use voxid_vecstore::{Filter, Match, MemoryIndex, Point, VecError, VecIndex};
use voxid_voiceprint::{
    CalibrationConfig, EnrollmentManager, IdentificationEngine, KEY_NAME, ProfileStore,
};

pub const DIM: usize = 4;

/// Returns the first [`DIM`] samples of the waveform as the embedding.
pub struct EchoEncoder;

#[async_trait]
impl Encoder for EchoEncoder {
    async fn embed(&self, waveform: &[f32], _sample_rate: u32) -> Result<Vec<f32>, EncoderError> {
        if waveform.len() < DIM {
            return Err(EncoderError::Failed("waveform too short".into()));
        }
        Ok(waveform[..DIM].to_vec())
    }

    fn dimension(&self) -> usize {
        DIM
    }

    fn id(&self) -> EncoderId {
        EncoderId::from("echo-4")
    }
}

/// Wraps an index and fails every write that touches `poisoned`.
pub struct FailingIndex {
    pub inner: MemoryIndex,
    pub poisoned: String,
}

impl FailingIndex {
    pub fn new(poisoned: &str) -> Self {
        Self {
            inner: MemoryIndex::new(DIM),
            poisoned: poisoned.to_string(),
        }
    }
}

#[async_trait]
impl VecIndex for FailingIndex {
    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    async fn upsert(&self, points: &[Point]) -> Result<(), VecError> {
        let hit = points
            .iter()
            .any(|p| {
                p.payload.get(KEY_NAME).and_then(|v| v.as_str()) == Some(self.poisoned.as_str())
            });
        if hit {
            return Err(VecError::Backend {
                status: 400,
                body: "write rejected".into(),
            });
        }
        self.inner.upsert(points).await
    }

    async fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<Match>, VecError> {
        self.inner.search(query, top_k).await
    }

    async fn delete(&self, ids: &[String]) -> Result<(), VecError> {
        self.inner.delete(ids).await
    }

    async fn scroll(&self, filter: &Filter) -> Result<Vec<Point>, VecError> {
        self.inner.scroll(filter).await
    }

    async fn clear(&self) -> Result<(), VecError> {
        self.inner.clear().await
    }
}

/// Memory index that runs a one-shot hook when `on` is first called, before
/// the call reaches the inner index.
pub struct HookIndex {
    pub inner: MemoryIndex,
    on: &'static str,
    hook: Mutex<Option<BoxFuture<'static, ()>>>,
}

impl HookIndex {
    pub fn new(on: &'static str) -> Self {
        Self {
            inner: MemoryIndex::new(DIM),
            on,
            hook: Mutex::new(None),
        }
    }

    pub fn set_hook(&self, hook: BoxFuture<'static, ()>) {
        *self.hook.lock() = Some(hook);
    }

    async fn fire(&self, op: &str) {
        if op != self.on {
            return;
        }
        let hook = self.hook.lock().take();
        if let Some(hook) = hook {
            hook.await;
        }
    }
}

#[async_trait]
impl VecIndex for HookIndex {
    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    async fn upsert(&self, points: &[Point]) -> Result<(), VecError> {
        self.fire("upsert").await;
        self.inner.upsert(points).await
    }

    async fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<Match>, VecError> {
        self.fire("search").await;
        self.inner.search(query, top_k).await
    }

    async fn delete(&self, ids: &[String]) -> Result<(), VecError> {
        self.fire("delete").await;
        self.inner.delete(ids).await
    }

    async fn scroll(&self, filter: &Filter) -> Result<Vec<Point>, VecError> {
        self.fire("scroll").await;
        self.inner.scroll(filter).await
    }

    async fn list_ids(&self, filter: &Filter) -> Result<Vec<String>, VecError> {
        self.fire("list_ids").await;
        self.inner.list_ids(filter).await
    }

    async fn count(&self, filter: &Filter) -> Result<usize, VecError> {
        self.fire("count").await;
        self.inner.count(filter).await
    }

    async fn clear(&self) -> Result<(), VecError> {
        self.fire("clear").await;
        self.inner.clear().await
    }
}

pub struct Fixture {
    pub store: Arc<ProfileStore>,
    pub enroll: EnrollmentManager,
    pub identify: IdentificationEngine,
}

pub fn fixture() -> Fixture {
    fixture_with(Arc::new(MemoryIndex::new(DIM)), Arc::new(MemoryIndex::new(DIM)))
}

pub fn fixture_with(raw: Arc<dyn VecIndex>, master: Arc<dyn VecIndex>) -> Fixture {
    let encoder: Arc<dyn Encoder> = Arc::new(EchoEncoder);
    let store = Arc::new(ProfileStore::new(raw, master, encoder.id(), DIM).unwrap());
    Fixture {
        enroll: EnrollmentManager::new(store.clone(), encoder.clone()),
        identify: IdentificationEngine::new(store.clone(), encoder, CalibrationConfig::default()),
        store,
    }
}

pub fn assert_close(a: &[f32], b: &[f32]) {
    assert_eq!(a.len(), b.len(), "{a:?} vs {b:?}");
    for (x, y) in a.iter().zip(b) {
        assert!((x - y).abs() < 1e-5, "{a:?} vs {b:?}");
    }
}
