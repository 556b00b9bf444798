//! Test utilities for memorai - deterministic embeddings and failure injection
//!
//! - [`BagOfWordsEmbedding`]: hashed bag-of-words vectors, so texts sharing
//!   words are similar and identical texts score 1.0
//! - [`FlakyEmbedding`] / [`FlakyVectorStore`]: wrappers that fail on demand
//!   and count calls, for exercising fallback and circuit breaking

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use uuid::Uuid;

use crate::embedding::EmbeddingService;
use crate::error::{MemoraiError, Result};
use crate::vector::{VectorFilter, VectorHit, VectorPoint, VectorStore};

/// Deterministic embedding for tests that don't need a real model.
/// Each lowercase word is hashed into one of `dimension` buckets and the
/// result is L2-normalized.
#[derive(Debug, Clone)]
pub struct BagOfWordsEmbedding {
    dimension: usize,
}

impl BagOfWordsEmbedding {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    pub fn vector(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; self.dimension];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            word.to_lowercase().hash(&mut hasher);
            let bucket = (hasher.finish() % self.dimension as u64) as usize;
            vector[bucket] += 1.0;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        } else {
            // Empty text still needs a valid direction
            vector[0] = 1.0;
        }
        vector
    }
}

#[async_trait]
impl EmbeddingService for BagOfWordsEmbedding {
    fn name(&self) -> &'static str {
        "bag-of-words"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.vector(text))
    }
}

/// Embedding wrapper that fails while toggled on
#[derive(Debug)]
pub struct FlakyEmbedding<E> {
    inner: E,
    failing: AtomicBool,
    calls: AtomicUsize,
}

impl<E: EmbeddingService> FlakyEmbedding<E> {
    pub fn new(inner: E) -> Self {
        Self {
            inner,
            failing: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of `embed` calls that reached this service
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<E: EmbeddingService> EmbeddingService for FlakyEmbedding<E> {
    fn name(&self) -> &'static str {
        "flaky-embedding"
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    // Configured even while failing; the engine learns about outages from calls
    fn is_available(&self) -> bool {
        true
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(MemoraiError::Embedding("injected failure".to_string()));
        }
        self.inner.embed(text).await
    }
}

/// Vector store wrapper that fails while toggled on
#[derive(Debug)]
pub struct FlakyVectorStore<V> {
    inner: V,
    failing: AtomicBool,
    failing_deletes: AtomicBool,
    calls: AtomicUsize,
}

impl<V: VectorStore> FlakyVectorStore<V> {
    pub fn new(inner: V) -> Self {
        Self {
            inner,
            failing: AtomicBool::new(false),
            failing_deletes: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Fail only `delete`, leaving reads and writes healthy
    pub fn set_failing_deletes(&self, failing: bool) {
        self.failing_deletes.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            Err(MemoraiError::VectorStore("injected failure".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl<V: VectorStore> VectorStore for FlakyVectorStore<V> {
    fn name(&self) -> &'static str {
        "flaky-vector-store"
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    async fn upsert_batch(&self, points: Vec<VectorPoint>) -> Result<()> {
        self.check()?;
        self.inner.upsert_batch(points).await
    }

    async fn search(&self, vector: &[f32], limit: usize, filter: &VectorFilter) -> Result<Vec<VectorHit>> {
        self.check()?;
        self.inner.search(vector, limit, filter).await
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        self.check()?;
        if self.failing_deletes.load(Ordering::SeqCst) {
            return Err(MemoraiError::VectorStore("injected delete failure".to_string()));
        }
        self.inner.delete(id).await
    }

    async fn health_check(&self) -> bool {
        !self.failing.load(Ordering::SeqCst) && self.inner.health_check().await
    }
}
