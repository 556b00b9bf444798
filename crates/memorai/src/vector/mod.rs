//! Vector store abstraction
//!
//! Persists embeddings plus a minimal payload and answers nearest-neighbour
//! queries scoped to a tenant (and optionally an agent). Both variants return
//! hits sorted by descending score, and an empty store is a valid empty answer.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{MemoraiError, Result};
use crate::memory::types::{Memory, MemoryType};

pub mod memory;
pub mod qdrant;

pub use memory::InMemoryVectorStore;
pub use qdrant::QdrantVectorStore;

/// Payload stored alongside each vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorPayload {
    pub tenant_id: String,
    pub agent_id: String,
    pub memory_type: MemoryType,
    pub created_at: DateTime<Utc>,
}

impl From<&Memory> for VectorPayload {
    fn from(memory: &Memory) -> Self {
        Self {
            tenant_id: memory.tenant_id.clone(),
            agent_id: memory.agent_id.clone(),
            memory_type: memory.memory_type,
            created_at: memory.created_at,
        }
    }
}

/// A vector to upsert
#[derive(Debug, Clone)]
pub struct VectorPoint {
    pub id: Uuid,
    pub vector: Vec<f32>,
    pub payload: VectorPayload,
}

/// Scope of a search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VectorFilter {
    pub tenant_id: String,
    pub agent_id: Option<String>,
}

impl VectorFilter {
    pub fn tenant(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            agent_id: None,
        }
    }

    pub fn with_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    pub fn matches(&self, payload: &VectorPayload) -> bool {
        payload.tenant_id == self.tenant_id
            && self
                .agent_id
                .as_ref()
                .is_none_or(|agent| payload.agent_id == *agent)
    }
}

/// A search hit with its similarity in [0, 1]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorHit {
    pub id: Uuid,
    pub score: f32,
    pub payload: VectorPayload,
}

/// Trait for vector store backends (networked database, in-process index)
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Backend name for logging
    fn name(&self) -> &'static str;

    /// Length every stored and queried vector must have
    fn dimension(&self) -> usize;

    /// Insert or replace a single vector
    async fn upsert(&self, id: Uuid, vector: Vec<f32>, payload: VectorPayload) -> Result<()> {
        self.upsert_batch(vec![VectorPoint {
            id,
            vector,
            payload,
        }])
        .await
    }

    /// Insert or replace several vectors
    async fn upsert_batch(&self, points: Vec<VectorPoint>) -> Result<()>;

    /// Nearest neighbours of `vector` within `filter`, best first
    async fn search(&self, vector: &[f32], limit: usize, filter: &VectorFilter) -> Result<Vec<VectorHit>>;

    /// Remove a vector. Returns whether it existed, when the backend can tell.
    async fn delete(&self, id: Uuid) -> Result<bool>;

    /// Live probe of the backend
    async fn health_check(&self) -> bool;
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 for mismatched lengths, empty inputs or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

/// Map a cosine score onto [0, 1]; anti-correlated vectors score zero
pub(crate) fn unit_score(score: f32) -> f32 {
    crate::memory::types::clamp_unit(score)
}

pub(crate) fn check_vector(store: &str, expected: usize, vector: &[f32]) -> Result<()> {
    if vector.len() != expected {
        return Err(MemoraiError::VectorStore(format!(
            "{store}: vector has {} dimensions, expected {expected}",
            vector.len()
        )));
    }
    Ok(())
}

/// Sort hits best first, breaking ties by id so results are deterministic
pub(crate) fn sort_hits(hits: &mut [VectorHit]) {
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
}
