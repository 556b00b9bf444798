use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use super::{
    VectorFilter, VectorHit, VectorPayload, VectorPoint, VectorStore, check_vector,
    cosine_similarity, sort_hits, unit_score,
};
use crate::error::Result;

/// In-process vector index with exact cosine search over a linear scan
#[derive(Debug)]
pub struct InMemoryVectorStore {
    dimension: usize,
    points: DashMap<Uuid, (Vec<f32>, VectorPayload)>,
}

impl InMemoryVectorStore {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            points: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    fn name(&self) -> &'static str {
        "in-memory"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn upsert_batch(&self, points: Vec<VectorPoint>) -> Result<()> {
        // Validate the whole batch first so a bad point leaves nothing half-written
        for point in &points {
            check_vector(self.name(), self.dimension, &point.vector)?;
        }
        for point in points {
            self.points.insert(point.id, (point.vector, point.payload));
        }
        Ok(())
    }

    async fn search(&self, vector: &[f32], limit: usize, filter: &VectorFilter) -> Result<Vec<VectorHit>> {
        check_vector(self.name(), self.dimension, vector)?;
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut hits: Vec<VectorHit> = self
            .points
            .iter()
            .filter(|entry| filter.matches(&entry.value().1))
            .map(|entry| {
                let (stored, payload) = entry.value();
                VectorHit {
                    id: *entry.key(),
                    score: unit_score(cosine_similarity(vector, stored)),
                    payload: payload.clone(),
                }
            })
            .collect();

        sort_hits(&mut hits);
        hits.truncate(limit);
        Ok(hits)
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        Ok(self.points.remove(&id).is_some())
    }

    async fn health_check(&self) -> bool {
        true
    }
}
