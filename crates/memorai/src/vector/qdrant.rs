//! Qdrant vector store over its REST API
//!
//! Points are keyed by memory id. Tenant and agent scoping is pushed into
//! the query as a `must` filter on payload fields.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::OnceCell;
use tracing::{debug, info};
use uuid::Uuid;

use super::{
    VectorFilter, VectorHit, VectorPayload, VectorPoint, VectorStore, check_vector, sort_hits,
    unit_score,
};
use crate::config::VectorStoreConfig;
use crate::error::{MemoraiError, Result};

#[derive(Debug, Deserialize)]
struct SearchResponse {
    result: Vec<ScoredPoint>,
}

#[derive(Debug, Deserialize)]
struct ScoredPoint {
    id: serde_json::Value,
    score: f32,
    payload: Option<VectorPayload>,
}

/// Networked vector store backed by a Qdrant collection
#[derive(Debug)]
pub struct QdrantVectorStore {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    collection: String,
    dimension: usize,
    batch_size: usize,
    ready: OnceCell<()>,
}

impl QdrantVectorStore {
    /// Create a client for `collection`. Does not touch the network.
    pub fn new(config: &VectorStoreConfig, collection: impl Into<String>, dimension: usize) -> Result<Self> {
        let base_url = config.url.as_deref().ok_or_else(|| {
            MemoraiError::Configuration("vector_store.url is not set".to_string())
        })?;
        url::Url::parse(base_url).map_err(|e| {
            MemoraiError::Configuration(format!("vector_store.url is not a valid URL: {e}"))
        })?;
        if dimension == 0 {
            return Err(MemoraiError::Configuration(
                "vector dimension must be greater than zero".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| MemoraiError::Configuration(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            collection: collection.into(),
            dimension,
            batch_size: config.batch_size.max(1),
            ready: OnceCell::new(),
        })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    fn collection_url(&self) -> String {
        format!("{}/collections/{}", self.base_url, self.collection)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match self.api_key {
            Some(ref key) => request.header("api-key", key),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder, action: &str) -> Result<reqwest::Response> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| MemoraiError::VectorStore(format!("{action} request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MemoraiError::VectorStore(format!(
                "{action} returned {status}: {body}"
            )));
        }
        Ok(response)
    }

    /// Make sure the collection exists before the first read or write
    async fn ready(&self) -> Result<()> {
        self.ready
            .get_or_try_init(|| self.ensure_collection())
            .await
            .map(|_| ())
    }

    /// Create the collection with cosine distance if it does not exist
    pub async fn ensure_collection(&self) -> Result<()> {
        let url = self.collection_url();
        let exists = self
            .authorized(self.client.get(&url))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false);
        if exists {
            return Ok(());
        }

        let body = json!({
            "vectors": {
                "size": self.dimension,
                "distance": "Cosine"
            }
        });
        let response = self
            .authorized(self.client.put(&url).json(&body))
            .send()
            .await
            .map_err(|e| MemoraiError::VectorStore(format!("create collection failed: {e}")))?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if status.is_success() || status.as_u16() == 409 || text.contains("already exists") {
            info!(collection = %self.collection, dimension = self.dimension, "Qdrant collection ready");
            Ok(())
        } else {
            Err(MemoraiError::VectorStore(format!(
                "Failed to create collection {}: {status} {text}",
                self.collection
            )))
        }
    }
}

fn filter_body(filter: &VectorFilter) -> serde_json::Value {
    let mut must = vec![json!({
        "key": "tenant_id",
        "match": { "value": filter.tenant_id }
    })];
    if let Some(ref agent) = filter.agent_id {
        must.push(json!({
            "key": "agent_id",
            "match": { "value": agent }
        }));
    }
    json!({ "must": must })
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    fn name(&self) -> &'static str {
        "qdrant"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn upsert_batch(&self, points: Vec<VectorPoint>) -> Result<()> {
        for point in &points {
            check_vector(self.name(), self.dimension, &point.vector)?;
        }
        self.ready().await?;

        let url = format!("{}/points?wait=true", self.collection_url());
        for chunk in points.chunks(self.batch_size) {
            let body = json!({
                "points": chunk
                    .iter()
                    .map(|p| json!({
                        "id": p.id.to_string(),
                        "vector": p.vector,
                        "payload": p.payload,
                    }))
                    .collect::<Vec<_>>()
            });
            self.send(self.client.put(&url).json(&body), "upsert").await?;
            debug!(collection = %self.collection, count = chunk.len(), "Upserted points");
        }
        Ok(())
    }

    async fn search(&self, vector: &[f32], limit: usize, filter: &VectorFilter) -> Result<Vec<VectorHit>> {
        check_vector(self.name(), self.dimension, vector)?;
        if limit == 0 {
            return Ok(Vec::new());
        }
        self.ready().await?;

        let url = format!("{}/points/search", self.collection_url());
        let body = json!({
            "vector": vector,
            "limit": limit,
            "with_payload": true,
            "filter": filter_body(filter),
        });

        let response = self.send(self.client.post(&url).json(&body), "search").await?;
        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| MemoraiError::VectorStore(format!("malformed search response: {e}")))?;

        let mut hits: Vec<VectorHit> = parsed
            .result
            .into_iter()
            .filter_map(|point| {
                let id = point.id.as_str().and_then(|s| Uuid::parse_str(s).ok())?;
                let payload = point.payload?;
                Some(VectorHit {
                    id,
                    score: unit_score(point.score),
                    payload,
                })
            })
            // The server already filters; re-check so a misconfigured index cannot leak tenants
            .filter(|hit| filter.matches(&hit.payload))
            .collect();

        sort_hits(&mut hits);
        hits.truncate(limit);
        Ok(hits)
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let url = format!("{}/points/delete?wait=true", self.collection_url());
        let body = json!({ "points": [id.to_string()] });
        self.send(self.client.post(&url).json(&body), "delete").await?;
        Ok(true)
    }

    async fn health_check(&self) -> bool {
        // A reachable server without the collection yet is healthy; create it here
        if let Err(e) = self.ready().await {
            debug!(collection = %self.collection, error = %e, "Qdrant health check failed");
            return false;
        }
        match self.authorized(self.client.get(self.collection_url())).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(url: &str) -> VectorStoreConfig {
        VectorStoreConfig {
            url: Some(url.to_string()),
            ..VectorStoreConfig::default()
        }
    }

    #[test]
    fn test_collection_url() {
        let store = QdrantVectorStore::new(&config("http://localhost:6333/"), "mems", 4).unwrap();
        assert_eq!(store.collection_url(), "http://localhost:6333/collections/mems");
    }

    #[test]
    fn test_requires_url_and_dimension() {
        assert!(QdrantVectorStore::new(&VectorStoreConfig::default(), "mems", 4).is_err());
        assert!(QdrantVectorStore::new(&config("http://localhost:6333"), "mems", 0).is_err());
    }

    #[test]
    fn test_filter_body() {
        let body = filter_body(&VectorFilter::tenant("t1").with_agent("a1"));
        let must = body["must"].as_array().unwrap();
        assert_eq!(must.len(), 2);
        assert_eq!(must[0]["key"], "tenant_id");
        assert_eq!(must[0]["match"]["value"], "t1");
        assert_eq!(must[1]["key"], "agent_id");
    }
}
