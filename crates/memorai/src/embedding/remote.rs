//! Remote embedding provider using OpenAI-compatible APIs
//!
//! Sends `POST {api_url}/embeddings` with bearer auth. Requests are batched
//! up to the configured batch size. Retries and timeouts belong to the
//! resilience layer, so each request here is a single attempt.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{EmbeddingService, check_dimension};
use crate::config::RemoteEmbeddingConfig;
use crate::error::{MemoraiError, Result};

/// Embedding models with a known native dimension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteEmbeddingModel {
    /// text-embedding-ada-002: fixed 1536 dims
    Ada002,
    /// text-embedding-3-small: up to 1536 dims
    TextEmbedding3Small,
    /// text-embedding-3-large: up to 3072 dims
    TextEmbedding3Large,
}

impl RemoteEmbeddingModel {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "text-embedding-ada-002" => Some(Self::Ada002),
            "text-embedding-3-small" => Some(Self::TextEmbedding3Small),
            "text-embedding-3-large" => Some(Self::TextEmbedding3Large),
            _ => None,
        }
    }

    pub fn model_name(&self) -> &'static str {
        match self {
            Self::Ada002 => "text-embedding-ada-002",
            Self::TextEmbedding3Small => "text-embedding-3-small",
            Self::TextEmbedding3Large => "text-embedding-3-large",
        }
    }

    pub fn native_dimension(&self) -> usize {
        match self {
            Self::Ada002 | Self::TextEmbedding3Small => 1536,
            Self::TextEmbedding3Large => 3072,
        }
    }

    /// Whether the API accepts a `dimensions` field to shorten vectors
    pub fn supports_shortening(&self) -> bool {
        !matches!(self, Self::Ada002)
    }

    /// Check a declared dimension against what the model can produce
    pub fn validate_dimension(&self, dimension: usize) -> Result<()> {
        let native = self.native_dimension();
        let ok = if self.supports_shortening() {
            dimension <= native
        } else {
            dimension == native
        };
        if ok {
            Ok(())
        } else {
            Err(MemoraiError::Configuration(format!(
                "{} cannot produce {dimension}-dimensional embeddings (native {native})",
                self.model_name()
            )))
        }
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a [String],
    model: &'a str,
    encoding_format: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

/// Remote embedding service over an OpenAI-compatible HTTP API
#[derive(Debug)]
pub struct RemoteEmbedding {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    dimension: usize,
    batch_size: usize,
    send_dimensions: bool,
}

impl RemoteEmbedding {
    /// Create a remote embedding client.
    ///
    /// Fails with `Configuration` when credentials are missing, the URL is
    /// malformed, or the declared dimension contradicts the model.
    pub fn new(config: &RemoteEmbeddingConfig) -> Result<Self> {
        let api_url = config.api_url.as_deref().ok_or_else(|| {
            MemoraiError::Configuration("embedding.remote.api_url is not set".to_string())
        })?;
        let api_key = config.api_key.clone().ok_or_else(|| {
            MemoraiError::Configuration("embedding.remote.api_key is not set".to_string())
        })?;
        url::Url::parse(api_url).map_err(|e| {
            MemoraiError::Configuration(format!("embedding.remote.api_url is not a valid URL: {e}"))
        })?;
        if config.dimension == 0 || config.batch_size == 0 {
            return Err(MemoraiError::Configuration(
                "embedding.remote dimension and batch_size must be greater than zero".to_string(),
            ));
        }

        // Unknown models (self-hosted OpenAI-compatible servers) are trusted
        // to return the declared dimension; responses are still checked.
        let known = RemoteEmbeddingModel::from_name(&config.model);
        if let Some(model) = known {
            model.validate_dimension(config.dimension)?;
        }
        let send_dimensions = known.is_some_and(|m| m.supports_shortening());

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| MemoraiError::Configuration(format!("HTTP client: {e}")))?;

        info!(
            model = %config.model,
            dimension = config.dimension,
            api_url = %api_url,
            "RemoteEmbedding initialized"
        );

        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", api_url.trim_end_matches('/')),
            api_key,
            model: config.model.clone(),
            dimension: config.dimension,
            batch_size: config.batch_size,
            send_dimensions,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// One request for up to `batch_size` texts
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = EmbeddingRequest {
            input: texts,
            model: &self.model,
            encoding_format: "float",
            dimensions: self.send_dimensions.then_some(self.dimension),
        };

        debug!(endpoint = %self.endpoint, count = texts.len(), "Requesting embeddings");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| MemoraiError::Embedding(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(MemoraiError::Embedding(format!(
                "API returned {status}: {error_text}"
            )));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| MemoraiError::Embedding(format!("malformed response: {e}")))?;

        let mut data = parsed.data;
        data.sort_by_key(|d| d.index);

        if data.len() != texts.len() {
            return Err(MemoraiError::unavailable(
                self.name(),
                format!("returned {} embeddings for {} inputs", data.len(), texts.len()),
            ));
        }

        data.into_iter()
            .map(|d| {
                check_dimension(self.name(), self.dimension, &d.embedding)?;
                Ok(d.embedding)
            })
            .collect()
    }
}

#[async_trait]
impl EmbeddingService for RemoteEmbedding {
    fn name(&self) -> &'static str {
        "remote-embedding"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut embeddings = self.embed_texts(&[text.to_string()]).await?;
        embeddings
            .pop()
            .ok_or_else(|| MemoraiError::Embedding("Empty embedding response".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let batches = texts.chunks(self.batch_size).map(|chunk| self.embed_texts(chunk));
        let results = futures::future::try_join_all(batches).await?;
        Ok(results.into_iter().flatten().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(model: &str, dimension: usize) -> RemoteEmbeddingConfig {
        RemoteEmbeddingConfig {
            api_url: Some("https://api.example.com/v1/".to_string()),
            api_key: Some("sk-test".to_string()),
            model: model.to_string(),
            dimension,
            ..RemoteEmbeddingConfig::default()
        }
    }

    #[test]
    fn test_known_model_dimension_validation() {
        assert!(RemoteEmbedding::new(&config("text-embedding-3-small", 1536)).is_ok());
        assert!(RemoteEmbedding::new(&config("text-embedding-3-small", 512)).is_ok());
        assert!(RemoteEmbedding::new(&config("text-embedding-3-large", 3072)).is_ok());

        let err = RemoteEmbedding::new(&config("text-embedding-3-small", 3072)).unwrap_err();
        assert!(matches!(err, MemoraiError::Configuration(_)));

        let err = RemoteEmbedding::new(&config("text-embedding-ada-002", 512)).unwrap_err();
        assert!(matches!(err, MemoraiError::Configuration(_)));
    }

    #[test]
    fn test_unknown_model_is_trusted() {
        let service = RemoteEmbedding::new(&config("nomic-embed-text", 768)).unwrap();
        assert_eq!(service.dimension(), 768);
        assert!(!service.send_dimensions);
    }

    #[test]
    fn test_missing_credentials_rejected() {
        let mut cfg = config("text-embedding-3-small", 1536);
        cfg.api_key = None;
        assert!(matches!(
            RemoteEmbedding::new(&cfg),
            Err(MemoraiError::Configuration(_))
        ));
    }

    #[test]
    fn test_endpoint_normalized() {
        let service = RemoteEmbedding::new(&config("text-embedding-3-small", 1536)).unwrap();
        assert_eq!(service.endpoint, "https://api.example.com/v1/embeddings");
    }

    #[test]
    fn test_request_serialization() {
        let input = vec!["hello".to_string()];
        let request = EmbeddingRequest {
            input: &input,
            model: "text-embedding-3-small",
            encoding_format: "float",
            dimensions: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["input"][0], "hello");
        assert!(json.get("dimensions").is_none());
    }
}
