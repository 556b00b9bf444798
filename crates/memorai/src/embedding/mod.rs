//! Embedding services
//!
//! Turns text into fixed-dimension vectors. Variants:
//! - [`RemoteEmbedding`]: OpenAI-compatible HTTP API
//! - [`LocalEmbedding`]: in-process model via fastembed (feature `local-model`)
//! - [`NullEmbedding`]: always unavailable, used by keyword and mock tiers

use async_trait::async_trait;

use crate::error::{MemoraiError, Result};

#[cfg(feature = "local-model")]
pub mod local;
pub mod null;
pub mod remote;

#[cfg(feature = "local-model")]
pub use local::LocalEmbedding;
pub use null::NullEmbedding;
pub use remote::{RemoteEmbedding, RemoteEmbeddingModel};

/// Models the local tier knows how to load, with their output dimension
pub const LOCAL_MODELS: &[(&str, usize)] = &[
    ("all-MiniLM-L6-v2", 384),
    ("bge-small-en-v1.5", 384),
    ("multilingual-e5-small", 384),
];

/// Sentence embedded at construction to verify a model's real dimension
pub const PROBE_SENTENCE: &str = "This is a test sentence for Memorai embedding verification.";

/// Native dimension of a known local model
pub fn local_model_dimension(name: &str) -> Option<usize> {
    LOCAL_MODELS
        .iter()
        .find(|(model, _)| model.eq_ignore_ascii_case(name))
        .map(|(_, dim)| *dim)
}

/// Trait for embedding providers (remote API, local model, none)
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    /// Provider name for logging
    fn name(&self) -> &'static str;

    /// Length of every vector this service returns
    fn dimension(&self) -> usize;

    /// Whether the service is configured to produce embeddings at all
    fn is_available(&self) -> bool;

    /// Embed a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed several texts, preserving order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed(text).await?);
        }
        Ok(embeddings)
    }

    /// Live probe of the underlying provider
    async fn health_check(&self) -> bool {
        self.is_available() && self.embed("health check").await.is_ok()
    }
}

/// Reject a vector whose length differs from the declared dimension
pub(crate) fn check_dimension(service: &str, expected: usize, actual: &[f32]) -> Result<()> {
    if actual.len() == expected {
        Ok(())
    } else {
        Err(MemoraiError::unavailable(
            service,
            format!(
                "returned a {}-dimensional vector, expected {expected}",
                actual.len()
            ),
        ))
    }
}
