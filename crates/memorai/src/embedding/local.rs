//! Local embedding model using fastembed
//!
//! Runs entirely in-process with no network access after the model files
//! are cached. Inference is CPU-bound and runs on the blocking pool.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use fastembed::{EmbeddingModel as FastEmbedModel, InitOptions, TextEmbedding};
use tracing::info;

use super::{EmbeddingService, PROBE_SENTENCE, check_dimension, local_model_dimension};
use crate::config::LocalEmbeddingConfig;
use crate::error::{MemoraiError, Result};

fn fastembed_model(name: &str) -> Option<FastEmbedModel> {
    match name.to_ascii_lowercase().as_str() {
        "all-minilm-l6-v2" => Some(FastEmbedModel::AllMiniLML6V2),
        "bge-small-en-v1.5" => Some(FastEmbedModel::BGESmallENV15),
        "multilingual-e5-small" => Some(FastEmbedModel::MultilingualE5Small),
        _ => None,
    }
}

/// In-process embedding model
pub struct LocalEmbedding {
    model: Arc<Mutex<TextEmbedding>>,
    model_name: String,
    dimension: usize,
}

impl std::fmt::Debug for LocalEmbedding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalEmbedding")
            .field("model_name", &self.model_name)
            .field("dimension", &self.dimension)
            .finish()
    }
}

impl LocalEmbedding {
    /// Load the model and verify its output dimension.
    ///
    /// Downloads model files on first use. Blocking; call from
    /// `spawn_blocking` inside async contexts.
    pub fn new(config: &LocalEmbeddingConfig) -> Result<Self> {
        let kind = fastembed_model(&config.model).ok_or_else(|| {
            MemoraiError::Configuration(format!("Unknown local embedding model: {}", config.model))
        })?;
        match local_model_dimension(&config.model) {
            Some(native) if native != config.dimension => {
                return Err(MemoraiError::Configuration(format!(
                    "{} produces {native}-dimensional embeddings, configured {}",
                    config.model, config.dimension
                )));
            }
            _ => {}
        }

        let mut options = InitOptions::new(kind).with_show_download_progress(false);
        if let Some(ref dir) = config.cache_dir {
            options = options.with_cache_dir(dir.clone());
        }

        let mut model = TextEmbedding::try_new(options)
            .map_err(|e| MemoraiError::Configuration(format!("Failed to load {}: {e}", config.model)))?;

        let probe = model
            .embed(vec![PROBE_SENTENCE.to_string()], None)
            .map_err(|e| MemoraiError::Configuration(format!("Probe embedding failed: {e}")))?;
        let actual = probe.first().map(Vec::len).unwrap_or(0);
        if actual != config.dimension {
            return Err(MemoraiError::Configuration(format!(
                "{} returned {actual}-dimensional embeddings, configured {}",
                config.model, config.dimension
            )));
        }

        info!(model = %config.model, dimension = actual, "LocalEmbedding loaded");

        Ok(Self {
            model: Arc::new(Mutex::new(model)),
            model_name: config.model.clone(),
            dimension: config.dimension,
        })
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn run(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let model = Arc::clone(&self.model);
        let embeddings = tokio::task::spawn_blocking(move || {
            let mut model = model
                .lock()
                .map_err(|_| MemoraiError::Embedding("local model lock poisoned".to_string()))?;
            model
                .embed(texts, None)
                .map_err(|e| MemoraiError::Embedding(e.to_string()))
        })
        .await
        .map_err(|e| MemoraiError::Embedding(format!("embedding task failed: {e}")))??;

        for embedding in &embeddings {
            check_dimension(self.name(), self.dimension, embedding)?;
        }
        Ok(embeddings)
    }
}

#[async_trait]
impl EmbeddingService for LocalEmbedding {
    fn name(&self) -> &'static str {
        "local-embedding"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.run(vec![text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| MemoraiError::Embedding("No embedding returned".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.run(texts.to_vec()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_name_mapping() {
        assert!(fastembed_model("all-MiniLM-L6-v2").is_some());
        assert!(fastembed_model("bge-small-en-v1.5").is_some());
        assert!(fastembed_model("unknown").is_none());
    }

    #[test]
    fn test_dimension_contradiction_rejected_before_loading() {
        let config = LocalEmbeddingConfig {
            enabled: true,
            dimension: 768,
            ..LocalEmbeddingConfig::default()
        };
        assert!(matches!(
            LocalEmbedding::new(&config),
            Err(MemoraiError::Configuration(_))
        ));
    }
}
