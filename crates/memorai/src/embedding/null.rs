use async_trait::async_trait;

use super::EmbeddingService;
use crate::error::{MemoraiError, Result};

/// Embedding service for tiers that never embed
#[derive(Debug, Clone, Copy, Default)]
pub struct NullEmbedding;

#[async_trait]
impl EmbeddingService for NullEmbedding {
    fn name(&self) -> &'static str {
        "none"
    }

    fn dimension(&self) -> usize {
        0
    }

    fn is_available(&self) -> bool {
        false
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(MemoraiError::unavailable(
            "none",
            "no embedding service configured",
        ))
    }

    async fn health_check(&self) -> bool {
        false
    }
}
