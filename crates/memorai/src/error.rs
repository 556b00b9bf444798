//! Error types for Memorai

use thiserror::Error;

/// Main error type for Memorai operations
#[derive(Error, Debug)]
pub enum MemoraiError {
    /// Bad caller input, surfaced immediately and never retried
    #[error("Validation error: {0}")]
    Validation(String),

    /// Contradictory or malformed tier/dimension configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// An external dependency failed or its circuit breaker is open
    #[error("Dependency unavailable ({dependency}): {reason}")]
    DependencyUnavailable { dependency: String, reason: String },

    /// Every tier in the fallback chain failed
    #[error("All tiers exhausted: {0}")]
    TiersExhausted(String),

    /// Storage adapter errors (journal, file system, etc.)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Embedding generation errors
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Vector store errors
    #[error("Vector store error: {0}")]
    VectorStore(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl MemoraiError {
    /// Shorthand for a dependency failure
    pub fn unavailable(dependency: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DependencyUnavailable {
            dependency: dependency.into(),
            reason: reason.into(),
        }
    }

    /// Whether the failure may go away on its own (worth retrying and
    /// worth counting against a circuit breaker)
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::DependencyUnavailable { .. } | Self::Embedding(_) | Self::VectorStore(_)
        )
    }
}

impl From<serde_json::Error> for MemoraiError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Result type alias for Memorai operations
pub type Result<T> = std::result::Result<T, MemoraiError>;

/// Cache faults. Always non-fatal: callers treat them as a miss.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache lock poisoned")]
    Poisoned,
    #[error("Cache serialization failed: {0}")]
    Serialization(String),
    #[error("Cache compression failed: {0}")]
    Compression(String),
}

/// Classifier faults. Always non-fatal: callers apply the default classification.
#[derive(Error, Debug)]
pub enum ClassificationError {
    #[error("Input too large for classification: {0} bytes")]
    InputTooLarge(usize),
    #[error("Classifier failure: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(MemoraiError::unavailable("embedding", "timeout").is_transient());
        assert!(MemoraiError::Embedding("bad response".into()).is_transient());
        assert!(!MemoraiError::Validation("empty".into()).is_transient());
        assert!(!MemoraiError::Configuration("dimension".into()).is_transient());
    }

    #[test]
    fn test_dependency_error_display() {
        let err = MemoraiError::unavailable("semantic-remote/embedding", "circuit open");
        assert_eq!(
            err.to_string(),
            "Dependency unavailable (semantic-remote/embedding): circuit open"
        );
    }
}
