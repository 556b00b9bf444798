//! Authoritative memory record storage
//!
//! Holds content and metadata independently of any vector index, and
//! answers the keyword matching used by the keyword tier and by semantic
//! tiers for records that carry no usable embedding.

use std::collections::HashSet;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::memory::types::Memory;

pub mod file;
pub mod filter;
pub mod memory;

pub use file::FileStorage;
pub use filter::MemoryFilter;
pub use memory::InMemoryStorage;

/// Trait for storage backends
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// Backend name for logging
    fn name(&self) -> &'static str;

    /// Insert or replace a record
    async fn insert(&self, memory: Memory) -> Result<()>;

    async fn get(&self, tenant_id: &str, id: Uuid) -> Result<Option<Memory>>;

    /// Remove a record. Returns false if it did not exist.
    async fn delete(&self, tenant_id: &str, id: Uuid) -> Result<bool>;

    /// Records matching `filter`, newest first
    async fn list(&self, filter: &MemoryFilter) -> Result<Vec<Memory>>;

    /// Records of `tenant_id`/`agent_id` whose content matches `query`,
    /// best first, with their keyword score in (0, 1]
    async fn keyword_search(
        &self,
        tenant_id: &str,
        agent_id: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<(Memory, f32)>>;

    /// Bump access count and timestamp of each record atomically
    async fn record_access(&self, tenant_id: &str, ids: &[Uuid]) -> Result<()>;

    async fn count(&self, tenant_id: &str) -> Result<usize>;
}

fn tokens(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= 2)
}

/// Keyword score of `content` for `query` in [0, 1].
///
/// Case-insensitive. Full containment of the query scores 1.0; otherwise
/// the score is the fraction of distinct query tokens (two characters or
/// longer) found among the content's tokens.
pub fn keyword_score(query: &str, content: &str) -> f32 {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return 0.0;
    }
    let content = content.to_lowercase();
    if content.contains(&query) {
        return 1.0;
    }

    let query_tokens: HashSet<&str> = tokens(&query).collect();
    if query_tokens.is_empty() {
        return 0.0;
    }
    let content_tokens: HashSet<&str> = tokens(&content).collect();
    let matched = query_tokens
        .iter()
        .filter(|t| content_tokens.contains(*t))
        .count();

    matched as f32 / query_tokens.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_containment() {
        assert_eq!(keyword_score("Go", "I learned Go today"), 1.0);
        assert_eq!(keyword_score("  dark MODE ", "User prefers dark mode"), 1.0);
    }

    #[test]
    fn test_keyword_partial_overlap() {
        let score = keyword_score("rust async runtime", "tokio is an async runtime");
        assert!((score - 2.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_keyword_no_match() {
        assert_eq!(keyword_score("python", "I learned Go today"), 0.0);
        assert_eq!(keyword_score("", "anything"), 0.0);
        assert_eq!(keyword_score("?", "what"), 0.0);
    }
}
