use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use super::{MemoryFilter, StorageAdapter, keyword_score};
use crate::error::Result;
use crate::memory::types::Memory;

/// Process-local storage keyed by `(tenant, id)`
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    records: DashMap<(String, Uuid), Memory>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Every record, in no particular order
    pub(crate) fn snapshot(&self) -> Vec<Memory> {
        self.records.iter().map(|entry| entry.value().clone()).collect()
    }

    pub(crate) fn put(&self, memory: Memory) {
        self.records
            .insert((memory.tenant_id.clone(), memory.id), memory);
    }

    pub(crate) fn remove(&self, tenant_id: &str, id: Uuid) -> bool {
        self.records.remove(&(tenant_id.to_string(), id)).is_some()
    }
}

#[async_trait]
impl StorageAdapter for InMemoryStorage {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn insert(&self, memory: Memory) -> Result<()> {
        self.put(memory);
        Ok(())
    }

    async fn get(&self, tenant_id: &str, id: Uuid) -> Result<Option<Memory>> {
        Ok(self
            .records
            .get(&(tenant_id.to_string(), id))
            .map(|entry| entry.value().clone()))
    }

    async fn delete(&self, tenant_id: &str, id: Uuid) -> Result<bool> {
        Ok(self.remove(tenant_id, id))
    }

    async fn list(&self, filter: &MemoryFilter) -> Result<Vec<Memory>> {
        let mut memories: Vec<Memory> = self
            .records
            .iter()
            .filter(|entry| filter.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();

        memories.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        if let Some(limit) = filter.limit {
            memories.truncate(limit);
        }
        Ok(memories)
    }

    async fn keyword_search(
        &self,
        tenant_id: &str,
        agent_id: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<(Memory, f32)>> {
        let mut matches: Vec<(Memory, f32)> = self
            .records
            .iter()
            .filter(|entry| {
                let memory = entry.value();
                memory.tenant_id == tenant_id && memory.agent_id == agent_id
            })
            .filter_map(|entry| {
                let score = keyword_score(query, &entry.value().content);
                (score > 0.0).then(|| (entry.value().clone(), score))
            })
            .collect();

        matches.sort_by(|(a, sa), (b, sb)| {
            sb.partial_cmp(sa)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.created_at.cmp(&a.created_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        matches.truncate(limit);
        Ok(matches)
    }

    async fn record_access(&self, tenant_id: &str, ids: &[Uuid]) -> Result<()> {
        for id in ids {
            // get_mut holds the shard write lock, so concurrent bumps never lose increments
            if let Some(mut memory) = self.records.get_mut(&(tenant_id.to_string(), *id)) {
                memory.mark_accessed();
            }
        }
        Ok(())
    }

    async fn count(&self, tenant_id: &str) -> Result<usize> {
        Ok(self
            .records
            .iter()
            .filter(|entry| entry.key().0 == tenant_id)
            .count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::types::MemoryType;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_insert_get_delete() {
        let storage = InMemoryStorage::new();
        let memory = Memory::new("t1", "a1", "hello", MemoryType::Fact);
        let id = memory.id;

        storage.insert(memory).await.unwrap();
        assert!(storage.get("t1", id).await.unwrap().is_some());
        assert!(storage.get("t2", id).await.unwrap().is_none());

        assert!(storage.delete("t1", id).await.unwrap());
        assert!(!storage.delete("t1", id).await.unwrap());
    }

    #[tokio::test]
    async fn test_keyword_search_scoped_and_ranked() {
        let storage = InMemoryStorage::new();
        for (tenant, agent, content) in [
            ("t1", "a1", "I learned Go today"),
            ("t1", "a1", "Go and Rust are compiled languages"),
            ("t1", "a1", "Python is interpreted"),
            ("t1", "a2", "Go is fun"),
            ("t2", "a1", "Go somewhere"),
        ] {
            storage
                .insert(Memory::new(tenant, agent, content, MemoryType::Fact))
                .await
                .unwrap();
        }

        let results = storage.keyword_search("t1", "a1", "go", 10).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|(m, _)| m.tenant_id == "t1" && m.agent_id == "a1"));

        let limited = storage.keyword_search("t1", "a1", "go", 1).await.unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_record_access_is_exact() {
        let storage = Arc::new(InMemoryStorage::new());
        let memory = Memory::new("t1", "a1", "popular", MemoryType::Fact);
        let id = memory.id;
        storage.insert(memory).await.unwrap();

        let tasks: Vec<_> = (0..50)
            .map(|_| {
                let storage = Arc::clone(&storage);
                tokio::spawn(async move { storage.record_access("t1", &[id]).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let memory = storage.get("t1", id).await.unwrap().unwrap();
        assert_eq!(memory.access_count, 50);
    }

    #[tokio::test]
    async fn test_list_and_count() {
        let storage = InMemoryStorage::new();
        let mut task = Memory::new("t1", "a1", "file taxes", MemoryType::Task);
        task.importance = 0.9;
        storage.insert(task).await.unwrap();
        storage
            .insert(Memory::new("t1", "a1", "sky is blue", MemoryType::Fact))
            .await
            .unwrap();
        storage
            .insert(Memory::new("t2", "a1", "other tenant", MemoryType::Fact))
            .await
            .unwrap();

        assert_eq!(storage.count("t1").await.unwrap(), 2);
        let tasks = storage
            .list(&MemoryFilter::tenant("t1").with_memory_types(vec![MemoryType::Task]))
            .await
            .unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].content, "file taxes");

        let limited = storage
            .list(&MemoryFilter::tenant("t1").with_limit(1))
            .await
            .unwrap();
        assert_eq!(limited.len(), 1);
    }
}
