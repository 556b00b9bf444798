//! Integration tests for storage adapters
//!
//! Journal persistence and compaction for `FileStorage`, and the shared
//! adapter contract exercised against both backends.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tempfile::TempDir;

use memorai::memory::{Memory, MemoryType};
use memorai::storage::{FileStorage, InMemoryStorage, MemoryFilter, StorageAdapter};

fn memory(tenant: &str, agent: &str, content: &str) -> Memory {
    Memory::new(tenant, agent, content, MemoryType::Fact)
}

async fn adapters(dir: &TempDir) -> Vec<Arc<dyn StorageAdapter>> {
    vec![
        Arc::new(InMemoryStorage::new()),
        Arc::new(FileStorage::open(dir.path()).await.unwrap()),
    ]
}

#[tokio::test]
async fn test_adapter_contract() {
    let dir = TempDir::new().unwrap();
    for storage in adapters(&dir).await {
        let mut important = memory("t1", "a1", "Quarterly report is due in March");
        important.importance = 0.9;
        important.tags.insert("work".to_string());
        let mut old = memory("t1", "a1", "Old grocery list");
        old.created_at = Utc::now() - Duration::days(10);
        let other_agent = memory("t1", "a2", "Report for agent two");

        let important_id = important.id;
        let old_id = old.id;
        for m in [important, old, other_agent] {
            storage.insert(m).await.unwrap();
        }

        let name = storage.name();
        assert_eq!(storage.count("t1").await.unwrap(), 3, "{name}");
        assert_eq!(storage.count("t2").await.unwrap(), 0, "{name}");

        // Newest first
        let listed = storage
            .list(&MemoryFilter::tenant("t1").with_agent("a1"))
            .await
            .unwrap();
        assert_eq!(listed.len(), 2, "{name}");
        assert_eq!(listed[1].id, old_id, "{name}");

        let filtered = storage
            .list(
                &MemoryFilter::tenant("t1")
                    .with_min_importance(0.8)
                    .with_tags(["work"])
                    .since(Utc::now() - Duration::days(1)),
            )
            .await
            .unwrap();
        assert_eq!(filtered.len(), 1, "{name}");
        assert_eq!(filtered[0].id, important_id, "{name}");

        let hits = storage
            .keyword_search("t1", "a1", "report", 10)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1, "{name}");
        assert_eq!(hits[0].0.id, important_id, "{name}");
        assert_eq!(hits[0].1, 1.0, "{name}");

        storage.record_access("t1", &[important_id, old_id]).await.unwrap();
        let accessed = storage.get("t1", important_id).await.unwrap().unwrap();
        assert_eq!(accessed.access_count, 1, "{name}");

        assert!(storage.delete("t1", old_id).await.unwrap(), "{name}");
        assert!(!storage.delete("t1", old_id).await.unwrap(), "{name}");
        assert!(storage.get("t1", old_id).await.unwrap().is_none(), "{name}");
    }
}

#[tokio::test]
async fn test_compaction_persists_access_statistics() {
    let dir = TempDir::new().unwrap();
    let record = memory("t1", "a1", "frequently used");
    let id = record.id;

    {
        let storage = FileStorage::open(dir.path()).await.unwrap();
        storage.insert(record).await.unwrap();
        storage.insert(memory("t1", "a1", "short lived")).await.unwrap();
        let doomed = storage
            .list(&MemoryFilter::tenant("t1"))
            .await
            .unwrap()
            .into_iter()
            .find(|m| m.content == "short lived")
            .unwrap();
        storage.delete("t1", doomed.id).await.unwrap();
        storage.record_access("t1", &[id, id]).await.unwrap();

        assert_eq!(storage.compact().await.unwrap(), 1);
        // Writes after compaction land in the rewritten journal
        storage.insert(memory("t1", "a1", "after compaction")).await.unwrap();
    }

    let journal = tokio::fs::read_to_string(dir.path().join("memories.jsonl"))
        .await
        .unwrap();
    assert_eq!(journal.lines().count(), 2);

    let storage = FileStorage::open(dir.path()).await.unwrap();
    assert_eq!(storage.count("t1").await.unwrap(), 2);
    let reloaded = storage.get("t1", id).await.unwrap().unwrap();
    assert_eq!(reloaded.access_count, 2);
}

#[tokio::test]
async fn test_concurrent_inserts_all_journaled() {
    let dir = TempDir::new().unwrap();
    let storage = Arc::new(FileStorage::open(dir.path()).await.unwrap());

    let tasks: Vec<_> = (0..40)
        .map(|i| {
            let storage = Arc::clone(&storage);
            tokio::spawn(async move {
                storage
                    .insert(memory("t1", "a1", &format!("parallel write {i}")))
                    .await
            })
        })
        .collect();
    for task in futures::future::join_all(tasks).await {
        task.unwrap().unwrap();
    }
    drop(storage);

    let reopened = FileStorage::open(dir.path()).await.unwrap();
    assert_eq!(reopened.count("t1").await.unwrap(), 40);
}

#[tokio::test]
async fn test_open_creates_missing_directory() {
    let dir = TempDir::new().unwrap();
    let nested = dir.path().join("deeply").join("nested");
    let storage = FileStorage::open(&nested).await.unwrap();
    assert!(nested.is_dir());
    assert_eq!(storage.path(), nested.join("memories.jsonl"));
}
