//! Integration tests for the memory cache
//!
//! LRU order under capacity pressure, TTL behavior, compression of engine
//! payloads and statistics under concurrent use.

use std::sync::Arc;
use std::time::Duration;

use memorai::cache::MemoryCache;
use memorai::config::CacheConfig;
use memorai::memory::{Memory, MemoryType, SearchResult};

fn letter(i: u8) -> String {
    char::from(b'A' + i).to_string()
}

#[test]
fn test_accessed_key_survives_alphabet_of_inserts() {
    let cache: MemoryCache<u32> = MemoryCache::new(25, Duration::from_secs(60));

    // A..Y fills the cache exactly
    for i in 0..25 {
        cache.set(letter(i), u32::from(i), None).unwrap();
    }
    assert_eq!(cache.stats().unwrap().evictions, 0);

    assert_eq!(cache.get("A").unwrap(), Some(0));
    cache.set("Z", 25, None).unwrap();

    let stats = cache.stats().unwrap();
    assert_eq!(stats.evictions, 1);
    assert_eq!(stats.entries, 25);
    assert!(cache.contains("A").unwrap());
    assert!(!cache.contains("B").unwrap());
    assert!(cache.contains("C").unwrap());
    assert!(cache.contains("Z").unwrap());
}

#[test]
fn test_eviction_follows_access_order() {
    let cache: MemoryCache<u32> = MemoryCache::new(3, Duration::from_secs(60));
    for (i, key) in ["a", "b", "c"].into_iter().enumerate() {
        cache.set(key, i as u32, None).unwrap();
    }

    // Recency order becomes a, c, b (oldest first)
    cache.get("c").unwrap();
    cache.get("b").unwrap();

    cache.set("d", 3, None).unwrap();
    assert!(!cache.contains("a").unwrap());
    cache.set("e", 4, None).unwrap();
    assert!(!cache.contains("c").unwrap());
    assert!(cache.contains("b").unwrap());
    assert_eq!(cache.stats().unwrap().evictions, 2);
}

#[test]
fn test_per_entry_ttl_overrides_default() {
    let cache: MemoryCache<String> = MemoryCache::new(10, Duration::from_millis(10));
    cache.set("default", "short".to_string(), None).unwrap();
    cache
        .set("explicit", "long".to_string(), Some(Duration::from_secs(60)))
        .unwrap();

    std::thread::sleep(Duration::from_millis(30));

    assert_eq!(cache.get("default").unwrap(), None);
    assert_eq!(cache.get("explicit").unwrap(), Some("long".to_string()));
    assert_eq!(cache.purge_expired().unwrap(), 0);
    assert_eq!(cache.stats().unwrap().expirations, 1);
}

#[test]
fn test_search_results_compress_with_default_config() {
    let cache: MemoryCache<Vec<SearchResult>> = MemoryCache::from_config(&CacheConfig::default());

    let results: Vec<SearchResult> = (0..40)
        .map(|i| {
            let mut memory = Memory::new(
                "t1",
                "a1",
                format!("memory number {i} with some padding text to grow the payload"),
                MemoryType::Fact,
            );
            memory.tags.insert("bulk".to_string());
            SearchResult {
                memory,
                similarity_score: 0.9,
                relevance_score: 0.8,
            }
        })
        .collect();

    cache.set("bulk", results.clone(), None).unwrap();
    cache.set("empty", Vec::new(), None).unwrap();

    let cached = cache.get("bulk").unwrap().unwrap();
    assert_eq!(cached.len(), 40);
    assert_eq!(cached[7].memory.id, results[7].memory.id);
    assert!(cached[7].memory.tags.contains("bulk"));

    let stats = cache.stats().unwrap();
    assert_eq!(stats.compressed_entries, 1);
    assert!(stats.total_size_bytes > 0);
}

#[test]
fn test_concurrent_access_keeps_counts_consistent() {
    let cache: Arc<MemoryCache<u64>> = Arc::new(MemoryCache::new(64, Duration::from_secs(60)));
    let threads = 8;
    let ops = 200;

    std::thread::scope(|scope| {
        for t in 0..threads {
            let cache = Arc::clone(&cache);
            scope.spawn(move || {
                for i in 0..ops {
                    let key = format!("k{}", (t * 7 + i) % 100);
                    if cache.get(&key).unwrap().is_none() {
                        cache.set(key, i as u64, None).unwrap();
                    }
                }
            });
        }
    });

    let stats = cache.stats().unwrap();
    assert_eq!(stats.hits + stats.misses, (threads * ops) as u64);
    assert!(stats.entries <= 64);
    assert!((0.0..=1.0).contains(&stats.hit_rate));
}
