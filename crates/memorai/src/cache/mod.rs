//! High-performance cache for embeddings and search results
//!
//! A capacity-bounded LRU with per-entry TTL and transparent gzip
//! compression of large values. One mutex per cache instance keeps the
//! entry count, eviction order and statistics exact under concurrent use;
//! the lock is never held across an `.await`.

use std::io::{Read, Write};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use lru::LruCache;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::CacheConfig;
use crate::error::CacheError;

/// Longest lifetime any entry is given; longer TTLs are clamped to it
pub const MAX_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Snapshot of cache statistics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
    pub max_size: usize,
    pub evictions: u64,
    pub expirations: u64,
    pub compressed_entries: usize,
    pub total_size_bytes: usize,
    pub hit_rate: f64,
}

/// How a value is held in memory
#[derive(Clone)]
enum Stored<V> {
    Plain(V),
    Compressed(Vec<u8>),
}

struct CacheEntry<V> {
    value: Stored<V>,
    size_bytes: usize,
    inserted_at: Instant,
    expires_at: Instant,
    last_accessed_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }

    fn is_compressed(&self) -> bool {
        matches!(self.value, Stored::Compressed(_))
    }
}

struct CacheInner<V> {
    entries: LruCache<String, CacheEntry<V>>,
    hits: u64,
    misses: u64,
    evictions: u64,
    expirations: u64,
}

impl<V> CacheInner<V> {
    fn purge_expired(&mut self, now: Instant) -> usize {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            self.entries.pop(key);
        }
        self.expirations += expired.len() as u64;
        expired.len()
    }
}

/// TTL + LRU cache with optional value compression
pub struct MemoryCache<V> {
    inner: Mutex<CacheInner<V>>,
    max_size: usize,
    default_ttl: Duration,
    compression_threshold: usize,
    compression_enabled: bool,
}

impl<V> MemoryCache<V>
where
    V: Clone + Serialize + DeserializeOwned,
{
    /// Create a cache holding at most `max_size` entries (minimum 1)
    pub fn new(max_size: usize, default_ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                entries: LruCache::unbounded(),
                hits: 0,
                misses: 0,
                evictions: 0,
                expirations: 0,
            }),
            max_size: max_size.max(1),
            default_ttl,
            compression_threshold: usize::MAX,
            compression_enabled: false,
        }
    }

    /// Create a cache from configuration
    pub fn from_config(config: &CacheConfig) -> Self {
        let cache = Self::new(
            config.max_size,
            Duration::from_secs(config.default_ttl_secs),
        );
        if config.compression_enabled {
            cache.with_compression(config.compression_threshold_bytes)
        } else {
            cache
        }
    }

    /// Compress values whose serialized form exceeds `threshold_bytes`
    pub fn with_compression(mut self, threshold_bytes: usize) -> Self {
        self.compression_enabled = true;
        self.compression_threshold = threshold_bytes;
        self
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    fn lock(&self) -> Result<MutexGuard<'_, CacheInner<V>>, CacheError> {
        self.inner.lock().map_err(|_| CacheError::Poisoned)
    }

    /// Look up a value. Expired entries are removed and reported as a miss.
    pub fn get(&self, key: &str) -> Result<Option<V>, CacheError> {
        let now = Instant::now();
        let stored = {
            let mut guard = self.lock()?;
            let inner = &mut *guard;

            match inner.entries.peek(key).map(|entry| entry.is_expired(now)) {
                None => {
                    inner.misses += 1;
                    return Ok(None);
                }
                Some(true) => {
                    inner.entries.pop(key);
                    inner.expirations += 1;
                    inner.misses += 1;
                    return Ok(None);
                }
                Some(false) => {}
            }

            match inner.entries.get_mut(key) {
                Some(entry) => {
                    entry.last_accessed_at = now;
                    inner.hits += 1;
                    entry.value.clone()
                }
                None => return Ok(None),
            }
        };

        match stored {
            Stored::Plain(value) => Ok(Some(value)),
            Stored::Compressed(bytes) => decompress(&bytes).map(Some),
        }
    }

    /// Insert a value, using the default TTL when `ttl` is `None`.
    ///
    /// Inserting a new key into a full cache first drops expired entries,
    /// then evicts exactly one least-recently-used entry if still full.
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Option<Duration>) -> Result<(), CacheError> {
        let key = key.into();
        let (stored, size_bytes) = self.encode(value)?;
        let now = Instant::now();
        let ttl = ttl.unwrap_or(self.default_ttl).min(MAX_TTL);
        let entry = CacheEntry {
            value: stored,
            size_bytes,
            inserted_at: now,
            expires_at: now.checked_add(ttl).unwrap_or(now),
            last_accessed_at: now,
        };

        let mut inner = self.lock()?;
        if !inner.entries.contains(&key) && inner.entries.len() >= self.max_size {
            let purged = inner.purge_expired(now);
            if purged == 0 {
                if let Some((victim, evicted)) = inner.entries.pop_lru() {
                    inner.evictions += 1;
                    debug!(
                        key = %victim,
                        age_ms = evicted.inserted_at.elapsed().as_millis() as u64,
                        idle_ms = evicted.last_accessed_at.elapsed().as_millis() as u64,
                        "Evicted least-recently-used cache entry"
                    );
                }
            }
        }
        inner.entries.put(key, entry);
        Ok(())
    }

    /// Insert several values with a shared TTL
    pub fn set_multiple<I, K>(&self, items: I, ttl: Option<Duration>) -> Result<(), CacheError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
    {
        for (key, value) in items {
            self.set(key, value, ttl)?;
        }
        Ok(())
    }

    /// Look up several keys; results are in the same order as `keys`
    pub fn get_multiple<K: AsRef<str>>(&self, keys: &[K]) -> Result<Vec<Option<V>>, CacheError> {
        keys.iter().map(|k| self.get(k.as_ref())).collect()
    }

    /// Remove a key, returning whether it was present
    pub fn remove(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.lock()?.entries.pop(key).is_some())
    }

    /// Drop all entries. Statistics counters are kept.
    pub fn clear(&self) -> Result<(), CacheError> {
        self.lock()?.entries.clear();
        Ok(())
    }

    /// Drop every expired entry, returning how many were removed
    pub fn purge_expired(&self) -> Result<usize, CacheError> {
        Ok(self.lock()?.purge_expired(Instant::now()))
    }

    /// Whether `key` is present and not expired, without touching LRU order
    pub fn contains(&self, key: &str) -> Result<bool, CacheError> {
        let inner = self.lock()?;
        Ok(inner
            .entries
            .peek(key)
            .is_some_and(|entry| !entry.is_expired(Instant::now())))
    }

    pub fn len(&self) -> usize {
        self.lock().map(|inner| inner.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current statistics
    pub fn stats(&self) -> Result<CacheStats, CacheError> {
        let inner = self.lock()?;
        let lookups = inner.hits + inner.misses;
        Ok(CacheStats {
            hits: inner.hits,
            misses: inner.misses,
            entries: inner.entries.len(),
            max_size: self.max_size,
            evictions: inner.evictions,
            expirations: inner.expirations,
            compressed_entries: inner
                .entries
                .iter()
                .filter(|(_, entry)| entry.is_compressed())
                .count(),
            total_size_bytes: inner.entries.iter().map(|(_, entry)| entry.size_bytes).sum(),
            hit_rate: if lookups == 0 {
                0.0
            } else {
                inner.hits as f64 / lookups as f64
            },
        })
    }

    fn encode(&self, value: V) -> Result<(Stored<V>, usize), CacheError> {
        let bytes =
            serde_json::to_vec(&value).map_err(|e| CacheError::Serialization(e.to_string()))?;
        let size = bytes.len();

        if self.compression_enabled && size > self.compression_threshold {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::fast());
            encoder
                .write_all(&bytes)
                .map_err(|e| CacheError::Compression(e.to_string()))?;
            let compressed = encoder
                .finish()
                .map_err(|e| CacheError::Compression(e.to_string()))?;
            let compressed_size = compressed.len();
            return Ok((Stored::Compressed(compressed), compressed_size));
        }

        Ok((Stored::Plain(value), size))
    }
}

fn decompress<V: DeserializeOwned>(bytes: &[u8]) -> Result<V, CacheError> {
    let mut decoder = GzDecoder::new(bytes);
    let mut raw = Vec::new();
    decoder
        .read_to_end(&mut raw)
        .map_err(|e| CacheError::Compression(e.to_string()))?;
    serde_json::from_slice(&raw).map_err(|e| CacheError::Serialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(max_size: usize) -> MemoryCache<String> {
        MemoryCache::new(max_size, Duration::from_secs(60))
    }

    #[test]
    fn test_get_miss_and_hit() {
        let cache = cache(10);
        assert_eq!(cache.get("a").unwrap(), None);

        cache.set("a", "alpha".to_string(), None).unwrap();
        assert_eq!(cache.get("a").unwrap(), Some("alpha".to_string()));

        let stats = cache.stats().unwrap();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.max_size, 10);
        assert!((stats.hit_rate - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_capacity_evicts_exactly_one_lru_entry() {
        let cache = cache(3);
        cache.set("a", "1".to_string(), None).unwrap();
        cache.set("b", "2".to_string(), None).unwrap();
        cache.set("c", "3".to_string(), None).unwrap();

        // Touch "a" so "b" becomes the least recently used
        assert!(cache.get("a").unwrap().is_some());

        cache.set("d", "4".to_string(), None).unwrap();

        assert_eq!(cache.len(), 3);
        assert!(cache.contains("a").unwrap());
        assert!(!cache.contains("b").unwrap());
        assert!(cache.contains("c").unwrap());
        assert!(cache.contains("d").unwrap());
        assert_eq!(cache.stats().unwrap().evictions, 1);
    }

    #[test]
    fn test_replacing_key_does_not_evict() {
        let cache = cache(2);
        cache.set("a", "1".to_string(), None).unwrap();
        cache.set("b", "2".to_string(), None).unwrap();
        cache.set("a", "updated".to_string(), None).unwrap();

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.stats().unwrap().evictions, 0);
        assert_eq!(cache.get("a").unwrap(), Some("updated".to_string()));
    }

    #[test]
    fn test_expired_entry_is_a_miss() {
        let cache = cache(10);
        cache
            .set("short", "lived".to_string(), Some(Duration::from_millis(10)))
            .unwrap();
        std::thread::sleep(Duration::from_millis(30));

        assert_eq!(cache.get("short").unwrap(), None);
        let stats = cache.stats().unwrap();
        assert_eq!(stats.expirations, 1);
        assert_eq!(stats.entries, 0);
    }

    #[test]
    fn test_unbounded_ttl_is_clamped() {
        let cache: MemoryCache<String> = MemoryCache::new(10, Duration::MAX);
        cache.set("default", "forever".to_string(), None).unwrap();
        cache
            .set("explicit", "forever".to_string(), Some(Duration::MAX))
            .unwrap();

        assert_eq!(cache.get("default").unwrap(), Some("forever".to_string()));
        assert_eq!(cache.get("explicit").unwrap(), Some("forever".to_string()));
        assert_eq!(cache.purge_expired().unwrap(), 0);
    }

    #[test]
    fn test_full_cache_prefers_dropping_expired_entries() {
        let cache = cache(2);
        cache
            .set("stale", "x".to_string(), Some(Duration::from_millis(5)))
            .unwrap();
        cache.set("fresh", "y".to_string(), None).unwrap();
        std::thread::sleep(Duration::from_millis(20));

        cache.set("new", "z".to_string(), None).unwrap();

        assert!(cache.contains("fresh").unwrap());
        assert!(cache.contains("new").unwrap());
        let stats = cache.stats().unwrap();
        assert_eq!(stats.evictions, 0);
        assert_eq!(stats.expirations, 1);
    }

    #[test]
    fn test_large_values_are_compressed_transparently() {
        let cache: MemoryCache<Vec<f32>> =
            MemoryCache::new(10, Duration::from_secs(60)).with_compression(64);
        let big = vec![0.25_f32; 512];
        let small = vec![0.5_f32; 2];

        cache.set("big", big.clone(), None).unwrap();
        cache.set("small", small.clone(), None).unwrap();

        assert_eq!(cache.get("big").unwrap(), Some(big));
        assert_eq!(cache.get("small").unwrap(), Some(small));
        assert_eq!(cache.stats().unwrap().compressed_entries, 1);
    }

    #[test]
    fn test_multiple_operations() {
        let cache = cache(10);
        cache
            .set_multiple(
                vec![("a", "1".to_string()), ("b", "2".to_string())],
                None,
            )
            .unwrap();

        let values = cache.get_multiple(&["a", "missing", "b"]).unwrap();
        assert_eq!(
            values,
            vec![Some("1".to_string()), None, Some("2".to_string())]
        );
    }

    #[test]
    fn test_clear_and_remove() {
        let cache = cache(10);
        cache.set("a", "1".to_string(), None).unwrap();
        cache.set("b", "2".to_string(), None).unwrap();

        assert!(cache.remove("a").unwrap());
        assert!(!cache.remove("a").unwrap());

        cache.clear().unwrap();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_zero_capacity_is_raised_to_one() {
        let cache = cache(0);
        cache.set("a", "1".to_string(), None).unwrap();
        cache.set("b", "2".to_string(), None).unwrap();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.max_size(), 1);
    }
}
