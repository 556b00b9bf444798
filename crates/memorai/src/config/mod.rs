use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::engine::TierKind;
use crate::error::{MemoraiError, Result};

/// Main configuration structure for Memorai.
///
/// Read once at engine construction and never mutated afterwards.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Engine limits and recall defaults
    #[serde(default)]
    pub engine: EngineConfig,
    /// Tier selection and fallback policy
    #[serde(default)]
    pub tiers: TierSettings,
    /// Embedding providers (remote API and local model)
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    /// External vector database
    #[serde(default)]
    pub vector_store: VectorStoreConfig,
    /// Embedding and search-result cache
    #[serde(default)]
    pub cache: CacheConfig,
    /// Timeouts, retries and circuit breakers
    #[serde(default)]
    pub resilience: ResilienceConfig,
    /// Recency decay and retention
    #[serde(default)]
    pub temporal: TemporalSettings,
    /// Authoritative record storage
    #[serde(default)]
    pub storage: StorageConfig,
}

impl Config {
    /// Reject contradictory or malformed settings.
    pub fn validate(&self) -> Result<()> {
        if self.engine.max_content_length == 0 {
            return Err(MemoraiError::Configuration(
                "engine.max_content_length must be greater than zero".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.engine.default_semantic_threshold) {
            return Err(MemoraiError::Configuration(format!(
                "engine.default_semantic_threshold must be within [0, 1], got {}",
                self.engine.default_semantic_threshold
            )));
        }
        if let Some(ref name) = self.tiers.preferred_tier {
            name.parse::<TierKind>()?;
        }
        if let Some(ref api_url) = self.embedding.remote.api_url {
            validate_url("embedding.remote.api_url", api_url)?;
        }
        if self.embedding.remote.dimension == 0 || self.embedding.local.dimension == 0 {
            return Err(MemoraiError::Configuration(
                "embedding dimensions must be greater than zero".to_string(),
            ));
        }
        if self.embedding.remote.batch_size == 0 || self.vector_store.batch_size == 0 {
            return Err(MemoraiError::Configuration(
                "batch sizes must be greater than zero".to_string(),
            ));
        }
        if let Some(ref url) = self.vector_store.url {
            validate_url("vector_store.url", url)?;
        }
        if self.cache.max_size == 0 {
            return Err(MemoraiError::Configuration(
                "cache.max_size must be greater than zero".to_string(),
            ));
        }
        let max_ttl_secs = crate::cache::MAX_TTL.as_secs();
        for (field, secs) in [
            ("engine.search_cache_ttl_secs", self.engine.search_cache_ttl_secs),
            ("engine.embedding_cache_ttl_secs", self.engine.embedding_cache_ttl_secs),
            ("cache.default_ttl_secs", self.cache.default_ttl_secs),
        ] {
            if secs > max_ttl_secs {
                return Err(MemoraiError::Configuration(format!(
                    "{field} must not exceed {max_ttl_secs} seconds, got {secs}"
                )));
            }
        }
        if self.resilience.failure_threshold == 0 {
            return Err(MemoraiError::Configuration(
                "resilience.failure_threshold must be greater than zero".to_string(),
            ));
        }
        if self.resilience.max_backoff_ms < self.resilience.initial_backoff_ms {
            return Err(MemoraiError::Configuration(
                "resilience.max_backoff_ms must not be below initial_backoff_ms".to_string(),
            ));
        }
        if self.temporal.recency_half_life_days <= 0.0 {
            return Err(MemoraiError::Configuration(
                "temporal.recency_half_life_days must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether the remote embedding provider has everything it needs
    pub fn remote_embedding_configured(&self) -> bool {
        self.embedding.remote.api_url.is_some() && self.embedding.remote.api_key.is_some()
    }

    /// Whether the local embedding model is enabled
    pub fn local_embedding_configured(&self) -> bool {
        self.embedding.local.enabled
    }
}

fn validate_url(field: &str, value: &str) -> Result<()> {
    let parsed = url::Url::parse(value)
        .map_err(|e| MemoraiError::Configuration(format!("{field} is not a valid URL: {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(MemoraiError::Configuration(format!(
            "{field} must use http or https, got {other}"
        ))),
    }
}

/// Engine limits and recall defaults
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Maximum accepted memory content length in characters
    #[serde(default = "default_max_content_length")]
    pub max_content_length: usize,
    /// Result limit used when a caller passes zero
    #[serde(default = "default_recall_limit")]
    pub default_recall_limit: usize,
    /// Similarity threshold applied on semantic tiers when none is given
    #[serde(default = "default_semantic_threshold")]
    pub default_semantic_threshold: f32,
    /// TTL of cached search results in seconds
    #[serde(default = "default_search_cache_ttl_secs")]
    pub search_cache_ttl_secs: u64,
    /// TTL of cached embeddings in seconds
    #[serde(default = "default_embedding_cache_ttl_secs")]
    pub embedding_cache_ttl_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_content_length: default_max_content_length(),
            default_recall_limit: default_recall_limit(),
            default_semantic_threshold: default_semantic_threshold(),
            search_cache_ttl_secs: default_search_cache_ttl_secs(),
            embedding_cache_ttl_secs: default_embedding_cache_ttl_secs(),
        }
    }
}

impl EngineConfig {
    pub fn search_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.search_cache_ttl_secs)
    }

    pub fn embedding_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.embedding_cache_ttl_secs)
    }
}

fn default_max_content_length() -> usize {
    10_000
}

fn default_recall_limit() -> usize {
    10
}

fn default_semantic_threshold() -> f32 {
    0.7
}

fn default_search_cache_ttl_secs() -> u64 {
    60
}

fn default_embedding_cache_ttl_secs() -> u64 {
    3600
}

/// Tier selection and fallback policy
#[derive(Debug, Clone, Deserialize)]
pub struct TierSettings {
    /// Highest tier the engine may run at (e.g. "semantic-local")
    #[serde(default)]
    pub preferred_tier: Option<String>,
    /// Pick the best configured tier instead of trusting `preferred_tier`
    #[serde(default = "default_auto_detect")]
    pub auto_detect: bool,
    /// Allow automatic downgrade when a dependency fails
    #[serde(default = "default_enable_fallback")]
    pub enable_fallback: bool,
    /// Interval of the scheduled tier re-check in seconds
    #[serde(default = "default_health_check_interval_secs")]
    pub health_check_interval_secs: u64,
    /// Offer the keyword tier (the mock tier is always offered)
    #[serde(default = "default_keyword_enabled")]
    pub keyword_enabled: bool,
}

impl Default for TierSettings {
    fn default() -> Self {
        Self {
            preferred_tier: None,
            auto_detect: default_auto_detect(),
            enable_fallback: default_enable_fallback(),
            health_check_interval_secs: default_health_check_interval_secs(),
            keyword_enabled: default_keyword_enabled(),
        }
    }
}

fn default_auto_detect() -> bool {
    true
}

fn default_enable_fallback() -> bool {
    true
}

fn default_health_check_interval_secs() -> u64 {
    30
}

fn default_keyword_enabled() -> bool {
    true
}

/// Embedding provider configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub remote: RemoteEmbeddingConfig,
    #[serde(default)]
    pub local: LocalEmbeddingConfig,
}

/// OpenAI-compatible embedding API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteEmbeddingConfig {
    /// API base URL (e.g. "https://api.openai.com/v1")
    #[serde(default)]
    pub api_url: Option<String>,
    /// API key; absence makes the remote tier unavailable
    #[serde(default)]
    pub api_key: Option<String>,
    /// Model identifier
    #[serde(default = "default_remote_model")]
    pub model: String,
    /// Declared embedding dimension
    #[serde(default = "default_remote_dimension")]
    pub dimension: usize,
    /// Maximum texts per request
    #[serde(default = "default_remote_batch_size")]
    pub batch_size: usize,
    /// HTTP client timeout in seconds
    #[serde(default = "default_remote_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for RemoteEmbeddingConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            api_key: None,
            model: default_remote_model(),
            dimension: default_remote_dimension(),
            batch_size: default_remote_batch_size(),
            timeout_secs: default_remote_timeout_secs(),
        }
    }
}

fn default_remote_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_remote_dimension() -> usize {
    1536
}

fn default_remote_batch_size() -> usize {
    32
}

fn default_remote_timeout_secs() -> u64 {
    30
}

/// In-process embedding model configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LocalEmbeddingConfig {
    /// Enable the local model tier
    #[serde(default)]
    pub enabled: bool,
    /// Model name (e.g. "all-MiniLM-L6-v2")
    #[serde(default = "default_local_model")]
    pub model: String,
    /// Declared embedding dimension
    #[serde(default = "default_local_dimension")]
    pub dimension: usize,
    /// Where downloaded model files are cached
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
}

impl Default for LocalEmbeddingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            model: default_local_model(),
            dimension: default_local_dimension(),
            cache_dir: None,
        }
    }
}

fn default_local_model() -> String {
    "all-MiniLM-L6-v2".to_string()
}

fn default_local_dimension() -> usize {
    384
}

/// External vector database configuration (Qdrant REST API)
#[derive(Debug, Clone, Deserialize)]
pub struct VectorStoreConfig {
    /// Base URL (e.g. "http://localhost:6333"); absence means in-process index
    #[serde(default)]
    pub url: Option<String>,
    /// Optional API key sent as `api-key`
    #[serde(default)]
    pub api_key: Option<String>,
    /// Collection holding memory vectors
    #[serde(default = "default_collection")]
    pub collection: String,
    /// Maximum points per upsert request
    #[serde(default = "default_vector_batch_size")]
    pub batch_size: usize,
    /// HTTP client timeout in seconds
    #[serde(default = "default_vector_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            collection: default_collection(),
            batch_size: default_vector_batch_size(),
            timeout_secs: default_vector_timeout_secs(),
        }
    }
}

fn default_collection() -> String {
    "memorai_memories".to_string()
}

fn default_vector_batch_size() -> usize {
    64
}

fn default_vector_timeout_secs() -> u64 {
    10
}

/// Cache configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of entries per cache instance
    #[serde(default = "default_cache_max_size")]
    pub max_size: usize,
    /// TTL applied when `set` is called without one
    #[serde(default = "default_cache_ttl_secs")]
    pub default_ttl_secs: u64,
    /// Serialized size above which values are compressed
    #[serde(default = "default_compression_threshold_bytes")]
    pub compression_threshold_bytes: usize,
    #[serde(default = "default_compression_enabled")]
    pub compression_enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: default_cache_max_size(),
            default_ttl_secs: default_cache_ttl_secs(),
            compression_threshold_bytes: default_compression_threshold_bytes(),
            compression_enabled: default_compression_enabled(),
        }
    }
}

fn default_cache_max_size() -> usize {
    1000
}

fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_compression_threshold_bytes() -> usize {
    4096
}

fn default_compression_enabled() -> bool {
    true
}

/// Timeout, retry and circuit breaker configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ResilienceConfig {
    /// Consecutive failures that open a breaker
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// How long an open breaker rejects calls before allowing a probe
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
    /// Failures older than this no longer count
    #[serde(default = "default_failure_window_secs")]
    pub failure_window_secs: u64,
    /// Per-attempt timeout in milliseconds
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,
    /// Retries after the first attempt for transient failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            cooldown_secs: default_cooldown_secs(),
            failure_window_secs: default_failure_window_secs(),
            call_timeout_ms: default_call_timeout_ms(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_cooldown_secs() -> u64 {
    30
}

fn default_failure_window_secs() -> u64 {
    60
}

fn default_call_timeout_ms() -> u64 {
    10_000
}

fn default_max_retries() -> u32 {
    2
}

fn default_initial_backoff_ms() -> u64 {
    100
}

fn default_max_backoff_ms() -> u64 {
    2_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

/// Recency decay and retention configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TemporalSettings {
    /// Days after which the recency factor halves
    #[serde(default = "default_recency_half_life_days")]
    pub recency_half_life_days: f32,
    /// Exponential decay per day of age
    #[serde(default = "default_age_decay_rate")]
    pub age_decay_rate: f32,
    /// Floor of the decay weight
    #[serde(default = "default_min_weight")]
    pub min_weight: f32,
    /// Days without access before a memory may be pruned
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
    /// Memories at or above this importance are kept
    #[serde(default = "default_retention_min_importance")]
    pub retention_min_importance: f32,
    /// Memories accessed at least this often are kept
    #[serde(default = "default_retention_min_access_count")]
    pub retention_min_access_count: u32,
}

impl Default for TemporalSettings {
    fn default() -> Self {
        Self {
            recency_half_life_days: default_recency_half_life_days(),
            age_decay_rate: default_age_decay_rate(),
            min_weight: default_min_weight(),
            retention_days: default_retention_days(),
            retention_min_importance: default_retention_min_importance(),
            retention_min_access_count: default_retention_min_access_count(),
        }
    }
}

fn default_recency_half_life_days() -> f32 {
    7.0
}

fn default_age_decay_rate() -> f32 {
    0.01
}

fn default_min_weight() -> f32 {
    0.05
}

fn default_retention_days() -> i64 {
    90
}

fn default_retention_min_importance() -> f32 {
    0.3
}

fn default_retention_min_access_count() -> u32 {
    3
}

/// Which storage adapter holds the authoritative records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    File,
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    /// Base directory for the file journal
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            data_dir: default_data_dir(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".memorai"))
        .unwrap_or_else(|| PathBuf::from(".memorai"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.engine.max_content_length, 10_000);
        assert_eq!(config.engine.default_recall_limit, 10);
        assert_eq!(config.engine.default_semantic_threshold, 0.7);
        assert!(config.tiers.preferred_tier.is_none());
        assert!(config.tiers.auto_detect);
        assert!(config.tiers.enable_fallback);
        assert_eq!(config.embedding.remote.dimension, 1536);
        assert_eq!(config.embedding.local.dimension, 384);
        assert!(!config.embedding.local.enabled);
        assert!(config.vector_store.url.is_none());
        assert_eq!(config.cache.max_size, 1000);
        assert_eq!(config.resilience.failure_threshold, 5);
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_no_credentials_means_nothing_remote_configured() {
        let config = Config::default();
        assert!(!config.remote_embedding_configured());
        assert!(!config.local_embedding_configured());
    }

    #[test]
    fn test_toml_deserialization() {
        let toml_str = r#"
[engine]
max_content_length = 2000
default_semantic_threshold = 0.6

[tiers]
preferred_tier = "semantic-local"
auto_detect = false
enable_fallback = true

[embedding.remote]
api_url = "https://api.openai.com/v1"
api_key = "sk-test"
model = "text-embedding-3-large"
dimension = 3072

[embedding.local]
enabled = true

[vector_store]
url = "http://localhost:6333"
collection = "agents"

[resilience]
failure_threshold = 3
cooldown_secs = 5

[storage]
backend = "file"
data_dir = "/tmp/memorai"
"#;

        let config: Config = toml::from_str(toml_str).expect("Failed to parse TOML");

        assert_eq!(config.engine.max_content_length, 2000);
        assert_eq!(config.engine.default_semantic_threshold, 0.6);
        assert_eq!(config.tiers.preferred_tier.as_deref(), Some("semantic-local"));
        assert!(!config.tiers.auto_detect);
        assert_eq!(config.embedding.remote.model, "text-embedding-3-large");
        assert_eq!(config.embedding.remote.dimension, 3072);
        assert_eq!(config.embedding.remote.batch_size, 32);
        assert!(config.embedding.local.enabled);
        assert_eq!(config.embedding.local.model, "all-MiniLM-L6-v2");
        assert_eq!(config.vector_store.collection, "agents");
        assert_eq!(config.resilience.failure_threshold, 3);
        assert_eq!(config.resilience.max_retries, 2);
        assert_eq!(config.storage.backend, StorageBackend::File);
        assert_eq!(config.storage.data_dir, PathBuf::from("/tmp/memorai"));
        assert!(config.remote_embedding_configured());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_preferred_tier_rejected() {
        let toml_str = r#"
[tiers]
preferred_tier = "quantum"
"#;
        let config: Config = toml::from_str(toml_str).expect("Failed to parse TOML");
        let err = config.validate().unwrap_err();
        assert!(matches!(err, MemoraiError::Configuration(_)));
    }

    #[test]
    fn test_malformed_url_rejected() {
        let mut config = Config::default();
        config.vector_store.url = Some("not a url".to_string());
        assert!(matches!(
            config.validate(),
            Err(MemoraiError::Configuration(_))
        ));

        config.vector_store.url = Some("ftp://vectors.example.com".to_string());
        assert!(matches!(
            config.validate(),
            Err(MemoraiError::Configuration(_))
        ));
    }

    #[test]
    fn test_contradictory_backoff_rejected() {
        let mut config = Config::default();
        config.resilience.initial_backoff_ms = 500;
        config.resilience.max_backoff_ms = 100;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_oversized_cache_ttls_rejected() {
        let mut config = Config::default();
        config.engine.search_cache_ttl_secs = u64::MAX;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.engine.embedding_cache_ttl_secs = u64::MAX;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.cache.default_ttl_secs = crate::cache::MAX_TTL.as_secs() + 1;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.cache.default_ttl_secs = crate::cache::MAX_TTL.as_secs();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_dimension_rejected() {
        let mut config = Config::default();
        config.embedding.local.dimension = 0;
        assert!(config.validate().is_err());
    }
}
