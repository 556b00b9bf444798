//! Unified memory engine
//!
//! Orchestrates classification, embedding, vector indexing, storage and
//! temporal scoring behind one contract (remember, recall, forget, context)
//! that keeps working as tiers degrade. Dependency failures fall back to
//! the next tier for the current call; an opened breaker also lowers the
//! active tier until a health check restores it.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cache::{CacheStats, MemoryCache};
use crate::classifier::{Classification, ContentClassifier, RuleClassifier};
use crate::config::{Config, StorageBackend};
use crate::embedding::{EmbeddingService, RemoteEmbedding};
use crate::error::{MemoraiError, Result};
use crate::memory::types::{
    ContextRequest, Memory, MemoryMetadata, RecallOptions, SearchResult, clamp_unit,
};
use crate::resilience::{CircuitSnapshot, Dependency, ResilienceManager};
use crate::storage::{FileStorage, InMemoryStorage, MemoryFilter, StorageAdapter};
use crate::temporal::TemporalEngine;
use crate::vector::{InMemoryVectorStore, QdrantVectorStore, VectorFilter, VectorPayload, VectorStore};

pub mod tier;

pub use tier::{TierDescriptor, TierKind, TierManager, TierTransition};

/// Candidate pool fetched per requested result, so filtering and
/// re-ranking by relevance happen before truncation
const CANDIDATE_MULTIPLIER: usize = 4;

/// Minimum candidate pool for small limits
const MIN_CANDIDATES: usize = 20;

/// Embedding service and vector store backing one semantic tier
#[derive(Clone)]
struct SemanticBackend {
    embedding: Arc<dyn EmbeddingService>,
    vectors: Arc<dyn VectorStore>,
}

/// Overall engine condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Running at the best configured tier
    Healthy,
    /// Running below the best configured tier
    Degraded,
}

/// Per-tier entry of [`TierInfo`]
#[derive(Debug, Clone, Serialize)]
pub struct TierStatus {
    pub tier: TierKind,
    pub name: &'static str,
    pub priority: u8,
    pub requires_embedding: bool,
    pub configured: bool,
    pub available: bool,
}

/// Snapshot returned by `get_tier_info`
#[derive(Debug, Clone, Serialize)]
pub struct TierInfo {
    pub current_tier: TierKind,
    pub current_tier_name: &'static str,
    pub available_tiers: Vec<TierStatus>,
    pub fallback_chain: Vec<TierKind>,
    pub message: String,
    pub transitions: Vec<TierTransition>,
}

/// Statistics of the engine's two caches
#[derive(Debug, Clone, Serialize)]
pub struct CacheReport {
    pub search: Option<CacheStats>,
    pub embeddings: Option<CacheStats>,
}

/// Snapshot returned by `get_health`
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub tier_info: TierInfo,
    pub circuit_states: Vec<CircuitSnapshot>,
    pub cache_stats: CacheReport,
    pub checked_at: DateTime<Utc>,
}

struct EngineInner {
    config: Config,
    tiers: TierManager,
    semantic: HashMap<TierKind, SemanticBackend>,
    storage: Arc<dyn StorageAdapter>,
    classifier: Arc<dyn ContentClassifier>,
    temporal: TemporalEngine,
    resilience: ResilienceManager,
    search_cache: MemoryCache<Vec<SearchResult>>,
    embedding_cache: MemoryCache<Vec<f32>>,
    /// Per-tenant write counter folded into search cache keys
    generations: DashMap<String, u64>,
}

/// The unified memory engine. Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct MemoryEngine {
    inner: Arc<EngineInner>,
}

impl std::fmt::Debug for MemoryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryEngine")
            .field("active_tier", &self.inner.tiers.active())
            .field("storage", &self.inner.storage.name())
            .finish()
    }
}

/// Builder for [`MemoryEngine`] that allows substituting any backend
pub struct EngineBuilder {
    config: Config,
    semantic: HashMap<TierKind, SemanticBackend>,
    storage: Option<Arc<dyn StorageAdapter>>,
    classifier: Option<Arc<dyn ContentClassifier>>,
}

impl EngineBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            semantic: HashMap::new(),
            storage: None,
            classifier: None,
        }
    }

    /// Back a semantic tier with the given services instead of the configured ones
    pub fn with_semantic_tier(
        mut self,
        tier: TierKind,
        embedding: Arc<dyn EmbeddingService>,
        vectors: Arc<dyn VectorStore>,
    ) -> Self {
        self.semantic
            .insert(tier, SemanticBackend { embedding, vectors });
        self
    }

    pub fn with_storage(mut self, storage: Arc<dyn StorageAdapter>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn ContentClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// Validate configuration, construct backends and pick the initial tier.
    ///
    /// Tier availability at this point is configuration presence only; no
    /// dependency is probed over the network.
    pub async fn build(self) -> Result<MemoryEngine> {
        let EngineBuilder {
            config,
            mut semantic,
            storage,
            classifier,
        } = self;
        config.validate()?;

        if !semantic.contains_key(&TierKind::SemanticRemote) && config.remote_embedding_configured() {
            let embedding: Arc<dyn EmbeddingService> =
                Arc::new(RemoteEmbedding::new(&config.embedding.remote)?);
            let vectors = configured_vector_store(&config, TierKind::SemanticRemote, embedding.dimension())?;
            semantic.insert(TierKind::SemanticRemote, SemanticBackend { embedding, vectors });
        }

        if !semantic.contains_key(&TierKind::SemanticLocal) && config.local_embedding_configured() {
            if let Some(embedding) = local_embedding(&config).await? {
                let vectors =
                    configured_vector_store(&config, TierKind::SemanticLocal, embedding.dimension())?;
                semantic.insert(TierKind::SemanticLocal, SemanticBackend { embedding, vectors });
            }
        }

        for (tier, backend) in &semantic {
            if !tier.requires_embedding() {
                return Err(MemoraiError::Configuration(format!(
                    "{tier} does not use embeddings"
                )));
            }
            if backend.embedding.dimension() != backend.vectors.dimension() {
                return Err(MemoraiError::Configuration(format!(
                    "{tier}: embedding dimension {} does not match vector store dimension {}",
                    backend.embedding.dimension(),
                    backend.vectors.dimension()
                )));
            }
        }

        let descriptors: Vec<TierDescriptor> = TierKind::ALL
            .into_iter()
            .map(|kind| {
                let configured = match kind {
                    TierKind::SemanticRemote | TierKind::SemanticLocal => semantic
                        .get(&kind)
                        .is_some_and(|b| b.embedding.is_available()),
                    TierKind::Keyword => config.tiers.keyword_enabled,
                    TierKind::Mock => true,
                };
                TierDescriptor::new(kind, configured)
            })
            .collect();

        let preferred = config
            .tiers
            .preferred_tier
            .as_deref()
            .map(str::parse::<TierKind>)
            .transpose()?;
        let tiers = TierManager::new(
            descriptors,
            preferred,
            config.tiers.auto_detect,
            config.tiers.enable_fallback,
        )?;

        let dependencies = semantic.keys().flat_map(|tier| tier.dependencies());
        let resilience = ResilienceManager::new(&config.resilience, dependencies);

        let storage: Arc<dyn StorageAdapter> = match storage {
            Some(storage) => storage,
            None => match config.storage.backend {
                StorageBackend::Memory => Arc::new(InMemoryStorage::new()),
                StorageBackend::File => Arc::new(FileStorage::open(&config.storage.data_dir).await?),
            },
        };
        let classifier = classifier.unwrap_or_else(|| Arc::new(RuleClassifier::new()));

        info!(
            tier = %tiers.active(),
            name = tiers.active().display_name(),
            storage = storage.name(),
            semantic_tiers = semantic.len(),
            "Memory engine initialized"
        );

        Ok(MemoryEngine {
            inner: Arc::new(EngineInner {
                temporal: TemporalEngine::new(config.temporal.clone()),
                search_cache: MemoryCache::from_config(&config.cache),
                embedding_cache: MemoryCache::from_config(&config.cache),
                config,
                tiers,
                semantic,
                storage,
                classifier,
                resilience,
                generations: DashMap::new(),
            }),
        })
    }
}

fn configured_vector_store(config: &Config, tier: TierKind, dimension: usize) -> Result<Arc<dyn VectorStore>> {
    match config.vector_store.url {
        // One collection per tier, since tiers embed with different dimensions
        Some(_) => {
            let collection = format!("{}-{}", config.vector_store.collection, tier);
            Ok(Arc::new(QdrantVectorStore::new(&config.vector_store, collection, dimension)?))
        }
        None => Ok(Arc::new(InMemoryVectorStore::new(dimension))),
    }
}

#[cfg(feature = "local-model")]
async fn local_embedding(config: &Config) -> Result<Option<Arc<dyn EmbeddingService>>> {
    let local = config.embedding.local.clone();
    let embedding = tokio::task::spawn_blocking(move || crate::embedding::LocalEmbedding::new(&local))
        .await
        .map_err(|e| MemoraiError::Configuration(format!("local model loader failed: {e}")))??;
    Ok(Some(Arc::new(embedding)))
}

#[cfg(not(feature = "local-model"))]
async fn local_embedding(_config: &Config) -> Result<Option<Arc<dyn EmbeddingService>>> {
    warn!("embedding.local.enabled is set but memorai was built without the local-model feature");
    Ok(None)
}

/// How a retrieval pass treats similarity
#[derive(Debug, Clone, Copy)]
enum Threshold {
    /// Caller-supplied minimum similarity on every tier
    Explicit(f32),
    /// Configured default on semantic tiers, any match on keyword tiers
    Default,
    /// Any positive match
    AnyMatch,
}

impl MemoryEngine {
    /// Build an engine from configuration alone
    pub async fn new(config: Config) -> Result<Self> {
        EngineBuilder::new(config).build().await
    }

    pub fn builder(config: Config) -> EngineBuilder {
        EngineBuilder::new(config)
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn active_tier(&self) -> TierKind {
        self.inner.tiers.active()
    }

    pub fn tier_manager(&self) -> &TierManager {
        &self.inner.tiers
    }

    pub fn resilience(&self) -> &ResilienceManager {
        &self.inner.resilience
    }

    pub fn temporal(&self) -> &TemporalEngine {
        &self.inner.temporal
    }

    /// Store a new memory and return its id.
    ///
    /// Fails with `Validation` for empty or oversized content and with
    /// `TiersExhausted` only when no tier in the fallback chain could index it.
    pub async fn remember(
        &self,
        content: &str,
        tenant_id: &str,
        agent_id: &str,
        metadata: Option<MemoryMetadata>,
    ) -> Result<Uuid> {
        self.validate_content(content)?;
        validate_scope(tenant_id, agent_id)?;
        let metadata = metadata.unwrap_or_default();
        if let Some(importance) = metadata.importance {
            if !(0.0..=1.0).contains(&importance) {
                return Err(MemoraiError::Validation(format!(
                    "importance must be within [0, 1], got {importance}"
                )));
            }
        }

        let classification = match self.inner.classifier.classify(content) {
            Ok(classification) => classification,
            Err(e) => {
                warn!(classifier = self.inner.classifier.name(), error = %e, "Classification failed, using default");
                Classification::fallback(format!("classifier error: {e}"))
            }
        };

        let mut memory = Memory::new(
            tenant_id,
            agent_id,
            content,
            metadata.memory_type.unwrap_or(classification.memory_type),
        );
        memory.importance = clamp_unit(metadata.importance.unwrap_or(classification.importance));
        memory.confidence = classification.confidence;
        memory.tags = metadata
            .tags
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        memory.metadata = metadata.extra;
        memory.metadata.insert(
            "classification".to_string(),
            serde_json::json!({
                "type": classification.memory_type,
                "confidence": classification.confidence,
                "reasoning": classification.reasoning,
                "classifier": self.inner.classifier.name(),
            }),
        );

        let mut last_error = None;
        let mut indexed_by = None;
        for tier in self.inner.tiers.fallback_chain() {
            if !tier.requires_embedding() {
                indexed_by = Some(tier);
                break;
            }
            match self.index_semantic(tier, &mut memory).await {
                Ok(()) => {
                    indexed_by = Some(tier);
                    break;
                }
                Err(e) => {
                    self.on_dependency_failure(tier, &e);
                    last_error = Some(e);
                }
            }
        }
        let Some(tier) = indexed_by else {
            return Err(MemoraiError::TiersExhausted(format!(
                "remember failed on every tier: {}",
                last_error.map(|e| e.to_string()).unwrap_or_default()
            )));
        };

        let id = memory.id;
        if let Err(e) = self.inner.storage.insert(memory).await {
            if tier.requires_embedding() {
                self.remove_vector(tier, id).await;
            }
            return Err(e);
        }
        self.bump_generation(tenant_id);

        debug!(
            memory_id = %id,
            tenant_id,
            agent_id,
            tier = %tier,
            memory_type = %classification.memory_type,
            "Memory stored"
        );
        Ok(id)
    }

    /// Embed `memory` on `tier` and index its vector
    async fn index_semantic(&self, tier: TierKind, memory: &mut Memory) -> Result<()> {
        let backend = self.backend(tier)?;
        let vector = self.embed_text(tier, &backend, &memory.content).await?;

        let payload = VectorPayload::from(&*memory);
        let id = memory.id;
        let vectors = Arc::clone(&backend.vectors);
        self.inner
            .resilience
            .call(Dependency::vector_store(tier), || {
                vectors.upsert(id, vector.clone(), payload.clone())
            })
            .await?;

        memory.set_embedding(vector, tier);
        Ok(())
    }

    fn backend(&self, tier: TierKind) -> Result<SemanticBackend> {
        self.inner
            .semantic
            .get(&tier)
            .cloned()
            .ok_or_else(|| MemoraiError::Configuration(format!("{tier} has no backend configured")))
    }

    /// Embed through the cache and the resilience layer
    async fn embed_text(&self, tier: TierKind, backend: &SemanticBackend, text: &str) -> Result<Vec<f32>> {
        let key = format!("{tier}:{text}");
        match self.inner.embedding_cache.get(&key) {
            Ok(Some(vector)) => return Ok(vector),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Embedding cache lookup failed"),
        }

        let embedding = Arc::clone(&backend.embedding);
        let vector = self
            .inner
            .resilience
            .call(Dependency::embedding(tier), || embedding.embed(text))
            .await?;

        let ttl = self.inner.config.engine.embedding_cache_ttl();
        if let Err(e) = self.inner.embedding_cache.set(key, vector.clone(), Some(ttl)) {
            warn!(error = %e, "Embedding cache write failed");
        }
        Ok(vector)
    }

    /// Log a failed dependency call and downgrade once its breaker is open
    fn on_dependency_failure(&self, tier: TierKind, error: &MemoraiError) {
        warn!(tier = %tier, error = %error, "Tier call failed, falling back");
        let tripped = tier
            .dependencies()
            .into_iter()
            .find(|dep| self.inner.resilience.is_open(dep));
        if let Some(dep) = tripped {
            self.inner
                .tiers
                .downgrade(tier, format!("circuit open for {dep}"));
        }
    }

    /// Find memories similar to `query`, best first.
    ///
    /// Never fails for lack of matches; an empty query yields an empty list.
    /// `TiersExhausted` is returned only when every tier in the chain failed.
    pub async fn recall(
        &self,
        query: &str,
        tenant_id: &str,
        agent_id: &str,
        options: RecallOptions,
    ) -> Result<Vec<SearchResult>> {
        if query.trim().is_empty() || tenant_id.is_empty() || agent_id.is_empty() {
            return Ok(Vec::new());
        }
        let limit = self.effective_limit(options.limit);
        let threshold = match options.threshold {
            Some(t) => Threshold::Explicit(clamp_unit(t)),
            None => Threshold::Default,
        };

        // Read once: a write landing during retrieval must orphan what we store
        let generation = self.generation(tenant_id);
        let first_tier = self.inner.tiers.active();
        let lookup_key =
            self.search_key(first_tier, tenant_id, agent_id, query, limit, options.threshold, generation);
        if let Some(cached) = lookup_key.as_deref().and_then(|key| self.cached_search(key)) {
            self.touch(tenant_id, cached.iter().map(|r| r.memory.id)).await;
            return Ok(cached);
        }

        let (tier, candidates) = self
            .retrieve(tenant_id, agent_id, query, limit, threshold)
            .await?;

        let now = Utc::now();
        let mut results: Vec<SearchResult> = candidates
            .into_iter()
            .map(|(memory, similarity)| {
                let relevance = self.inner.temporal.relevance(similarity, &memory, now);
                SearchResult {
                    memory,
                    similarity_score: similarity,
                    relevance_score: relevance,
                }
            })
            .collect();
        results.sort_by(|a, b| {
            b.relevance_score
                .partial_cmp(&a.relevance_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    b.similarity_score
                        .partial_cmp(&a.similarity_score)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .then_with(|| a.memory.id.cmp(&b.memory.id))
        });
        results.truncate(limit);

        let store_key = if tier == first_tier {
            lookup_key
        } else {
            self.search_key(tier, tenant_id, agent_id, query, limit, options.threshold, generation)
        };
        if let Some(key) = store_key {
            self.store_search(key, &results);
        }
        self.touch(tenant_id, results.iter().map(|r| r.memory.id)).await;

        debug!(tenant_id, agent_id, tier = %tier, results = results.len(), "Recall completed");
        Ok(results)
    }

    /// Memories for building an agent's context, biased toward recency.
    ///
    /// With a topic, candidates come from the same retrieval path as
    /// `recall` (any positive match); without one, every memory of the agent
    /// is a candidate. Candidates are ranked by the temporal context score.
    pub async fn get_context(&self, request: &ContextRequest) -> Result<Vec<Memory>> {
        if request.tenant_id.is_empty() || request.agent_id.is_empty() {
            return Ok(Vec::new());
        }
        let limit = self.effective_limit(request.max_memories);

        let candidates = match request.topic.as_deref().map(str::trim) {
            Some(topic) if !topic.is_empty() => {
                self.retrieve(&request.tenant_id, &request.agent_id, topic, limit, Threshold::AnyMatch)
                    .await?
                    .1
            }
            _ => self
                .inner
                .storage
                .list(&MemoryFilter::tenant(&request.tenant_id).with_agent(&request.agent_id))
                .await?
                .into_iter()
                .map(|m| (m, 0.0))
                .collect(),
        };

        let now = Utc::now();
        let mut scored: Vec<(f32, Memory)> = candidates
            .into_iter()
            .map(|(memory, similarity)| {
                (self.inner.temporal.context_score(similarity, &memory, now), memory)
            })
            .collect();
        scored.sort_by(|(sa, a), (sb, b)| {
            sb.partial_cmp(sa)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.last_accessed_at.cmp(&a.last_accessed_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        scored.truncate(limit);

        let memories: Vec<Memory> = scored.into_iter().map(|(_, m)| m).collect();
        self.touch(&request.tenant_id, memories.iter().map(|m| m.id)).await;
        Ok(memories)
    }

    /// Walk the fallback chain until one tier answers
    async fn retrieve(
        &self,
        tenant_id: &str,
        agent_id: &str,
        query: &str,
        limit: usize,
        threshold: Threshold,
    ) -> Result<(TierKind, Vec<(Memory, f32)>)> {
        let mut last_error = None;
        for tier in self.inner.tiers.fallback_chain() {
            let outcome = match tier {
                TierKind::SemanticRemote | TierKind::SemanticLocal => {
                    self.semantic_candidates(tier, tenant_id, agent_id, query, limit, threshold)
                        .await
                }
                TierKind::Keyword => {
                    self.keyword_candidates(tenant_id, agent_id, query, threshold)
                        .await
                }
                TierKind::Mock => self.mock_candidates(tenant_id, agent_id, query).await,
            };
            match outcome {
                Ok(candidates) => return Ok((tier, candidates)),
                Err(e) if tier.requires_embedding() => {
                    self.on_dependency_failure(tier, &e);
                    last_error = Some(e);
                }
                Err(e) => {
                    warn!(tier = %tier, error = %e, "Retrieval failed");
                    last_error = Some(e);
                }
            }
        }
        Err(MemoraiError::TiersExhausted(format!(
            "recall failed on every tier: {}",
            last_error.map(|e| e.to_string()).unwrap_or_default()
        )))
    }

    async fn semantic_candidates(
        &self,
        tier: TierKind,
        tenant_id: &str,
        agent_id: &str,
        query: &str,
        limit: usize,
        threshold: Threshold,
    ) -> Result<Vec<(Memory, f32)>> {
        let min_similarity = match threshold {
            Threshold::Explicit(t) => t,
            Threshold::Default => self.inner.config.engine.default_semantic_threshold,
            Threshold::AnyMatch => f32::MIN_POSITIVE,
        };
        let pool = candidate_pool(limit);

        let backend = self.backend(tier)?;
        let vector = self.embed_text(tier, &backend, query).await?;
        let filter = VectorFilter::tenant(tenant_id).with_agent(agent_id);
        let vectors = Arc::clone(&backend.vectors);
        let hits = self
            .inner
            .resilience
            .call(Dependency::vector_store(tier), || {
                vectors.search(&vector, pool, &filter)
            })
            .await?;

        let mut seen = HashSet::new();
        let mut candidates = Vec::with_capacity(hits.len());
        for hit in hits {
            if hit.score < min_similarity {
                continue;
            }
            // Vectors can outlive their record briefly (e.g. forget racing a search)
            if let Some(memory) = self.inner.storage.get(tenant_id, hit.id).await? {
                seen.insert(memory.id);
                candidates.push((memory, hit.score));
            }
        }

        // Records stored while degraded carry no embedding for this tier; keep
        // them recallable through keyword matching
        let keyword = self
            .inner
            .storage
            .keyword_search(tenant_id, agent_id, query, pool)
            .await?;
        candidates.extend(keyword.into_iter().filter(|(memory, score)| {
            !memory.has_embedding_for(tier) && !seen.contains(&memory.id) && *score >= min_similarity
        }));

        Ok(candidates)
    }

    async fn keyword_candidates(
        &self,
        tenant_id: &str,
        agent_id: &str,
        query: &str,
        threshold: Threshold,
    ) -> Result<Vec<(Memory, f32)>> {
        let matches = self
            .inner
            .storage
            .keyword_search(tenant_id, agent_id, query, usize::MAX)
            .await?;
        Ok(match threshold {
            Threshold::Explicit(min) => matches.into_iter().filter(|(_, s)| *s >= min).collect(),
            Threshold::Default | Threshold::AnyMatch => matches,
        })
    }

    /// Terminal tier: case-insensitive substring match, similarity 1.0
    async fn mock_candidates(&self, tenant_id: &str, agent_id: &str, query: &str) -> Result<Vec<(Memory, f32)>> {
        let needle = query.trim().to_lowercase();
        let memories = self
            .inner
            .storage
            .list(&MemoryFilter::tenant(tenant_id).with_agent(agent_id))
            .await?;
        Ok(memories
            .into_iter()
            .filter(|m| m.content.to_lowercase().contains(&needle))
            .map(|m| (m, 1.0))
            .collect())
    }

    /// Delete a memory. Returns false if it did not exist; calling it twice is harmless.
    pub async fn forget(&self, memory_id: Uuid, tenant_id: &str) -> Result<bool> {
        let Some(memory) = self.inner.storage.get(tenant_id, memory_id).await? else {
            return Ok(false);
        };
        if !self.inner.storage.delete(tenant_id, memory_id).await? {
            return Ok(false);
        }
        self.bump_generation(tenant_id);

        if let Some(tier) = memory.embedding_tier {
            self.remove_vector(tier, memory_id).await;
        }

        debug!(memory_id = %memory_id, tenant_id, "Memory forgotten");
        Ok(true)
    }

    /// Best-effort vector removal; a leftover vector is harmless since
    /// searches skip ids with no record
    async fn remove_vector(&self, tier: TierKind, memory_id: Uuid) {
        let Some(backend) = self.inner.semantic.get(&tier) else {
            return;
        };
        let vectors = Arc::clone(&backend.vectors);
        let removed = self
            .inner
            .resilience
            .call(Dependency::vector_store(tier), || vectors.delete(memory_id))
            .await;
        if let Err(e) = removed {
            warn!(memory_id = %memory_id, tier = %tier, error = %e, "Vector delete failed");
        }
    }

    /// Ids of a tenant's memories the retention policy would prune
    pub async fn prune_candidates(&self, tenant_id: &str) -> Result<Vec<Uuid>> {
        let memories = self
            .inner
            .storage
            .list(&MemoryFilter::tenant(tenant_id))
            .await?;
        Ok(self.inner.temporal.prune_candidates(&memories, Utc::now()))
    }

    /// Active tier, fallback chain and per-tier availability. Never fails.
    pub fn get_tier_info(&self) -> TierInfo {
        let tiers = &self.inner.tiers;
        let current = tiers.active();
        let best = tiers.best_configured();

        let available_tiers = tiers
            .descriptors()
            .iter()
            .map(|d| TierStatus {
                tier: d.kind,
                name: d.kind.display_name(),
                priority: d.priority,
                requires_embedding: d.requires_embedding,
                configured: d.configured,
                available: d.is_available(&self.inner.resilience),
            })
            .collect();

        let message = if current == best {
            format!("Running {} ({current})", current.display_name())
        } else {
            format!(
                "Degraded to {} ({current}); {} ({best}) is unavailable",
                current.display_name(),
                best.display_name()
            )
        };

        TierInfo {
            current_tier: current,
            current_tier_name: current.display_name(),
            available_tiers,
            fallback_chain: tiers.fallback_chain(),
            message,
            transitions: tiers.history(),
        }
    }

    /// Tier info, breaker states and cache statistics. Never fails.
    pub fn get_health(&self) -> HealthReport {
        let tier_info = self.get_tier_info();
        let status = if tier_info.current_tier == self.inner.tiers.best_configured() {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        };
        HealthReport {
            status,
            tier_info,
            circuit_states: self.inner.resilience.snapshots(),
            cache_stats: self.cache_stats(),
            checked_at: Utc::now(),
        }
    }

    pub fn cache_stats(&self) -> CacheReport {
        CacheReport {
            search: self.inner.search_cache.stats().ok(),
            embeddings: self.inner.embedding_cache.stats().ok(),
        }
    }

    /// Probe tiers above the active one and upgrade to the best that passes.
    ///
    /// Probes go through the resilience layer, so a breaker still in its
    /// cooldown skips the tier without touching the dependency. Returns the
    /// new active tier when it changed.
    pub async fn check_tiers(&self) -> Option<TierKind> {
        let active = self.inner.tiers.active();
        let ceiling = self.inner.tiers.ceiling();

        let candidates: Vec<TierKind> = self
            .inner
            .tiers
            .descriptors()
            .iter()
            .filter(|d| {
                d.configured
                    && d.priority < active.priority()
                    && d.priority >= ceiling.priority()
            })
            .map(|d| d.kind)
            .collect();

        for tier in candidates {
            if !tier.requires_embedding() {
                // Non-semantic tiers have no dependencies to probe
                if self.inner.tiers.upgrade(tier, "health check passed") {
                    return Some(tier);
                }
                continue;
            }
            match self.probe_semantic(tier).await {
                Ok(()) => {
                    if self.inner.tiers.upgrade(tier, "health check passed") {
                        return Some(tier);
                    }
                }
                Err(e) => debug!(tier = %tier, error = %e, "Tier still unavailable"),
            }
        }
        None
    }

    async fn probe_semantic(&self, tier: TierKind) -> Result<()> {
        let backend = self.backend(tier)?;

        let embedding = Arc::clone(&backend.embedding);
        self.inner
            .resilience
            .call(Dependency::embedding(tier), || {
                let embedding = Arc::clone(&embedding);
                async move {
                    if embedding.health_check().await {
                        Ok(())
                    } else {
                        Err(MemoraiError::unavailable(embedding.name(), "health check failed"))
                    }
                }
            })
            .await?;

        let vectors = Arc::clone(&backend.vectors);
        self.inner
            .resilience
            .call(Dependency::vector_store(tier), || {
                let vectors = Arc::clone(&vectors);
                async move {
                    if vectors.health_check().await {
                        Ok(())
                    } else {
                        Err(MemoraiError::unavailable(vectors.name(), "health check failed"))
                    }
                }
            })
            .await
    }

    /// Run `check_tiers` every `interval` until the handle is aborted
    pub fn spawn_health_monitor(&self, interval: Duration) -> JoinHandle<()> {
        let engine = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Some(tier) = engine.check_tiers().await {
                    info!(tier = %tier, "Health monitor restored tier");
                }
            }
        })
    }

    fn validate_content(&self, content: &str) -> Result<()> {
        if content.trim().is_empty() {
            return Err(MemoraiError::Validation("content must not be empty".to_string()));
        }
        let max = self.inner.config.engine.max_content_length;
        let length = content.chars().count();
        if length > max {
            return Err(MemoraiError::Validation(format!(
                "content is {length} characters, maximum is {max}"
            )));
        }
        Ok(())
    }

    fn effective_limit(&self, requested: usize) -> usize {
        if requested == 0 {
            self.inner.config.engine.default_recall_limit
        } else {
            requested
        }
    }

    async fn touch(&self, tenant_id: &str, ids: impl Iterator<Item = Uuid>) {
        let ids: Vec<Uuid> = ids.collect();
        if ids.is_empty() {
            return;
        }
        if let Err(e) = self.inner.storage.record_access(tenant_id, &ids).await {
            warn!(tenant_id, error = %e, "Failed to record access");
        }
    }

    fn generation(&self, tenant_id: &str) -> u64 {
        self.inner
            .generations
            .get(tenant_id)
            .map(|g| *g)
            .unwrap_or(0)
    }

    fn bump_generation(&self, tenant_id: &str) {
        *self
            .inner
            .generations
            .entry(tenant_id.to_string())
            .or_insert(0) += 1;
    }

    #[allow(clippy::too_many_arguments)]
    fn search_key(
        &self,
        tier: TierKind,
        tenant_id: &str,
        agent_id: &str,
        query: &str,
        limit: usize,
        threshold: Option<f32>,
        generation: u64,
    ) -> Option<String> {
        serde_json::to_string(&(tenant_id, agent_id, tier, limit, threshold, generation, query)).ok()
    }

    fn cached_search(&self, key: &str) -> Option<Vec<SearchResult>> {
        match self.inner.search_cache.get(key) {
            Ok(hit) => hit,
            Err(e) => {
                warn!(error = %e, "Search cache lookup failed");
                None
            }
        }
    }

    fn store_search(&self, key: String, results: &[SearchResult]) {
        let ttl = self.inner.config.engine.search_cache_ttl();
        if let Err(e) = self.inner.search_cache.set(key, results.to_vec(), Some(ttl)) {
            warn!(error = %e, "Search cache write failed");
        }
    }
}

fn validate_scope(tenant_id: &str, agent_id: &str) -> Result<()> {
    if tenant_id.trim().is_empty() {
        return Err(MemoraiError::Validation("tenant_id must not be empty".to_string()));
    }
    if agent_id.trim().is_empty() {
        return Err(MemoraiError::Validation("agent_id must not be empty".to_string()));
    }
    Ok(())
}

fn candidate_pool(limit: usize) -> usize {
    limit.saturating_mul(CANDIDATE_MULTIPLIER).max(MIN_CANDIDATES)
}
