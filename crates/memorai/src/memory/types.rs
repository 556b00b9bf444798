//! Memory types for the Memorai system
//!
//! Defines the authoritative memory record, its classification enum, and
//! the request/response shapes of the public engine contract.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::TierKind;
use crate::error::MemoraiError;

/// A single memory unit stored in the Memorai system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    /// Unique identifier, unique within the tenant
    pub id: Uuid,
    /// Owning tenant
    pub tenant_id: String,
    /// Owning agent within the tenant
    pub agent_id: String,
    /// The actual content of the memory
    pub content: String,
    /// Vector embedding, when the storing tier produced one
    pub embedding: Option<Vec<f32>>,
    /// Tier whose embedding model produced `embedding`
    pub embedding_tier: Option<TierKind>,
    /// Classification of what kind of memory this is
    pub memory_type: MemoryType,
    /// Importance estimate in [0, 1]
    pub importance: f32,
    /// Classifier confidence in [0, 1]
    pub confidence: f32,
    /// Caller-supplied tags
    pub tags: BTreeSet<String>,
    /// Free-form caller metadata plus the classification trace
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    /// How many times this memory has been returned by recall or context
    pub access_count: u32,
}

impl Memory {
    /// Create a new memory with default values
    pub fn new(
        tenant_id: impl Into<String>,
        agent_id: impl Into<String>,
        content: impl Into<String>,
        memory_type: MemoryType,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tenant_id: tenant_id.into(),
            agent_id: agent_id.into(),
            content: content.into(),
            embedding: None,
            embedding_tier: None,
            memory_type,
            importance: 0.5,
            confidence: 0.0,
            tags: BTreeSet::new(),
            metadata: serde_json::Map::new(),
            created_at: now,
            updated_at: now,
            last_accessed_at: now,
            access_count: 0,
        }
    }

    /// Mark this memory as accessed, updating access count and timestamp
    pub fn mark_accessed(&mut self) {
        self.access_count = self.access_count.saturating_add(1);
        self.last_accessed_at = Utc::now();
    }

    /// Update the importance of this memory
    pub fn set_importance(&mut self, importance: f32) {
        self.importance = clamp_unit(importance);
        self.updated_at = Utc::now();
    }

    /// Attach an embedding produced by `tier`
    pub fn set_embedding(&mut self, embedding: Vec<f32>, tier: TierKind) {
        self.embedding = Some(embedding);
        self.embedding_tier = Some(tier);
    }

    /// Drop the embedding (e.g. when the vector store rejected it)
    pub fn clear_embedding(&mut self) {
        self.embedding = None;
        self.embedding_tier = None;
    }

    /// Whether this memory carries an embedding usable on `tier`
    pub fn has_embedding_for(&self, tier: TierKind) -> bool {
        self.embedding.is_some() && self.embedding_tier == Some(tier)
    }
}

/// Clamp to [0, 1], mapping NaN to 0
pub(crate) fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Classification of memory content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryType {
    /// Facts and knowledge
    Fact,
    /// How to do things
    Procedure,
    /// Traits of the user or agent
    Personality,
    /// Likes, dislikes and choices
    Preference,
    /// Feelings and moods
    Emotion,
    /// Things to do
    Task,
    /// Conversation fragments, questions, links
    Thread,
}

impl MemoryType {
    pub const ALL: [MemoryType; 7] = [
        MemoryType::Fact,
        MemoryType::Procedure,
        MemoryType::Personality,
        MemoryType::Preference,
        MemoryType::Emotion,
        MemoryType::Task,
        MemoryType::Thread,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryType::Fact => "fact",
            MemoryType::Procedure => "procedure",
            MemoryType::Personality => "personality",
            MemoryType::Preference => "preference",
            MemoryType::Emotion => "emotion",
            MemoryType::Task => "task",
            MemoryType::Thread => "thread",
        }
    }
}

impl fmt::Display for MemoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemoryType {
    type Err = MemoraiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase();
        MemoryType::ALL
            .into_iter()
            .find(|t| t.as_str() == needle)
            .ok_or_else(|| MemoraiError::Validation(format!("Unknown memory type: {s}")))
    }
}

/// Optional caller metadata for `remember`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryMetadata {
    /// Overrides the classifier's type
    #[serde(default)]
    pub memory_type: Option<MemoryType>,
    /// Overrides the classifier's importance estimate
    #[serde(default)]
    pub importance: Option<f32>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Stored verbatim on the record
    #[serde(default)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl MemoryMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_type(mut self, memory_type: MemoryType) -> Self {
        self.memory_type = Some(memory_type);
        self
    }

    pub fn with_importance(mut self, importance: f32) -> Self {
        self.importance = Some(importance);
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// A recalled memory with scoring information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub memory: Memory,
    /// Raw similarity in [0, 1] (cosine on semantic tiers, keyword overlap otherwise)
    pub similarity_score: f32,
    /// Similarity adjusted by temporal decay and importance
    pub relevance_score: f32,
}

/// Options for `recall`
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RecallOptions {
    /// Maximum results; zero means the configured default
    pub limit: usize,
    /// Minimum similarity; `None` uses the tier's default policy
    pub threshold: Option<f32>,
}

impl RecallOptions {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            threshold: None,
        }
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = Some(threshold);
        self
    }
}

impl Default for RecallOptions {
    fn default() -> Self {
        Self::new(0)
    }
}

/// Request for `get_context`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextRequest {
    pub tenant_id: String,
    pub agent_id: String,
    /// Optional topic; without one the most relevant recent memories are returned
    pub topic: Option<String>,
    pub max_memories: usize,
}

impl ContextRequest {
    pub fn new(tenant_id: impl Into<String>, agent_id: impl Into<String>, max_memories: usize) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            agent_id: agent_id.into(),
            topic: None,
            max_memories,
        }
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }
}
