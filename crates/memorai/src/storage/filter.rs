//! Filter types for listing stored memories
//!
//! Narrows a tenant's memories by agent, type, importance, time and tags.

use chrono::{DateTime, Utc};

use crate::memory::types::{Memory, MemoryType};

/// Filter criteria for memory listing.
///
/// `tenant_id` is always required. Every other field is optional; when
/// `None` (or empty) that filter is not applied. Filters combine with AND.
#[derive(Debug, Clone)]
pub struct MemoryFilter {
    pub tenant_id: String,
    pub agent_id: Option<String>,
    /// Allowed memory types (OR logic within this filter)
    pub memory_types: Vec<MemoryType>,
    /// Minimum importance (inclusive)
    pub min_importance: Option<f32>,
    /// Only memories created at or after this time
    pub since: Option<DateTime<Utc>>,
    /// Memories must carry every one of these tags
    pub tags: Vec<String>,
    /// Maximum number of memories returned
    pub limit: Option<usize>,
}

impl MemoryFilter {
    /// Filter matching every memory of a tenant
    pub fn tenant(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            agent_id: None,
            memory_types: Vec::new(),
            min_importance: None,
            since: None,
            tags: Vec::new(),
            limit: None,
        }
    }

    pub fn with_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    pub fn with_memory_types(mut self, types: Vec<MemoryType>) -> Self {
        self.memory_types = types;
        self
    }

    pub fn with_min_importance(mut self, min_importance: f32) -> Self {
        self.min_importance = Some(min_importance);
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
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

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether `memory` satisfies every condition
    pub fn matches(&self, memory: &Memory) -> bool {
        if memory.tenant_id != self.tenant_id {
            return false;
        }
        if let Some(ref agent) = self.agent_id {
            if memory.agent_id != *agent {
                return false;
            }
        }
        if !self.memory_types.is_empty() && !self.memory_types.contains(&memory.memory_type) {
            return false;
        }
        if let Some(min) = self.min_importance {
            if memory.importance < min {
                return false;
            }
        }
        if let Some(since) = self.since {
            if memory.created_at < since {
                return false;
            }
        }
        self.tags.iter().all(|tag| memory.tags.contains(tag))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn memory() -> Memory {
        let mut memory = Memory::new("t1", "a1", "The deploy runs on Fridays", MemoryType::Fact);
        memory.importance = 0.6;
        memory.tags.insert("ops".to_string());
        memory
    }

    #[test]
    fn test_tenant_only_filter() {
        let memory = memory();
        assert!(MemoryFilter::tenant("t1").matches(&memory));
        assert!(!MemoryFilter::tenant("t2").matches(&memory));
    }

    #[test]
    fn test_combined_filters() {
        let memory = memory();
        let filter = MemoryFilter::tenant("t1")
            .with_agent("a1")
            .with_memory_types(vec![MemoryType::Fact, MemoryType::Task])
            .with_min_importance(0.5)
            .since(Utc::now() - Duration::hours(1))
            .with_tags(["ops"]);
        assert!(filter.matches(&memory));

        assert!(!filter.clone().with_agent("a2").matches(&memory));
        assert!(!filter.clone().with_min_importance(0.9).matches(&memory));
        assert!(!filter.clone().with_tags(["billing"]).matches(&memory));
        assert!(
            !filter
                .clone()
                .with_memory_types(vec![MemoryType::Emotion])
                .matches(&memory)
        );
        assert!(!filter.since(Utc::now() + Duration::hours(1)).matches(&memory));
    }
}
