//! Temporal weighting and retention
//!
//! Maps the time since a memory was last accessed and created to a
//! multiplicative weight in (0, 1], and decides which memories an external
//! cleanup job may prune.
//!
//! Formula: `max(min_weight, 0.5^(idle_days / half_life) * exp(-age_rate * age_days) * access_bonus)`

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::TemporalSettings;
use crate::memory::types::{Memory, MemoryType, clamp_unit};

/// Why a memory is kept or may be pruned
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RetentionDecision {
    Keep(String),
    Prune(String),
}

impl RetentionDecision {
    pub fn is_prune(&self) -> bool {
        matches!(self, RetentionDecision::Prune(_))
    }
}

/// Recency/decay weighting and retention policy
#[derive(Debug, Clone)]
pub struct TemporalEngine {
    config: TemporalSettings,
}

impl Default for TemporalEngine {
    fn default() -> Self {
        Self::new(TemporalSettings::default())
    }
}

impl TemporalEngine {
    pub fn new(config: TemporalSettings) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TemporalSettings {
        &self.config
    }

    /// Decay weight in (0, 1] for `memory` at `now`
    pub fn decay_weight(&self, memory: &Memory, now: DateTime<Utc>) -> f32 {
        let idle_days = days_between(memory.last_accessed_at, now);
        let age_days = days_between(memory.created_at, now);

        let recency = 0.5_f32.powf(idle_days / self.config.recency_half_life_days);
        let age = (-self.config.age_decay_rate * age_days).exp();
        // Logarithmic bonus with diminishing returns for frequently used memories
        let access_bonus = 1.0 + 0.05 * (memory.access_count as f32 + 1.0).ln();

        let floor = self.config.min_weight.clamp(f32::EPSILON, 1.0);
        (recency * age * access_bonus).clamp(floor, 1.0)
    }

    /// Similarity adjusted by decay and stored importance, in [0, 1]
    pub fn relevance(&self, similarity: f32, memory: &Memory, now: DateTime<Utc>) -> f32 {
        let decay = self.decay_weight(memory, now);
        clamp_unit(clamp_unit(similarity) * decay * (0.5 + 0.5 * memory.importance))
    }

    /// Recency-biased score used to rank context memories
    pub fn context_score(&self, similarity: f32, memory: &Memory, now: DateTime<Utc>) -> f32 {
        let decay = self.decay_weight(memory, now);
        clamp_unit(0.6 * decay + 0.25 * clamp_unit(similarity) + 0.15 * memory.importance)
    }

    /// Retention verdict for an external cleanup collaborator
    pub fn retention(&self, memory: &Memory, now: DateTime<Utc>) -> RetentionDecision {
        if matches!(
            memory.memory_type,
            MemoryType::Personality | MemoryType::Preference
        ) {
            return RetentionDecision::Keep(format!("{} memories are never pruned", memory.memory_type));
        }

        let idle_days = (now - memory.last_accessed_at).num_days();
        if idle_days < self.config.retention_days {
            return RetentionDecision::Keep(format!(
                "accessed {idle_days} days ago (retention {} days)",
                self.config.retention_days
            ));
        }
        if memory.importance >= self.config.retention_min_importance {
            return RetentionDecision::Keep(format!(
                "importance {:.2} at or above {:.2}",
                memory.importance, self.config.retention_min_importance
            ));
        }
        if memory.access_count >= self.config.retention_min_access_count {
            return RetentionDecision::Keep(format!(
                "accessed {} times",
                memory.access_count
            ));
        }

        RetentionDecision::Prune(format!(
            "idle {idle_days} days, importance {:.2}, accessed {} times",
            memory.importance, memory.access_count
        ))
    }

    pub fn is_eligible_for_pruning(&self, memory: &Memory, now: DateTime<Utc>) -> bool {
        self.retention(memory, now).is_prune()
    }

    /// Ids of memories eligible for pruning
    pub fn prune_candidates(&self, memories: &[Memory], now: DateTime<Utc>) -> Vec<Uuid> {
        memories
            .iter()
            .filter(|m| self.is_eligible_for_pruning(m, now))
            .map(|m| m.id)
            .collect()
    }
}

fn days_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> f32 {
    ((later - earlier).num_seconds().max(0) as f32) / 86_400.0
}
