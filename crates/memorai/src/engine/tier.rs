//! Tier selection and transitions
//!
//! Tiers are ordered by priority (lower is preferred). Exactly one tier is
//! active at a time. The active tier moves down when a dependency's breaker
//! opens and back up when a scheduled health check passes, never above the
//! preferred tier.

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{MemoraiError, Result};
use crate::resilience::{Dependency, ResilienceManager};

/// Transitions kept for reporting
const MAX_TRANSITION_HISTORY: usize = 32;

/// Operating mode of the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TierKind {
    /// Remote embedding API plus vector store
    SemanticRemote,
    /// Local embedding model plus vector store
    SemanticLocal,
    /// Keyword overlap over stored content
    Keyword,
    /// Plain substring matching, always available
    Mock,
}

impl TierKind {
    pub const ALL: [TierKind; 4] = [
        TierKind::SemanticRemote,
        TierKind::SemanticLocal,
        TierKind::Keyword,
        TierKind::Mock,
    ];

    pub fn priority(&self) -> u8 {
        match self {
            TierKind::SemanticRemote => 0,
            TierKind::SemanticLocal => 1,
            TierKind::Keyword => 2,
            TierKind::Mock => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TierKind::SemanticRemote => "semantic-remote",
            TierKind::SemanticLocal => "semantic-local",
            TierKind::Keyword => "keyword",
            TierKind::Mock => "mock",
        }
    }

    /// Name shown to users
    pub fn display_name(&self) -> &'static str {
        match self {
            TierKind::SemanticRemote => "Advanced Memory",
            TierKind::SemanticLocal => "Smart Memory",
            TierKind::Keyword => "Basic Memory",
            TierKind::Mock => "Mock Memory",
        }
    }

    pub fn requires_embedding(&self) -> bool {
        matches!(self, TierKind::SemanticRemote | TierKind::SemanticLocal)
    }

    /// External dependencies the tier calls
    pub fn dependencies(&self) -> Vec<Dependency> {
        if self.requires_embedding() {
            vec![Dependency::embedding(*self), Dependency::vector_store(*self)]
        } else {
            Vec::new()
        }
    }
}

impl fmt::Display for TierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TierKind {
    type Err = MemoraiError;

    fn from_str(s: &str) -> Result<Self> {
        let needle = s.trim().to_lowercase().replace('_', "-");
        TierKind::ALL
            .into_iter()
            .find(|t| t.as_str() == needle)
            .ok_or_else(|| MemoraiError::Configuration(format!("Unknown tier: {s}")))
    }
}

/// Static description of a tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TierDescriptor {
    pub kind: TierKind,
    pub priority: u8,
    pub requires_embedding: bool,
    /// Whether everything the tier needs was configured at construction
    pub configured: bool,
}

impl TierDescriptor {
    pub fn new(kind: TierKind, configured: bool) -> Self {
        Self {
            kind,
            priority: kind.priority(),
            requires_embedding: kind.requires_embedding(),
            configured,
        }
    }

    /// Configured, and no dependency breaker is rejecting calls
    pub fn is_available(&self, resilience: &ResilienceManager) -> bool {
        self.configured
            && self
                .kind
                .dependencies()
                .iter()
                .all(|dep| resilience.allows_calls(dep))
    }
}

/// A recorded change of the active tier
#[derive(Debug, Clone, Serialize)]
pub struct TierTransition {
    pub from: TierKind,
    pub to: TierKind,
    pub reason: String,
    pub at: DateTime<Utc>,
}

/// Owns the active tier and its transitions
#[derive(Debug)]
pub struct TierManager {
    descriptors: Vec<TierDescriptor>,
    ceiling: TierKind,
    fallback_enabled: bool,
    active: RwLock<TierKind>,
    history: Mutex<VecDeque<TierTransition>>,
}

impl TierManager {
    /// Pick the initial tier.
    ///
    /// With `auto_detect` the initial tier is the best configured tier at or
    /// below `preferred`. Without it the preferred tier is used as-is and must
    /// be configured. The mock tier is always configured.
    pub fn new(
        descriptors: Vec<TierDescriptor>,
        preferred: Option<TierKind>,
        auto_detect: bool,
        fallback_enabled: bool,
    ) -> Result<Self> {
        let mut descriptors: Vec<TierDescriptor> = descriptors
            .into_iter()
            .filter(|d| d.kind != TierKind::Mock)
            .collect();
        descriptors.push(TierDescriptor::new(TierKind::Mock, true));
        descriptors.sort_by_key(|d| d.priority);
        descriptors.dedup_by_key(|d| d.kind);

        let ceiling = preferred.unwrap_or(TierKind::SemanticRemote);

        let initial = match preferred {
            Some(kind) if !auto_detect => {
                let configured = descriptors
                    .iter()
                    .any(|d| d.kind == kind && d.configured);
                if !configured {
                    return Err(MemoraiError::Configuration(format!(
                        "preferred tier {kind} is not configured and auto_detect is disabled"
                    )));
                }
                kind
            }
            _ => descriptors
                .iter()
                .find(|d| d.configured && d.priority >= ceiling.priority())
                .map(|d| d.kind)
                .unwrap_or(TierKind::Mock),
        };

        Ok(Self {
            descriptors,
            ceiling,
            fallback_enabled,
            active: RwLock::new(initial),
            history: Mutex::new(VecDeque::with_capacity(MAX_TRANSITION_HISTORY)),
        })
    }

    pub fn active(&self) -> TierKind {
        *self.active.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Highest tier the engine may run at
    pub fn ceiling(&self) -> TierKind {
        self.ceiling
    }

    pub fn fallback_enabled(&self) -> bool {
        self.fallback_enabled
    }

    pub fn descriptors(&self) -> &[TierDescriptor] {
        &self.descriptors
    }

    pub fn descriptor(&self, kind: TierKind) -> Option<&TierDescriptor> {
        self.descriptors.iter().find(|d| d.kind == kind)
    }

    /// Best configured tier at or below the ceiling
    pub fn best_configured(&self) -> TierKind {
        self.configured_from(self.ceiling)
            .next()
            .unwrap_or(TierKind::Mock)
    }

    fn configured_from(&self, top: TierKind) -> impl Iterator<Item = TierKind> + '_ {
        self.descriptors
            .iter()
            .filter(move |d| d.configured && d.priority >= top.priority())
            .map(|d| d.kind)
    }

    /// Tiers tried in order for one call, starting at the active tier.
    /// Without fallback only the active tier is tried.
    pub fn fallback_chain(&self) -> Vec<TierKind> {
        let active = self.active();
        if self.fallback_enabled {
            self.configured_from(active).collect()
        } else {
            vec![active]
        }
    }

    /// Next configured tier below `kind`
    pub fn next_below(&self, kind: TierKind) -> Option<TierKind> {
        self.descriptors
            .iter()
            .find(|d| d.configured && d.priority > kind.priority())
            .map(|d| d.kind)
    }

    /// Move the active tier down from `from`.
    ///
    /// No-op (returns `None`) when fallback is disabled or the active tier is
    /// no longer `from`, so concurrent failures downgrade only once.
    pub fn downgrade(&self, from: TierKind, reason: impl Into<String>) -> Option<TierKind> {
        if !self.fallback_enabled {
            return None;
        }
        let mut active = self.active.write().unwrap_or_else(|e| e.into_inner());
        if *active != from {
            return None;
        }
        let to = self.next_below(from)?;
        *active = to;
        drop(active);

        let reason = reason.into();
        warn!(
            from = %from,
            to = %to,
            reason = %reason,
            "Tier downgraded to {}",
            to.display_name()
        );
        self.record(from, to, reason);
        Some(to)
    }

    /// Restore a higher-priority tier. Returns whether the active tier changed.
    pub fn upgrade(&self, to: TierKind, reason: impl Into<String>) -> bool {
        if to.priority() < self.ceiling.priority()
            || !self.descriptor(to).is_some_and(|d| d.configured)
        {
            return false;
        }
        let mut active = self.active.write().unwrap_or_else(|e| e.into_inner());
        let from = *active;
        if to.priority() >= from.priority() {
            return false;
        }
        *active = to;
        drop(active);

        let reason = reason.into();
        info!(
            from = %from,
            to = %to,
            reason = %reason,
            "Tier upgraded to {}",
            to.display_name()
        );
        self.record(from, to, reason);
        true
    }

    fn record(&self, from: TierKind, to: TierKind, reason: String) {
        let mut history = self.history.lock().unwrap_or_else(|e| e.into_inner());
        if history.len() == MAX_TRANSITION_HISTORY {
            history.pop_front();
        }
        history.push_back(TierTransition {
            from,
            to,
            reason,
            at: Utc::now(),
        });
    }

    /// Recorded transitions, oldest first
    pub fn history(&self) -> Vec<TierTransition> {
        self.history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }
}
