//! Memorai - Adaptive memory engine for AI agents
//!
//! Stores, classifies and retrieves natural-language memories for
//! multi-tenant agents. The engine picks the richest available retrieval
//! tier (remote embeddings, local model, keyword matching, mock) and
//! degrades through them when dependencies fail, without changing the
//! caller-facing contract.

pub mod cache;
pub mod classifier;
pub mod config;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod memory;
pub mod resilience;
pub mod storage;
pub mod temporal;
pub mod testing;
pub mod vector;

pub use config::Config;
pub use engine::{EngineBuilder, HealthReport, MemoryEngine, TierInfo, TierKind};
pub use error::{MemoraiError, Result};
pub use memory::{ContextRequest, Memory, MemoryMetadata, MemoryType, RecallOptions, SearchResult};
