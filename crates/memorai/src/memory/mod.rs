//! Memory types
//!
//! Defines the memory record and the request/response types used by the
//! engine's public contract.

pub mod types;

pub use types::{ContextRequest, Memory, MemoryMetadata, MemoryType, RecallOptions, SearchResult};
