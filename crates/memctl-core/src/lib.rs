//! # memctl-core
//!
//! Core types for the memctl memory control plane: canonical entities,
//! ID minting, content hashing, configuration defaults, the error
//! taxonomy, and the stable injection-block format.
//!
//! Items are immutable in effect — every update appends a revision in
//! the store; this crate only defines the value types flowing through
//! the write and recall paths.

pub mod config;
pub mod errors;
pub mod ids;
pub mod inject;
pub mod models;

pub use errors::{MemctlError, MemctlResult};
pub use ids::{content_hash, generate_id, now_iso};
pub use models::{
    CorpusFile, LinkRef, MemoryEvent, MemoryItem, MemoryLink, MemoryProposal,
    MemoryProvenance, MemoryTier, MemoryType, Mount, SearchMeta, SearchStrategy,
    SourceKind, ValidationState,
};
