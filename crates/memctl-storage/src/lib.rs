//! # memctl-storage
//!
//! SQLite persistence layer for the memctl memory plane: canonical
//! items with revision history and audit events, typed links, the
//! corpus-hash and mount registries, schema metadata, and the
//! full-text search cascade.
//!
//! Single write connection behind a mutex, WAL mode for file-backed
//! stores. [`MemoryStore`] is the single owner — no code outside this
//! crate touches a raw connection or the FTS index.

pub mod queries;
pub mod schema;
pub mod search;
pub mod store;

pub use queries::item_ops::ItemFilter;
pub use queries::revision_ops::Revision;
pub use schema::{resolve_tokenizer_preset, validate_fts_tokenizer, FTS_TOKENIZER_PRESETS};
pub use search::{is_porter_tokenizer, rank_by_coverage, PREFIX_MIN_LEN};
pub use store::{MemoryStore, ResetCounts, StoreStats};
