//! # memctl-sync
//!
//! File scanning and delta synchronisation: walks mounted folders,
//! detects changes via the 3-tier delta rule, chunks files at
//! paragraph boundaries, and writes them into the store with `doc`
//! provenance. Includes the stat-only staleness probe used by the
//! inspect orchestrator.

pub mod chunk;
pub mod extensions;
pub mod ingest;
pub mod scan;
pub mod sync;

pub use chunk::{chunk_paragraphs, Chunk};
pub use extensions::{is_ingestable, INGESTABLE_EXTS};
pub use ingest::{ingest_file, ingest_stdin_text, IngestOptions, IngestResult};
pub use scan::{file_sha256, scan_mount, FileInfo, ScanResult};
pub use sync::{is_stale, sync_all, sync_mount, SyncOptions, SyncResult};
