//! # memctl-inspect
//!
//! Deterministic structural summaries over corpus metadata — never
//! over item content — plus the orchestration that makes
//! `inspect <path>` self-contained (automount, staleness-gated
//! autosync, ephemeral mounts).

pub mod block;
pub mod orchestrate;
pub mod stats;

pub use block::render_block;
pub use orchestrate::{inspect_path, InspectResult, MountMode, SyncMode};
pub use stats::{inspect_stats, FolderStats, InspectStats, LargestFile};
