//! Corpus-hash registry rows and folder mounts.

use serde::{Deserialize, Serialize};

/// One row per ingested file. The (file_path, size_bytes, mtime_epoch)
/// triple is the fast-skip key; `sha256` is the content-addressed key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusFile {
    pub file_path: String,
    pub sha256: String,
    pub chunk_count: i64,
    pub item_ids: Vec<String>,
    pub ingested_at: String,
    #[serde(default)]
    pub mount_id: Option<String>,
    #[serde(default)]
    pub rel_path: Option<String>,
    #[serde(default)]
    pub ext: Option<String>,
    #[serde(default)]
    pub size_bytes: Option<i64>,
    #[serde(default)]
    pub mtime_epoch: Option<i64>,
    #[serde(default)]
    pub lang_hint: Option<String>,
}

/// A registered folder mount: the grouping key for corpus files and an
/// optional scoping key for recall.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mount {
    pub mount_id: String,
    pub path: String,
    pub name: Option<String>,
    #[serde(default)]
    pub ignore_patterns: Vec<String>,
    #[serde(default)]
    pub lang_hint: Option<String>,
    pub created_at: String,
    #[serde(default)]
    pub last_sync_at: Option<String>,
}

impl Mount {
    /// Display label: the human name when set, else the path.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.path)
    }
}
