//! Audit events and typed inter-item links.

use serde::{Deserialize, Serialize};

use crate::ids::{generate_id, now_iso};

/// Append-only audit log entry for any memory operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEvent {
    pub id: String,
    /// Action name: write, read, update, link, import, consolidate,
    /// reset, mount_register, mount_remove, reindex, ...
    pub action: String,
    pub item_id: Option<String>,
    #[serde(default)]
    pub details: serde_json::Value,
    #[serde(default)]
    pub content_hash: String,
    pub timestamp: String,
}

impl MemoryEvent {
    pub fn new(action: &str, item_id: Option<&str>, details: serde_json::Value) -> Self {
        Self {
            id: generate_id("EVT"),
            action: action.to_string(),
            item_id: item_id.map(str::to_string),
            details,
            content_hash: String::new(),
            timestamp: now_iso(),
        }
    }
}

/// Typed directed edge between two items. The `supersedes` relation
/// drives logical replacement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryLink {
    pub src_id: String,
    pub dst_id: String,
    pub rel: String,
    pub created_at: String,
}

impl MemoryLink {
    pub fn new(src_id: &str, dst_id: &str, rel: &str) -> Self {
        Self {
            src_id: src_id.to_string(),
            dst_id: dst_id.to_string(),
            rel: rel.to_string(),
            created_at: now_iso(),
        }
    }
}
