//! Memory proposals — what an LLM emits, pre-governance.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::item::{MemoryItem, MemoryProvenance, MemoryTier, MemoryType, SourceKind};

/// A memory candidate proposed by an LLM or an external caller.
///
/// Never stored directly — every proposal goes through the policy
/// engine first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryProposal {
    #[serde(rename = "type", default)]
    pub item_type: MemoryType,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Short justification for why this is worth persisting. Absence is
    /// a quarantine trigger.
    #[serde(default)]
    pub why_store: String,
    /// Loose provenance hints: `source_kind`, `source_id`.
    #[serde(default)]
    pub provenance_hint: HashMap<String, String>,
    #[serde(default = "default_scope")]
    pub scope: String,
    #[serde(default)]
    pub rule_id: Option<String>,
}

fn default_scope() -> String {
    "project".to_string()
}

impl Default for MemoryProposal {
    fn default() -> Self {
        Self {
            item_type: MemoryType::default(),
            title: String::new(),
            content: String::new(),
            tags: Vec::new(),
            why_store: String::new(),
            provenance_hint: HashMap::new(),
            scope: "project".to_string(),
            rule_id: None,
        }
    }
}

impl MemoryProposal {
    /// Convert an accepted proposal into a storable item.
    pub fn into_memory_item(self, tier: MemoryTier, confidence: f64) -> MemoryItem {
        let source_kind = self
            .provenance_hint
            .get("source_kind")
            .map(|s| match s.as_str() {
                "doc" => SourceKind::Doc,
                "tool" => SourceKind::Tool,
                "mixed" => SourceKind::Mixed,
                _ => SourceKind::Chat,
            })
            .unwrap_or(SourceKind::Chat);
        let source_id = self
            .provenance_hint
            .get("source_id")
            .cloned()
            .unwrap_or_default();

        MemoryItem {
            tier,
            item_type: self.item_type,
            title: self.title,
            content: self.content,
            tags: self.tags,
            provenance: MemoryProvenance {
                source_kind,
                source_id,
                ..Default::default()
            },
            confidence,
            scope: self.scope,
            rule_id: self.rule_id,
            ..Default::default()
        }
    }
}
