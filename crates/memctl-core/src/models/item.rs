//! The canonical memory item and its closed enumerations.

use serde::{Deserialize, Serialize};

use crate::ids::{content_hash, generate_id, now_iso};

/// Memory tier. Lifecycle-advisory, not enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MemoryTier {
    #[default]
    Stm,
    Mtm,
    Ltm,
}

impl MemoryTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryTier::Stm => "stm",
            MemoryTier::Mtm => "mtm",
            MemoryTier::Ltm => "ltm",
        }
    }

    /// Parse a tier string. Unknown values are a validation error.
    pub fn parse(s: &str) -> Result<Self, crate::MemctlError> {
        match s {
            "stm" => Ok(MemoryTier::Stm),
            "mtm" => Ok(MemoryTier::Mtm),
            "ltm" => Ok(MemoryTier::Ltm),
            other => Err(crate::MemctlError::Validation(format!(
                "invalid tier: {other:?}"
            ))),
        }
    }
}

/// Memory item type. Unknown values coerce to `Note` — the LLM side of
/// the pipeline produces free-form type strings and a dropped item is
/// worse than a down-typed one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum MemoryType {
    Fact,
    Decision,
    Definition,
    Constraint,
    Pattern,
    Todo,
    Pointer,
    #[default]
    Note,
}

impl From<String> for MemoryType {
    fn from(s: String) -> Self {
        MemoryType::coerce(&s)
    }
}

impl MemoryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryType::Fact => "fact",
            MemoryType::Decision => "decision",
            MemoryType::Definition => "definition",
            MemoryType::Constraint => "constraint",
            MemoryType::Pattern => "pattern",
            MemoryType::Todo => "todo",
            MemoryType::Pointer => "pointer",
            MemoryType::Note => "note",
        }
    }

    /// Map a free-form type string onto the closed set. Near-synonyms
    /// map to their closest member; everything else becomes `Note`.
    pub fn coerce(s: &str) -> Self {
        match s {
            "fact" => MemoryType::Fact,
            "decision" => MemoryType::Decision,
            "definition" => MemoryType::Definition,
            "constraint" | "rule" | "requirement" => MemoryType::Constraint,
            "pattern" | "process" => MemoryType::Pattern,
            "todo" => MemoryType::Todo,
            "pointer" => MemoryType::Pointer,
            _ => MemoryType::Note,
        }
    }
}

/// Validation lifecycle state of an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ValidationState {
    #[default]
    Unverified,
    Verified,
    Contested,
    Retracted,
}

impl ValidationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationState::Unverified => "unverified",
            ValidationState::Verified => "verified",
            ValidationState::Contested => "contested",
            ValidationState::Retracted => "retracted",
        }
    }

    pub fn parse(s: &str) -> Result<Self, crate::MemctlError> {
        match s {
            "unverified" => Ok(ValidationState::Unverified),
            "verified" => Ok(ValidationState::Verified),
            "contested" => Ok(ValidationState::Contested),
            "retracted" => Ok(ValidationState::Retracted),
            other => Err(crate::MemctlError::Validation(format!(
                "invalid validation state: {other:?}"
            ))),
        }
    }
}

/// Origin class of an item's provenance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[default]
    Chat,
    Doc,
    Tool,
    Mixed,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Chat => "chat",
            SourceKind::Doc => "doc",
            SourceKind::Tool => "tool",
            SourceKind::Mixed => "mixed",
        }
    }
}

/// Tracks the origin of a memory item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryProvenance {
    #[serde(default)]
    pub source_kind: SourceKind,
    #[serde(default)]
    pub source_id: String,
    #[serde(default)]
    pub chunk_ids: Vec<String>,
    #[serde(default)]
    pub content_hashes: Vec<String>,
    #[serde(default = "now_iso")]
    pub created_at: String,
}

impl Default for MemoryProvenance {
    fn default() -> Self {
        Self {
            source_kind: SourceKind::Chat,
            source_id: String::new(),
            chunk_ids: Vec::new(),
            content_hashes: Vec::new(),
            created_at: now_iso(),
        }
    }
}

/// A typed link reference stored inline on an item: `{rel, to}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRef {
    pub rel: String,
    pub to: String,
}

/// Canonical memory item.
///
/// Content must stay concise; long evidence uses `type=pointer` with
/// chunk references. Provenance is mandatory for MTM/LTM. Updates go
/// through the store, which appends a revision — `id` and `created_at`
/// never change after the first write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryItem {
    #[serde(default = "default_item_id")]
    pub id: String,
    #[serde(default)]
    pub tier: MemoryTier,
    #[serde(rename = "type", default)]
    pub item_type: MemoryType,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub entities: Vec<String>,
    #[serde(default)]
    pub links: Vec<LinkRef>,
    #[serde(default)]
    pub provenance: MemoryProvenance,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default)]
    pub validation: ValidationState,
    #[serde(default = "default_scope")]
    pub scope: String,
    #[serde(default)]
    pub expires_at: Option<String>,
    #[serde(default)]
    pub usage_count: i64,
    #[serde(default)]
    pub last_used_at: Option<String>,
    #[serde(default = "now_iso")]
    pub created_at: String,
    #[serde(default = "now_iso")]
    pub updated_at: String,
    #[serde(default)]
    pub rule_id: Option<String>,
    #[serde(default)]
    pub corpus_id: Option<String>,
    #[serde(default)]
    pub superseded_by: Option<String>,
    #[serde(default)]
    pub archived: bool,
    /// Quarantine marker: `false` excludes the item from every
    /// recall/injection pathway while keeping it visible in direct
    /// lookups, exports, and audit.
    #[serde(default = "default_true")]
    pub injectable: bool,
}

fn default_item_id() -> String {
    generate_id("MEM")
}

fn default_confidence() -> f64 {
    0.5
}

fn default_scope() -> String {
    "project".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for MemoryItem {
    fn default() -> Self {
        let now = now_iso();
        Self {
            id: generate_id("MEM"),
            tier: MemoryTier::Stm,
            item_type: MemoryType::Note,
            title: String::new(),
            content: String::new(),
            tags: Vec::new(),
            entities: Vec::new(),
            links: Vec::new(),
            provenance: MemoryProvenance::default(),
            confidence: 0.5,
            validation: ValidationState::Unverified,
            scope: "project".to_string(),
            expires_at: None,
            usage_count: 0,
            last_used_at: None,
            created_at: now.clone(),
            updated_at: now,
            rule_id: None,
            corpus_id: None,
            superseded_by: None,
            archived: false,
            injectable: true,
        }
    }
}

impl MemoryItem {
    /// SHA-256 hash of the canonical content, `sha256:`-prefixed.
    pub fn content_hash(&self) -> String {
        content_hash(&self.content)
    }

    /// Full JSON snapshot, as persisted into the revision log.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Record a use: bump the counter and the usage/update timestamps.
    pub fn touch(&mut self) {
        self.usage_count += 1;
        self.last_used_at = Some(now_iso());
        self.updated_at = now_iso();
    }
}
