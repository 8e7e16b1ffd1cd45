//! Memory injection formatting — stable contract (`format_version: 1`).
//!
//! This module is the single source of truth for the injection block;
//! every front-end delegates here. Breaking changes to the output MUST
//! increment [`FORMAT_VERSION`]; additive optional fields do not.

use crate::models::MemoryItem;

/// Version tag carried in every injection block header.
pub const FORMAT_VERSION: u32 = 1;

/// What kind of injection a block carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectionType {
    MemoryRecall,
    SessionInject,
    StructureInspect,
}

impl InjectionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InjectionType::MemoryRecall => "memory_recall",
            InjectionType::SessionInject => "session_inject",
            InjectionType::StructureInspect => "structure_inspect",
        }
    }
}

/// Render scored memory items into the stable injection format.
///
/// `items` are ordered best-first; `total_matched` is the count before
/// budget truncation (defaults to `items.len()`). The block is cut at
/// whole-item granularity so `used` tokens never exceed the budget
/// (except for the very first item, which is always included).
pub fn format_injection_block(
    items: &[MemoryItem],
    budget_tokens: usize,
    total_matched: Option<usize>,
    injection_type: InjectionType,
) -> String {
    if items.is_empty() {
        return String::new();
    }

    let matched = total_matched.unwrap_or(items.len());
    let now_iso = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();

    let char_budget = budget_tokens * 4;
    let mut total_chars = 0usize;
    let mut included: Vec<(usize, String)> = Vec::new();

    for (idx, item) in items.iter().enumerate() {
        let entry = format_single_item(idx + 1, item);
        if total_chars + entry.len() > char_budget && !included.is_empty() {
            break;
        }
        total_chars += entry.len();
        included.push((idx + 1, entry));
    }

    let tokens_used = total_chars / 4;

    let mut lines: Vec<String> = Vec::new();
    lines.push("## Memory (Injected)".to_string());
    lines.push(format!("format_version: {FORMAT_VERSION}"));
    lines.push(format!("injection_type: {}", injection_type.as_str()));
    lines.push(format!("generated_at: {now_iso}"));
    lines.push(format!("budget_tokens: {budget_tokens}"));
    lines.push(format!("matched: {matched}"));
    lines.push(format!("used: {tokens_used}"));
    lines.push(String::new());

    for (_, entry) in &included {
        lines.push(entry.clone());
    }

    lines.push(format!(
        "--- End Memory (format_version={FORMAT_VERSION}, {} items, {tokens_used} tokens) ---",
        included.len()
    ));

    lines.join("\n")
}

fn format_single_item(rank: usize, item: &MemoryItem) -> String {
    let tier = item.tier.as_str().to_uppercase();
    let validation = item.validation.as_str();
    let item_type = item.item_type.as_str();
    let title = if item.title.is_empty() { "(untitled)" } else { &item.title };

    let prov = &item.provenance;
    let mut prov_str = if prov.source_id.is_empty() {
        prov.source_kind.as_str().to_string()
    } else {
        format!("{}:{}", prov.source_kind.as_str(), prov.source_id)
    };
    if let Some(first_hash) = prov.content_hashes.first() {
        let prefix: String = first_hash.chars().take(16).collect();
        prov_str.push_str(&format!(" | {prefix}..."));
    }

    let tag_str = if item.tags.is_empty() {
        "none".to_string()
    } else {
        item.tags.join(", ")
    };

    let mut lines = vec![format!(
        "[{rank}] [{tier}:{validation}] {item_type} \u{2014} {title}"
    )];
    for cline in item.content.trim().lines() {
        lines.push(format!("    {cline}"));
    }
    lines.push(format!("    provenance: {prov_str}"));
    lines.push(format!("    tags: {tag_str}"));
    lines.push(format!("    confidence: {:.2}", item.confidence));
    if !item.entities.is_empty() {
        lines.push(format!("    entities: {}", item.entities.join(", ")));
    }
    lines.push(String::new());
    lines.join("\n")
}

/// Summary extracted from an injection block by [`parse_injection_block`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectionSummary {
    pub source: String,
    pub chunk: String,
    pub tokens_used: usize,
    pub matched: usize,
    pub insight: String,
}

/// Parse a block produced by [`format_injection_block`], extracting the
/// primary source file, chunk index, token usage, match count, and a
/// short insight line.
pub fn parse_injection_block(text: &str) -> InjectionSummary {
    let mut source = "unknown".to_string();
    let mut chunk = "?".to_string();
    let mut tokens_used = 0usize;
    let mut matched = 0usize;

    for line in text.lines() {
        let stripped = line.trim();
        if let Some(rest) = stripped.strip_prefix("used:") {
            tokens_used = rest.trim().parse().unwrap_or(0);
        } else if let Some(rest) = stripped.strip_prefix("matched:") {
            matched = rest.trim().parse().unwrap_or(0);
        } else if let Some(rest) = stripped.strip_prefix("[path:") {
            // [path:<p> chunk:<i> lines:<a>-<b>]
            let mut parts = rest.split_whitespace();
            if let Some(p) = parts.next() {
                source = std::path::Path::new(p)
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| p.to_string());
            }
            for part in parts {
                if let Some(c) = part.strip_prefix("chunk:") {
                    chunk = c.trim_end_matches(']').to_string();
                }
            }
        }
    }

    // First substantial content line after a chunk header.
    let mut insight = String::new();
    let mut in_content = false;
    for line in text.lines() {
        let stripped = line.trim();
        if stripped.starts_with("[path:") {
            in_content = true;
            continue;
        }
        if !in_content {
            continue;
        }
        if stripped.starts_with("--- End Memory") {
            break;
        }
        if stripped.starts_with("provenance:")
            || stripped.starts_with("tags:")
            || stripped.starts_with("confidence:")
        {
            continue;
        }
        if stripped.is_empty()
            || stripped.starts_with("---")
            || stripped.starts_with("```")
            || stripped.starts_with('#')
            || stripped.len() < 20
        {
            continue;
        }
        insight = stripped.to_string();
        break;
    }
    if insight.is_empty() {
        insight = "(no extractable content)".to_string();
    }
    if insight.len() > 120 {
        insight.truncate(117);
        insight.push_str("...");
    }

    InjectionSummary { source, chunk, tokens_used, matched, insight }
}
