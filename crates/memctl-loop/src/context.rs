//! Accumulating context with dedup and a character budget.

use std::collections::HashSet;

use memctl_core::MemoryItem;

/// Merge newly recalled items into the accumulated context.
///
/// Items whose id is already in `seen_ids` are dropped; every included
/// item's id is added. New items render as `[title]\ncontent` blocks
/// joined by blank lines. The merged text is trimmed to
/// `budget_chars`, cutting at the last whitespace boundary when that
/// keeps at least 80% of the budget.
///
/// Returns the merged context and the count of truly new items.
pub fn merge_context(
    existing_context: &str,
    new_items: &[MemoryItem],
    seen_ids: &mut HashSet<String>,
    budget_chars: usize,
) -> (String, usize) {
    let truly_new: Vec<&MemoryItem> =
        new_items.iter().filter(|it| !seen_ids.contains(&it.id)).collect();
    if truly_new.is_empty() {
        return (existing_context.to_string(), 0);
    }

    let mut blocks: Vec<String> = Vec::with_capacity(truly_new.len());
    for item in &truly_new {
        let title = if item.title.is_empty() { "(untitled)" } else { &item.title };
        blocks.push(format!("[{title}]\n{}", item.content));
        seen_ids.insert(item.id.clone());
    }
    let new_text = blocks.join("\n\n");

    let mut merged = if existing_context.trim().is_empty() {
        new_text
    } else {
        format!("{}\n\n{new_text}", existing_context.trim_end())
    };

    // Trim from the end: earlier context is higher priority.
    if merged.len() > budget_chars {
        let mut boundary = budget_chars.min(merged.len());
        while !merged.is_char_boundary(boundary) {
            boundary -= 1;
        }
        merged.truncate(boundary);
        if let Some(last_ws) = merged.rfind(char::is_whitespace) {
            if last_ws as f64 > budget_chars as f64 * 0.8 {
                merged.truncate(last_ws);
            }
        }
    }

    (merged, truly_new.len())
}
