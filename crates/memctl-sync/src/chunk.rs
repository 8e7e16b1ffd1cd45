//! Paragraph-bounded chunking with provenance headers.

use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::extensions::{ext_of, language_tag};

/// One chunk of a source text: content plus its 0-based line range in
/// the original.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    pub start_line: usize,
    pub end_line: usize,
}

static PARA_SPLIT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n").unwrap());
static HEADING_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#+\s+(.+)").unwrap());

/// Split text at blank-line boundaries and greedily pack consecutive
/// paragraphs until the next one would exceed `max_tokens` (estimated
/// as chars / 4). A single paragraph over budget is emitted unsplit —
/// paragraphs are never cut in the middle.
pub fn chunk_paragraphs(text: &str, max_tokens: usize) -> Vec<Chunk> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let paragraphs: Vec<&str> = PARA_SPLIT_RE.split(text).collect();

    let mut chunks: Vec<Chunk> = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_tokens = 0usize;
    let mut line_offset = 0usize;
    let mut start_line = 0usize;
    let last = paragraphs.len().saturating_sub(1);

    for (i, para) in paragraphs.iter().enumerate() {
        let para_tokens = para.len() / 4;
        let para_lines = para.matches('\n').count() + 1;

        if current_tokens + para_tokens > max_tokens && !current.is_empty() {
            chunks.push(Chunk {
                text: current.join("\n\n"),
                start_line,
                end_line: line_offset.saturating_sub(1),
            });
            current.clear();
            current_tokens = 0;
            start_line = line_offset;
        }

        current.push(para);
        current_tokens += para_tokens;
        line_offset += para_lines;
        if i < last {
            line_offset += 1; // blank-line separator
        }
    }

    if !current.is_empty() {
        let end_line = line_offset.saturating_sub(1).max(start_line);
        chunks.push(Chunk { text: current.join("\n\n"), start_line, end_line });
    }

    chunks
}

/// Provenance header prepended to every stored chunk.
pub fn chunk_header(display_path: &str, index: usize, chunk: &Chunk) -> String {
    format!(
        "[path:{display_path} chunk:{index} lines:{}-{}]",
        chunk.start_line, chunk.end_line
    )
}

/// Title inference: first Markdown heading within the leading 20
/// lines, else the fallback (usually the file stem).
pub fn infer_title(text: &str, fallback: &str) -> String {
    for line in text.lines().take(20) {
        if let Some(caps) = HEADING_RE.captures(line.trim()) {
            return caps[1].trim().to_string();
        }
    }
    fallback.to_string()
}

/// Chunk title: the base title, with an `[i/N]` suffix when the file
/// produced more than one chunk.
pub fn chunk_title(base: &str, index: usize, total: usize) -> String {
    if total > 1 {
        format!("{base} [{}/{total}]", index + 1)
    } else {
        base.to_string()
    }
}

/// Auto tags from a path: the extension's language tag plus up to two
/// trailing non-trivial ancestor directory names.
pub fn infer_tags_from_path(path: &Path) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    if let Some(lang) = language_tag(&ext_of(path)) {
        tags.push(lang.to_string());
    }

    let parts: Vec<String> = path
        .parent()
        .map(|parent| {
            parent
                .components()
                .filter_map(|c| match c {
                    std::path::Component::Normal(os) => Some(os.to_string_lossy().to_string()),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();

    for part in parts.iter().rev().take(2).rev() {
        let tag = part.to_lowercase().replace(' ', "-");
        if !tag.is_empty() && tag.len() <= 40 && !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    tags
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_yields_no_chunks() {
        assert!(chunk_paragraphs("", 100).is_empty());
        assert!(chunk_paragraphs("   \n  \n ", 100).is_empty());
    }

    #[test]
    fn single_paragraph_single_chunk() {
        let chunks = chunk_paragraphs("one paragraph only", 100);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "one paragraph only");
        assert_eq!(chunks[0].start_line, 0);
    }

    #[test]
    fn paragraphs_pack_until_budget() {
        // Two ~10-token paragraphs fit a 100-token budget together.
        let text = format!("{}\n\n{}", "a".repeat(40), "b".repeat(40));
        let chunks = chunk_paragraphs(&text, 100);
        assert_eq!(chunks.len(), 1);

        // A 5-token budget forces a split.
        let chunks = chunk_paragraphs(&text, 5);
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].text.starts_with('a'));
        assert!(chunks[1].text.starts_with('b'));
    }

    #[test]
    fn oversized_paragraph_is_emitted_unsplit() {
        let big = "x".repeat(4000); // ~1000 tokens, no blank lines
        let chunks = chunk_paragraphs(&big, 10);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text.len(), 4000);
    }

    #[test]
    fn line_ranges_advance_across_chunks() {
        let text = "line one\nline two\n\nline four\nline five";
        let chunks = chunk_paragraphs(text, 1);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].start_line, 0);
        assert!(chunks[1].start_line > chunks[0].end_line);
    }

    #[test]
    fn header_format_is_stable() {
        let chunk = Chunk { text: "body".into(), start_line: 3, end_line: 9 };
        assert_eq!(chunk_header("docs/auth.md", 2, &chunk), "[path:docs/auth.md chunk:2 lines:3-9]");
    }

    #[test]
    fn title_prefers_first_heading() {
        assert_eq!(infer_title("intro\n# Auth Guide\ntext", "auth"), "Auth Guide");
        assert_eq!(infer_title("## Sub Heading\n", "auth"), "Sub Heading");
        assert_eq!(infer_title("no headings here", "auth"), "auth");
    }

    #[test]
    fn multi_chunk_titles_get_index_suffix() {
        assert_eq!(chunk_title("Guide", 0, 3), "Guide [1/3]");
        assert_eq!(chunk_title("Guide", 0, 1), "Guide");
    }

    #[test]
    fn path_tags_take_language_and_ancestors() {
        let tags = infer_tags_from_path(Path::new("/repo/docs/security/auth.md"));
        assert_eq!(tags, vec!["markdown", "docs", "security"]);
    }
}
