//! Rendering the structural injection block.

use crate::stats::InspectStats;

/// Human-readable file size.
fn format_size(size_bytes: i64) -> String {
    if size_bytes <= 0 {
        "unknown".to_string()
    } else if size_bytes < 1024 {
        format!("{size_bytes} B")
    } else if size_bytes < 1024 * 1024 {
        format!("{:.1} KB", size_bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", size_bytes as f64 / (1024.0 * 1024.0))
    }
}

/// Render a structural injection block from computed stats.
///
/// Deterministic: same stats, byte-identical output. Paths are
/// mount-relative. The block is trimmed to `budget * 4` characters at
/// a line boundary when it overflows; the end marker always survives.
pub fn render_block(stats: &InspectStats, mount_label: Option<&str>, budget: usize) -> String {
    const END_MARKER: &str = "--- End Structure (format_version=1) ---";

    if stats.total_files == 0 {
        return "## Structure (Injected)\nNo files found.\n".to_string();
    }

    let mut lines: Vec<String> = Vec::new();
    lines.push("## Structure (Injected)".to_string());
    lines.push("format_version: 1".to_string());
    lines.push("injection_type: structure_inspect".to_string());
    if let Some(label) = mount_label {
        lines.push(format!("mount: {label}"));
    }
    lines.push(String::new());

    lines.push(format!("Total files: {}", stats.total_files));
    lines.push(format!("Total chunks: {}", stats.total_chunks));
    lines.push(format!("Total size: {}", format_size(stats.total_size)));
    lines.push(String::new());

    if !stats.per_folder.is_empty() {
        lines.push("Folders:".to_string());
        let mut folders: Vec<_> = stats.per_folder.iter().collect();
        folders.sort_by(|a, b| b.1.chunk_count.cmp(&a.1.chunk_count).then_with(|| a.0.cmp(b.0)));
        for (folder, fs) in folders {
            lines.push(format!(
                "- {folder}/ ({} files, {} chunks, {})",
                fs.file_count,
                fs.chunk_count,
                format_size(fs.size)
            ));
        }
        lines.push(String::new());
    }

    if !stats.top_largest.is_empty() {
        lines.push("Largest files:".to_string());
        for f in &stats.top_largest {
            lines.push(format!(
                "- {} ({}, {} chunks)",
                f.path,
                format_size(f.size_bytes),
                f.chunk_count
            ));
        }
        lines.push(String::new());
    }

    if !stats.per_extension.is_empty() {
        lines.push("Extensions:".to_string());
        let mut exts: Vec<_> = stats.per_extension.iter().collect();
        exts.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        for (ext, count) in exts {
            lines.push(format!("- {ext}: {count}"));
        }
        lines.push(String::new());
    }

    if !stats.observations.is_empty() {
        lines.push("Observations:".to_string());
        for o in &stats.observations {
            lines.push(format!("- {o}"));
        }
        lines.push(String::new());
    }

    lines.push(END_MARKER.to_string());

    let text = lines.join("\n");
    let max_chars = budget * 4;
    if text.len() > max_chars {
        let mut boundary = max_chars.min(text.len());
        while !text.is_char_boundary(boundary) {
            boundary -= 1;
        }
        let cut = text[..boundary].rfind('\n').unwrap_or(boundary);
        format!("{}\n[...truncated]\n{END_MARKER}", &text[..cut])
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::{FolderStats, LargestFile};

    fn sample_stats() -> InspectStats {
        let mut per_folder = std::collections::BTreeMap::new();
        per_folder.insert(
            "docs".to_string(),
            FolderStats { file_count: 2, chunk_count: 5, size: 4096 },
        );
        let mut per_extension = std::collections::BTreeMap::new();
        per_extension.insert(".md".to_string(), 2i64);
        InspectStats {
            total_files: 2,
            total_chunks: 5,
            total_size: 4096,
            per_folder,
            per_extension,
            top_largest: vec![LargestFile {
                path: "docs/auth.md".into(),
                size_bytes: 3000,
                chunk_count: 3,
            }],
            observations: vec!["docs/ dominates content (100% of chunks)".into()],
        }
    }

    #[test]
    fn block_is_deterministic() {
        let stats = sample_stats();
        assert_eq!(render_block(&stats, Some("docs"), 800), render_block(&stats, Some("docs"), 800));
    }

    #[test]
    fn block_carries_header_label_and_end_marker() {
        let block = render_block(&sample_stats(), Some("docs"), 800);
        assert!(block.starts_with("## Structure (Injected)"));
        assert!(block.contains("format_version: 1"));
        assert!(block.contains("injection_type: structure_inspect"));
        assert!(block.contains("mount: docs"));
        assert!(block.ends_with("--- End Structure (format_version=1) ---"));
    }

    #[test]
    fn empty_corpus_renders_placeholder() {
        let block = render_block(&InspectStats::default(), None, 800);
        assert_eq!(block, "## Structure (Injected)\nNo files found.\n");
    }

    #[test]
    fn overflow_is_cut_at_line_boundary() {
        let mut stats = sample_stats();
        for i in 0..200 {
            stats.per_folder.insert(
                format!("folder-with-a-rather-long-name-{i:03}"),
                FolderStats { file_count: 1, chunk_count: 1, size: 10 },
            );
        }
        let block = render_block(&stats, None, 50); // 200 chars
        assert!(block.len() < 600);
        assert!(block.contains("[...truncated]"));
        assert!(block.ends_with("--- End Structure (format_version=1) ---"));
        // The cut lands on a whole line.
        assert!(!block.contains("folder-with-a-rather-long-name-199"));
    }

    #[test]
    fn sizes_format_humanly() {
        assert_eq!(format_size(0), "unknown");
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0 MB");
    }
}
